//! Cached lookups: the service directory and the field schema

use tracing::{debug, info};

use crate::config::Config;
use crate::services::cache::JsonCache;
use crate::services::client::StatsClient;
use crate::types::{Result, Sample, ServiceDirectory};

/// Anything that can list every registered service
pub trait DirectorySource {
    fn list_services(&self) -> Result<ServiceDirectory>;
}

impl DirectorySource for StatsClient {
    fn list_services(&self) -> Result<ServiceDirectory> {
        StatsClient::list_services(self)
    }
}

/// Service directory and field schema, each behind an expiring cache
pub struct Catalog {
    services: JsonCache<ServiceDirectory>,
    fields: JsonCache<Vec<String>>,
}

impl Catalog {
    pub fn new(config: &Config) -> Self {
        Self {
            services: JsonCache::new(config.services_cache_path()),
            fields: JsonCache::new(config.fields_cache_path()),
        }
    }

    pub fn with_caches(
        services: JsonCache<ServiceDirectory>,
        fields: JsonCache<Vec<String>>,
    ) -> Self {
        Self { services, fields }
    }

    /// Service directory from cache, or fetched in full and cached.
    /// Fetch failures are not cached.
    pub fn services(&self, source: &impl DirectorySource) -> Result<ServiceDirectory> {
        if let (Some(cached), _) = self.services.load() {
            if !cached.is_empty() {
                debug!(count = cached.len(), "loaded services from cache");
                return Ok(cached);
            }
        }

        info!("fetching service directory");
        let directory = source.list_services()?;
        if !directory.is_empty() {
            self.services.store(&directory);
        }
        Ok(directory)
    }

    /// Field schema from cache, or discovered from the first sample and cached.
    /// A stale cache can omit fields added since it was written.
    pub fn fields(&self, samples: &[Sample]) -> Vec<String> {
        if let (Some(cached), _) = self.fields.load() {
            if !cached.is_empty() {
                debug!(count = cached.len(), "loaded fields from cache");
                return cached;
            }
        }

        let fields = samples.first().map(Sample::field_names).unwrap_or_default();
        if !fields.is_empty() {
            self.fields.store(&fields);
        }
        fields
    }
}
