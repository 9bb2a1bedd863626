//! Fastly stats API client
//!
//! Historical stats come from `api.fastly.com`, one sample per granularity
//! bucket. Real-time stats come from `rt.fastly.com`, one `aggregated`
//! sample per second of the requested slice.

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::types::{FastlyStatsError, Result, Sample, ServiceDirectory, TimeWindow};

/// Services requested per directory page
const SERVICES_PER_PAGE: u32 = 20;

/// Upper bound on directory pages, in case the API never returns an empty page
const MAX_SERVICE_PAGES: u32 = 1_000;

/// Source of stats samples
pub trait StatsSource {
    /// Samples for a historical window, one per granularity bucket
    fn fetch_historical(&self, service_id: &str, window: &TimeWindow) -> Result<Vec<Sample>>;

    /// Real-time samples covering the last `interval_secs` seconds
    fn fetch_realtime(&self, service_id: &str, interval_secs: u64) -> Result<Vec<Sample>>;
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    data: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct RealtimeEntry {
    #[serde(default)]
    aggregated: Sample,
}

#[derive(Debug, Deserialize)]
struct RealtimeResponse {
    #[serde(rename = "Data", default)]
    data: Vec<RealtimeEntry>,
}

/// Blocking client for the Fastly historical and real-time APIs
pub struct StatsClient {
    http: Client,
    api_token: String,
    api_url: String,
    rt_url: String,
}

impl StatsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("fastly-stats/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FastlyStatsError::Fetch(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            http,
            api_token: config.api_token.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            rt_url: config.rt_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(url, ?query, "GET");
        let response = self
            .http
            .get(url)
            .header("Fastly-Key", &self.api_token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .map_err(|e| FastlyStatsError::Fetch(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            debug!(%status, %body, "API error response");
            return Err(FastlyStatsError::Fetch(format!("{} returned {}", url, status)));
        }

        response
            .json()
            .map_err(|e| FastlyStatsError::Fetch(format!("JSON parse error: {}", e)))
    }

    /// Fetch the full service directory, page by page, until an empty page
    pub fn list_services(&self) -> Result<ServiceDirectory> {
        let url = format!("{}/service", self.api_url);
        let mut directory = ServiceDirectory::new();

        for page in 1..=MAX_SERVICE_PAGES {
            let query = [
                ("direction", "ascend".to_string()),
                ("page", page.to_string()),
                ("per_page", SERVICES_PER_PAGE.to_string()),
                ("sort", "created".to_string()),
            ];
            let services: Vec<ServiceEntry> = self.get_json(&url, &query)?;
            if services.is_empty() {
                break;
            }
            directory.extend(services.into_iter().map(|s| (s.name, s.id)));
        }

        debug!(count = directory.len(), "fetched service directory");
        Ok(directory)
    }

    /// Historical samples, optionally scoped to a single field
    pub fn fetch_historical_field(
        &self,
        service_id: &str,
        window: &TimeWindow,
        field: Option<&str>,
    ) -> Result<Vec<Sample>> {
        let url = match field {
            Some(field) => format!(
                "{}/stats/service/{}/field/{}",
                self.api_url, service_id, field
            ),
            None => format!("{}/stats/service/{}", self.api_url, service_id),
        };
        let query = [
            ("from", window.start.timestamp().to_string()),
            ("to", window.end.timestamp().to_string()),
            ("by", window.granularity.to_string()),
            ("region", "global".to_string()),
        ];
        let response: HistoricalResponse = self.get_json(&url, &query)?;
        debug!(samples = response.data.len(), "historical samples");
        Ok(response.data)
    }
}

impl StatsSource for StatsClient {
    fn fetch_historical(&self, service_id: &str, window: &TimeWindow) -> Result<Vec<Sample>> {
        self.fetch_historical_field(service_id, window, None)
    }

    fn fetch_realtime(&self, service_id: &str, interval_secs: u64) -> Result<Vec<Sample>> {
        let url = format!("{}/v1/channel/{}/ts/h", self.rt_url, service_id);
        let query = [("limit", interval_secs.to_string())];
        let response: RealtimeResponse = self.get_json(&url, &query)?;
        debug!(samples = response.data.len(), "real-time samples");
        Ok(response.data.into_iter().map(|e| e.aggregated).collect())
    }
}
