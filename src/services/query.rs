//! End-to-end query pipeline
//!
//! environment + service fragment → resolved service → historical window or
//! streaming session → field resolution → aggregation → sink.

use std::io::Write;

use tracing::{info, warn};

use crate::config::StreamConfig;
use crate::services::aggregator::Aggregator;
use crate::services::catalog::{Catalog, DirectorySource};
use crate::services::client::StatsSource;
use crate::services::dashboard::dashboard_url;
use crate::services::duration::{parse_duration, resolve_window};
use crate::services::notify::ProgressSink;
use crate::services::resolver::{resolve_field, resolve_service};
use crate::services::streamer::{Clock, SessionState, SessionStreamer, SystemClock};
use crate::types::{
    Environment, FastlyStatsError, FieldReport, Result, Sample, ServiceRef, Summary, SummaryKind,
    Trend, COMMON_FIELDS,
};

/// Field keyword selecting the common field set
pub const OVERVIEW: &str = "overview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// One-shot query over a human duration such as "5 minutes ago"
    Historical { duration: String },
    /// Live streaming session
    Realtime(StreamConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub environment: String,
    pub service: String,
    pub field: String,
    pub mode: QueryMode,
}

/// Runs queries against a stats source, reporting through a sink.
/// User-facing notes (fallbacks, hints, links) go to `out`.
pub struct QueryService<S, K, W, C = SystemClock> {
    source: S,
    catalog: Catalog,
    sink: K,
    out: W,
    clock: C,
}

impl<S, K, W> QueryService<S, K, W, SystemClock>
where
    S: StatsSource + DirectorySource,
    K: ProgressSink,
    W: Write,
{
    pub fn new(source: S, catalog: Catalog, sink: K, out: W) -> Self {
        Self::with_clock(source, catalog, sink, out, SystemClock)
    }
}

impl<S, K, W, C> QueryService<S, K, W, C>
where
    S: StatsSource + DirectorySource,
    K: ProgressSink,
    W: Write,
    C: Clock,
{
    pub fn with_clock(source: S, catalog: Catalog, sink: K, out: W, clock: C) -> Self {
        Self {
            source,
            catalog,
            sink,
            out,
            clock,
        }
    }

    /// Print every registered service as `name: id`, sorted by name
    pub fn list_services(&mut self) -> Result<()> {
        let directory = self.catalog.services(&self.source)?;
        for (name, id) in &directory {
            writeln!(self.out, "{}: {}", name, id)?;
        }
        Ok(())
    }

    /// Resolve an environment and service fragment to a registered service
    pub fn resolve(&mut self, environment: &str, service: &str) -> Result<ServiceRef> {
        let environment: Environment = environment.parse()?;
        let service = service.trim();
        if service.is_empty() {
            return Err(FastlyStatsError::Config("service name is required".into()));
        }

        let prefix = environment.service_prefix(service);
        let directory = self.catalog.services(&self.source)?;
        let names: Vec<String> = directory.keys().cloned().collect();
        let best = resolve_service(&prefix, &names)?;

        let name = best.candidate.to_string();
        let id = directory[&name].clone();
        info!(%prefix, %name, %id, score = best.score, "service resolved");
        writeln!(self.out, "Matched service: {} ({})", name, id)?;

        Ok(ServiceRef {
            name,
            id,
            environment,
        })
    }

    pub fn run(&mut self, request: &QueryRequest) -> Result<()> {
        let service = self.resolve(&request.environment, &request.service)?;
        match &request.mode {
            QueryMode::Realtime(config) => self.stream(&service, *config),
            QueryMode::Historical { duration } => {
                self.historical(&service, &request.field, duration)
            }
        }
    }

    fn stream(&mut self, service: &ServiceRef, config: StreamConfig) -> Result<()> {
        let outcome = SessionStreamer::with_clock(
            &self.source,
            &mut self.sink,
            service.clone(),
            &COMMON_FIELDS,
            config,
            &self.clock,
        )
        .run();

        if outcome.state == SessionState::Aborted {
            writeln!(self.out, "Unable to retrieve real-time data.")?;
        }

        let range = format!("{}s", config.duration.as_secs());
        writeln!(
            self.out,
            "Dashboard: {}",
            dashboard_url(&service.id, &range, true)
        )?;
        Ok(())
    }

    fn historical(&mut self, service: &ServiceRef, field: &str, duration: &str) -> Result<()> {
        let spec = parse_duration(duration)?;
        let window = resolve_window(&spec)?;

        let samples = match self.source.fetch_historical(&service.id, &window) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => {
                info!(service = %service.name, "historical query returned no samples");
                writeln!(
                    self.out,
                    "No historical data available for {}. Falling back to real-time data.",
                    service.name
                )?;
                return self.stream(service, StreamConfig::default());
            }
            Err(e) => {
                warn!(error = %e, service = %service.name, "historical fetch failed");
                writeln!(
                    self.out,
                    "Unable to retrieve historical data. Falling back to real-time data."
                )?;
                return self.stream(service, StreamConfig::default());
            }
        };

        let field = field.trim();
        let sums = if field.is_empty() || field.eq_ignore_ascii_case(OVERVIEW) {
            Aggregator::sum_fields(&samples, &COMMON_FIELDS)
        } else {
            let field = self.match_field(field, &samples)?;
            let total = Aggregator::sum_field(&samples, &field);
            vec![(field, total)]
        };

        let summary = Summary {
            kind: SummaryKind::Historical,
            service: service.clone(),
            fields: sums
                .into_iter()
                .map(|(field, total)| FieldReport {
                    field,
                    total,
                    last_interval: None,
                    trend: Trend::Flat,
                })
                .collect(),
            interval_secs: None,
            dashboard_url: dashboard_url(&service.id, &window.range, false),
        };

        if let Err(e) = self.sink.publish(&summary) {
            warn!(error = %e, "failed to publish historical summary");
            writeln!(self.out, "Failed to publish summary: {}", e)?;
        }
        writeln!(self.out, "Dashboard: {}", summary.dashboard_url)?;
        Ok(())
    }

    /// Resolve a field against the schema and print close alternatives
    fn match_field(&mut self, query: &str, samples: &[Sample]) -> Result<String> {
        let schema = self.catalog.fields(samples);
        let matched = resolve_field(query, &schema)?;
        if !matched.related.is_empty() {
            writeln!(
                self.out,
                "Other close fields you might want to query: {}",
                matched.related.join(", ")
            )?;
        }
        Ok(matched.field)
    }
}
