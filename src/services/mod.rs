//! Services for resolving, fetching, aggregating and reporting stats

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod dashboard;
pub mod duration;
pub mod notify;
pub mod query;
pub mod resolver;
pub mod slack;
pub mod streamer;

pub use aggregator::Aggregator;
pub use cache::JsonCache;
pub use catalog::Catalog;
pub use client::{StatsClient, StatsSource};
pub use notify::{ConsoleSink, ProgressSink};
pub use query::{QueryMode, QueryRequest, QueryService};
pub use slack::SlackSink;
pub use streamer::{SessionOutcome, SessionState, SessionStreamer};
