//! Fuzzy Fastly stats lookups: historical totals and live real-time streams

pub mod cli;
pub mod config;
pub mod matching;
pub mod services;
pub mod types;
