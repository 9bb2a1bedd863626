use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use crate::config::{Config, StreamConfig, DEFAULT_STREAM_SECS, DEFAULT_WAIT_SECS};
use crate::services::catalog::Catalog;
use crate::services::client::StatsClient;
use crate::services::duration::SUPPORTED_FORMATS;
use crate::services::notify::{ConsoleSink, ProgressSink};
use crate::services::query::{QueryMode, QueryRequest, QueryService};
use crate::services::slack::SlackSink;
use crate::types::{Environment, FastlyStatsError, Result};

pub const USAGE: &str = "Usage: fastly-stats <environment> <service_name> <field_name|overview> \
<duration|realtime [duration_secs [wait_secs]]>\n       fastly-stats list_services";

const LIST_SERVICES: &str = "list_services";
const REALTIME: &str = "realtime";

/// Fuzzy Fastly stats lookup: historical totals or a live real-time stream
#[derive(Parser, Debug)]
#[command(name = "fastly-stats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    pub debug: bool,

    /// `list_services`, or <environment> <service> <field|overview> <duration|realtime ...>
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    args: Vec<String>,
}

/// What the positional arguments ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    ListServices,
    Query(QueryRequest),
}

fn parse_secs(value: Option<&String>, name: &str, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            FastlyStatsError::Config(format!(
                "{} must be a whole number of seconds, got '{}'",
                name, v
            ))
        }),
    }
}

/// Map positional arguments to an invocation. Errors here are usage errors.
pub fn parse_invocation(args: &[String]) -> Result<Invocation> {
    if let [only] = args {
        if only == LIST_SERVICES {
            return Ok(Invocation::ListServices);
        }
    }

    let [environment, service, field, rest @ ..] = args else {
        return Err(FastlyStatsError::Config("missing arguments".into()));
    };
    if rest.is_empty() {
        return Err(FastlyStatsError::Config("missing duration".into()));
    }

    let mode = if rest[0].eq_ignore_ascii_case(REALTIME) {
        if rest.len() > 3 {
            return Err(FastlyStatsError::Config("too many realtime arguments".into()));
        }
        let duration = parse_secs(rest.get(1), "duration_secs", DEFAULT_STREAM_SECS)?;
        let wait = parse_secs(rest.get(2), "wait_secs", DEFAULT_WAIT_SECS)?;
        QueryMode::Realtime(StreamConfig::from_secs(duration, wait)?)
    } else {
        // unquoted durations arrive split across arguments
        QueryMode::Historical {
            duration: rest.join(" "),
        }
    };

    Ok(Invocation::Query(QueryRequest {
        environment: environment.clone(),
        service: service.clone(),
        field: field.clone(),
        mode,
    }))
}

/// Print a pipeline failure and pick the exit status.
/// Only an ambiguous field fails the process; everything else exits cleanly.
fn report<W: Write>(result: Result<()>, out: &mut W) -> io::Result<u8> {
    let Err(err) = result else {
        return Ok(0);
    };

    match &err {
        FastlyStatsError::AmbiguousField { query, suggestions } => {
            writeln!(out, "Field '{}' is ambiguous. Closest matches:", query)?;
            for suggestion in suggestions {
                writeln!(out, "  - {}", suggestion)?;
            }
        }
        FastlyStatsError::InvalidEnvironment(env) => {
            let valid: Vec<&str> = Environment::ALL.iter().map(|e| e.as_str()).collect();
            writeln!(
                out,
                "No matching environment found for '{}'. Valid environments: {}",
                env,
                valid.join(", ")
            )?;
        }
        FastlyStatsError::InvalidFormat(_) | FastlyStatsError::InvalidUnit(_) => {
            writeln!(out, "Error: {}", err)?;
            writeln!(out, "Supported formats: {}", SUPPORTED_FORMATS)?;
        }
        _ => writeln!(out, "Error: {}", err)?,
    }

    Ok(if err.is_fatal() { 1 } else { 0 })
}

impl Cli {
    pub fn run(self) -> anyhow::Result<ExitCode> {
        let invocation = match parse_invocation(&self.args) {
            Ok(invocation) => invocation,
            Err(e) => {
                eprintln!("{}", e);
                eprintln!("{}", USAGE);
                return Ok(ExitCode::FAILURE);
            }
        };

        let result = Config::from_env().and_then(|config| execute(&invocation, &config));
        let status = report(result, &mut io::stdout())?;
        Ok(ExitCode::from(status))
    }
}

/// Build the client and sink for `config` and carry out the invocation
fn execute(invocation: &Invocation, config: &Config) -> Result<()> {
    let client = StatsClient::new(config)?;
    let catalog = Catalog::new(config);
    let sink: Box<dyn ProgressSink> = match &config.slack {
        Some(slack) => Box::new(SlackSink::new(slack.clone())?),
        None => Box::new(ConsoleSink::stdout()),
    };
    let mut query = QueryService::new(client, catalog, sink, io::stdout());

    match invocation {
        Invocation::ListServices => query.list_services(),
        Invocation::Query(request) => query.run(request),
    }
}
