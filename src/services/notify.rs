//! Progress sinks: where summaries are published
//!
//! The streaming session only talks to the narrow `ProgressSink` interface,
//! so console and chat output can be swapped without touching aggregation.

use std::io::{self, Stdout, Write};

use crate::services::aggregator::format_magnitude;
use crate::types::{FastlyStatsError, Result, Summary, SummaryKind};

/// Reference to a posted chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub channel: String,
    pub ts: String,
}

pub trait ProgressSink {
    /// Post a new message. Sinks without addressable messages return `None`.
    fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>>;

    /// Refresh a progress message; `handle` is `None` if publish returned none
    fn update(&mut self, handle: Option<&MessageHandle>, summary: &Summary) -> Result<()>;

    /// Remove a posted message
    fn delete(&mut self, handle: &MessageHandle) -> Result<()>;
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>> {
        (**self).publish(summary)
    }

    fn update(&mut self, handle: Option<&MessageHandle>, summary: &Summary) -> Result<()> {
        (**self).update(handle, summary)
    }

    fn delete(&mut self, handle: &MessageHandle) -> Result<()> {
        (**self).delete(handle)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>> {
        (**self).publish(summary)
    }

    fn update(&mut self, handle: Option<&MessageHandle>, summary: &Summary) -> Result<()> {
        (**self).update(handle, summary)
    }

    fn delete(&mut self, handle: &MessageHandle) -> Result<()> {
        (**self).delete(handle)
    }
}

/// Plain-text sink writing to stdout (or any writer in tests)
pub struct ConsoleSink<W: Write = Stdout> {
    out: W,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_report(&mut self, summary: &Summary) -> io::Result<()> {
        match summary.kind {
            // no persistent message to show on the console
            SummaryKind::Progress => Ok(()),
            SummaryKind::Final => {
                writeln!(self.out, "\nTotal Real-Time Data Summary:")?;
                for report in &summary.fields {
                    writeln!(self.out, "{}: {}", report.field, format_magnitude(report.total))?;
                }
                writeln!(self.out, "\n---\n")
            }
            SummaryKind::Historical => {
                writeln!(
                    self.out,
                    "Historical Data Summary for {} ({}):",
                    summary.service.name,
                    summary.service.environment.title()
                )?;
                for report in &summary.fields {
                    writeln!(self.out, "  {}: {}", report.field, format_magnitude(report.total))?;
                }
                Ok(())
            }
        }
    }

    fn write_interval(&mut self, summary: &Summary) -> io::Result<()> {
        writeln!(
            self.out,
            "\nReal-Time Data Summary (Last {} seconds):",
            summary.interval_secs.unwrap_or_default()
        )?;
        for report in &summary.fields {
            let value = report.last_interval.unwrap_or(report.total);
            writeln!(self.out, "{}: {}", report.field, format_magnitude(value))?;
        }
        writeln!(self.out, "\n---\n")
    }
}

impl<W: Write> ProgressSink for ConsoleSink<W> {
    fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>> {
        self.write_report(summary)
            .map_err(|e| FastlyStatsError::Sink(format!("console write failed: {}", e)))?;
        Ok(None)
    }

    fn update(&mut self, _handle: Option<&MessageHandle>, summary: &Summary) -> Result<()> {
        self.write_interval(summary)
            .map_err(|e| FastlyStatsError::Sink(format!("console write failed: {}", e)))
    }

    fn delete(&mut self, _handle: &MessageHandle) -> Result<()> {
        Ok(())
    }
}
