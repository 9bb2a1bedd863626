//! Slack progress sink
//!
//! Posts Block Kit messages with `chat.postMessage`, refreshes them with
//! `chat.update` and removes them with `chat.delete`.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::SlackConfig;
use crate::services::aggregator::format_magnitude;
use crate::services::notify::{MessageHandle, ProgressSink};
use crate::types::{FastlyStatsError, Result, Summary, SummaryKind, Trend};

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// "status_5xx" → "Status 5xx"
fn field_title(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn trend_emoji(trend: Trend) -> &'static str {
    match trend {
        Trend::Up => " :arrow_up:",
        Trend::Down => " :arrow_down:",
        Trend::Flat => "",
    }
}

/// Block Kit layout for a summary
pub fn summary_blocks(summary: &Summary) -> Vec<Value> {
    let header = if summary.kind.is_realtime() {
        ":bar_chart: Real-Time Data Summary"
    } else {
        ":bar_chart: Historical Data Summary"
    };

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": header }
        }),
        json!({
            "type": "section",
            "fields": [
                {
                    "type": "mrkdwn",
                    "text": format!(
                        "*Service Name:*\n<{}|{}>",
                        summary.dashboard_url, summary.service.name
                    )
                },
                {
                    "type": "mrkdwn",
                    "text": format!("*Environment:*\n{}", summary.service.environment.title())
                }
            ]
        }),
        json!({ "type": "divider" }),
    ];

    for report in &summary.fields {
        let mut text = format!(
            "*{}*\n*Total:* `{}`",
            field_title(&report.field),
            format_magnitude(report.total)
        );
        if let Some(last) = report.last_interval {
            text.push_str(&format!(
                "\n*Last Interval:* `{}`{}",
                format_magnitude(last),
                trend_emoji(report.trend)
            ));
        }
        blocks.push(json!({
            "type": "section",
            "fields": [{ "type": "mrkdwn", "text": text }]
        }));
    }

    if summary.kind == SummaryKind::Progress {
        blocks.push(json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": "_You can stop the stream by clicking on the 'Stop' button on this thread._"
            }
        }));
    }

    blocks
}

/// Plain-text fallback shown in notifications
fn fallback_text(summary: &Summary) -> String {
    format!("Fastly stats for {}", summary.service.name)
}

pub struct SlackSink {
    http: Client,
    config: SlackConfig,
}

impl SlackSink {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| FastlyStatsError::Sink(format!("HTTP client error: {}", e)))?;
        Ok(Self { http, config })
    }

    fn call(&self, method: &str, body: Value) -> Result<SlackResponse> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), method);
        debug!(method, "slack call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .map_err(|e| FastlyStatsError::Sink(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FastlyStatsError::Sink(format!("{} returned {}", method, status)));
        }

        let parsed: SlackResponse = response
            .json()
            .map_err(|e| FastlyStatsError::Sink(format!("{} JSON parse error: {}", method, e)))?;
        if !parsed.ok {
            return Err(FastlyStatsError::Sink(format!(
                "{} failed: {}",
                method,
                parsed.error.as_deref().unwrap_or("unknown_error")
            )));
        }
        Ok(parsed)
    }
}

impl ProgressSink for SlackSink {
    fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>> {
        let mut body = json!({
            "channel": self.config.channel,
            "text": fallback_text(summary),
            "blocks": summary_blocks(summary),
        });
        if let Some(thread_ts) = &self.config.thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }

        let response = self.call("chat.postMessage", body)?;
        let handle = MessageHandle {
            channel: response.channel.unwrap_or_else(|| self.config.channel.clone()),
            ts: response
                .ts
                .ok_or_else(|| FastlyStatsError::Sink("chat.postMessage returned no ts".into()))?,
        };
        Ok(Some(handle))
    }

    fn update(&mut self, handle: Option<&MessageHandle>, summary: &Summary) -> Result<()> {
        let Some(handle) = handle else {
            return Err(FastlyStatsError::Sink("no message to update".into()));
        };
        let body = json!({
            "channel": handle.channel,
            "ts": handle.ts,
            "text": fallback_text(summary),
            "blocks": summary_blocks(summary),
        });
        self.call("chat.update", body).map(|_| ())
    }

    fn delete(&mut self, handle: &MessageHandle) -> Result<()> {
        let body = json!({ "channel": handle.channel, "ts": handle.ts });
        self.call("chat.delete", body).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notify::tests::make_summary;
    use mockito::{Matcher, Server};

    fn make_sink(server: &Server, thread_ts: Option<&str>) -> SlackSink {
        SlackSink::new(SlackConfig {
            token: "xoxb-test".into(),
            channel: "C123".into(),
            thread_ts: thread_ts.map(String::from),
            base_url: server.url(),
        })
        .unwrap()
    }

    #[test]
    fn test_field_title() {
        assert_eq!(field_title("status_5xx"), "Status 5xx");
        assert_eq!(field_title("all_pass_requests"), "All Pass Requests");
        assert_eq!(field_title("hits"), "Hits");
    }

    #[test]
    fn test_blocks_realtime_progress() {
        let mut summary = make_summary(SummaryKind::Progress, &[("hits", 1500.0, Some(20.0))]);
        summary.fields[0].trend = Trend::Up;
        let blocks = summary_blocks(&summary);

        assert_eq!(blocks[0]["text"]["text"], ":bar_chart: Real-Time Data Summary");
        assert_eq!(
            blocks[1]["fields"][0]["text"],
            "*Service Name:*\n<https://example.invalid/SVC1|dev-api>"
        );
        assert_eq!(blocks[1]["fields"][1]["text"], "*Environment:*\nDev");
        assert_eq!(blocks[2]["type"], "divider");
        assert_eq!(
            blocks[3]["fields"][0]["text"],
            "*Hits*\n*Total:* `1.5K (1500)`\n*Last Interval:* `20` :arrow_up:"
        );
        assert!(blocks[4]["text"]["text"].as_str().unwrap().contains("Stop"));
    }

    #[test]
    fn test_blocks_historical_has_no_interval_or_stop_hint() {
        let summary = make_summary(SummaryKind::Historical, &[("miss", 3.0, None)]);
        let blocks = summary_blocks(&summary);
        assert_eq!(blocks[0]["text"]["text"], ":bar_chart: Historical Data Summary");
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[3]["fields"][0]["text"], "*Miss*\n*Total:* `3`");
    }

    #[test]
    fn test_publish_returns_handle() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::PartialJson(json!({
                "channel": "C123",
                "thread_ts": "111.222"
            })))
            .with_body(r#"{"ok":true,"channel":"C123","ts":"333.444"}"#)
            .create();

        let mut sink = make_sink(&server, Some("111.222"));
        let handle = sink
            .publish(&make_summary(SummaryKind::Progress, &[("hits", 0.0, Some(0.0))]))
            .unwrap();

        mock.assert();
        assert_eq!(
            handle,
            Some(MessageHandle {
                channel: "C123".into(),
                ts: "333.444".into()
            })
        );
    }

    #[test]
    fn test_publish_not_ok_is_sink_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/chat.postMessage")
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .create();

        let mut sink = make_sink(&server, None);
        let err = sink
            .publish(&make_summary(SummaryKind::Final, &[("hits", 1.0, None)]))
            .unwrap_err();
        assert!(matches!(err, FastlyStatsError::Sink(m) if m.contains("channel_not_found")));
    }

    #[test]
    fn test_update_and_delete_target_handle() {
        let mut server = Server::new();
        let update = server
            .mock("POST", "/chat.update")
            .match_body(Matcher::PartialJson(json!({ "channel": "C9", "ts": "1.5" })))
            .with_body(r#"{"ok":true}"#)
            .create();
        let delete = server
            .mock("POST", "/chat.delete")
            .match_body(Matcher::Json(json!({ "channel": "C9", "ts": "1.5" })))
            .with_body(r#"{"ok":true}"#)
            .create();

        let mut sink = make_sink(&server, None);
        let handle = MessageHandle {
            channel: "C9".into(),
            ts: "1.5".into(),
        };
        sink.update(
            Some(&handle),
            &make_summary(SummaryKind::Progress, &[("hits", 1.0, Some(1.0))]),
        )
        .unwrap();
        sink.delete(&handle).unwrap();

        update.assert();
        delete.assert();
    }

    #[test]
    fn test_update_without_handle_fails() {
        let server = Server::new();
        let mut sink = make_sink(&server, None);
        assert!(sink
            .update(None, &make_summary(SummaryKind::Progress, &[]))
            .is_err());
    }
}
