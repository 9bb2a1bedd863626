//! Bounded real-time streaming session
//!
//! `Idle → Polling → Completed | Aborted`. Each tick sleeps for the wait
//! interval, fetches exactly that interval's real-time slice and folds it
//! into the running totals. The progress message posted at session start is
//! deleted exactly once when the session ends, however it ends.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::services::aggregator::RunningTotal;
use crate::services::client::StatsSource;
use crate::services::dashboard::dashboard_url;
use crate::services::notify::{MessageHandle, ProgressSink};
use crate::types::{FieldReport, ServiceRef, Summary, SummaryKind};

/// Time source for the polling loop
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with a blocking sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Polling,
    Completed,
    /// A real-time fetch failed; no final summary was published
    Aborted,
}

/// Result of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub polls: u32,
    /// Cumulative per-field totals at the time the session ended
    pub totals: Vec<FieldReport>,
}

pub struct SessionStreamer<'a, S, K, C = SystemClock> {
    source: &'a S,
    sink: &'a mut K,
    clock: C,
    config: StreamConfig,
    service: ServiceRef,
    totals: RunningTotal,
    state: SessionState,
    polls: u32,
    progress: Option<MessageHandle>,
}

impl<'a, S, K> SessionStreamer<'a, S, K, SystemClock>
where
    S: StatsSource,
    K: ProgressSink,
{
    pub fn new<F: AsRef<str>>(
        source: &'a S,
        sink: &'a mut K,
        service: ServiceRef,
        tracked: &[F],
        config: StreamConfig,
    ) -> Self {
        Self::with_clock(source, sink, service, tracked, config, SystemClock)
    }
}

impl<'a, S, K, C> SessionStreamer<'a, S, K, C>
where
    S: StatsSource,
    K: ProgressSink,
    C: Clock,
{
    pub fn with_clock<F: AsRef<str>>(
        source: &'a S,
        sink: &'a mut K,
        service: ServiceRef,
        tracked: &[F],
        config: StreamConfig,
        clock: C,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            config,
            service,
            totals: RunningTotal::new(tracked),
            state: SessionState::Idle,
            polls: 0,
            progress: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until the duration elapses or a fetch fails
    pub fn run(mut self) -> SessionOutcome {
        let initial = self.summary(SummaryKind::Progress, self.totals.reports());
        self.progress = self.publish(&initial);

        self.state = SessionState::Polling;
        self.state = self.poll();

        if self.state == SessionState::Completed {
            let summary = self.summary(SummaryKind::Final, self.totals.totals());
            self.publish(&summary);
        }

        self.release_progress();

        info!(state = ?self.state, polls = self.polls, "streaming session finished");
        SessionOutcome {
            state: self.state,
            polls: self.polls,
            totals: self.totals.totals(),
        }
    }

    fn poll(&mut self) -> SessionState {
        let deadline = self.clock.now() + self.config.duration;
        let interval_secs = self.config.interval.as_secs();

        while self.clock.now() < deadline {
            self.clock.sleep(self.config.interval);

            let samples = match self.source.fetch_realtime(&self.service.id, interval_secs) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(error = %e, polls = self.polls, "real-time fetch failed");
                    return SessionState::Aborted;
                }
            };

            let sums = self.totals.add_interval(&samples);
            self.polls += 1;
            debug!(poll = self.polls, ?sums, "interval aggregated");

            let summary = self.summary(SummaryKind::Progress, self.totals.reports());
            if let Err(e) = self.sink.update(self.progress.as_ref(), &summary) {
                warn!(error = %e, "failed to publish progress");
            }
        }

        SessionState::Completed
    }

    fn publish(&mut self, summary: &Summary) -> Option<MessageHandle> {
        self.sink.publish(summary).unwrap_or_else(|e| {
            warn!(error = %e, kind = ?summary.kind, "failed to publish summary");
            None
        })
    }

    /// Delete the progress message; `take` makes a second call a no-op
    fn release_progress(&mut self) {
        if let Some(handle) = self.progress.take() {
            if let Err(e) = self.sink.delete(&handle) {
                warn!(error = %e, "failed to delete progress message");
            }
        }
    }

    fn summary(&self, kind: SummaryKind, fields: Vec<FieldReport>) -> Summary {
        let range = format!("{}s", self.config.duration.as_secs());
        Summary {
            kind,
            service: self.service.clone(),
            fields,
            interval_secs: Some(self.config.interval.as_secs()),
            dashboard_url: dashboard_url(&self.service.id, &range, true),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Environment, FastlyStatsError, Result, Sample, TimeWindow, Trend};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Clock that only moves when slept on
    pub(crate) struct ManualClock {
        now: Cell<Instant>,
        slept: Cell<u32>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
                slept: Cell::new(0),
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
            self.slept.set(self.slept.get() + 1);
        }
    }

    /// Replays scripted real-time responses; runs dry with a fetch error
    struct ScriptedSource {
        responses: RefCell<VecDeque<Result<Vec<Sample>>>>,
        requested: RefCell<Vec<(String, u64)>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Sample>>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl StatsSource for ScriptedSource {
        fn fetch_historical(&self, _: &str, _: &TimeWindow) -> Result<Vec<Sample>> {
            unreachable!("streaming never fetches historical data")
        }

        fn fetch_realtime(&self, service_id: &str, interval_secs: u64) -> Result<Vec<Sample>> {
            self.requested
                .borrow_mut()
                .push((service_id.to_string(), interval_secs));
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(FastlyStatsError::Fetch("script exhausted".into())))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Publish(SummaryKind),
        Update(Option<MessageHandle>, Vec<FieldReport>),
        Delete(MessageHandle),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
        fail_publish: bool,
    }

    fn handle() -> MessageHandle {
        MessageHandle {
            channel: "C1".into(),
            ts: "100.1".into(),
        }
    }

    impl ProgressSink for RecordingSink {
        fn publish(&mut self, summary: &Summary) -> Result<Option<MessageHandle>> {
            self.events.push(Event::Publish(summary.kind));
            if self.fail_publish {
                return Err(FastlyStatsError::Sink("not_authed".into()));
            }
            Ok((summary.kind == SummaryKind::Progress).then(handle))
        }

        fn update(&mut self, handle: Option<&MessageHandle>, summary: &Summary) -> Result<()> {
            self.events
                .push(Event::Update(handle.cloned(), summary.fields.clone()));
            Ok(())
        }

        fn delete(&mut self, handle: &MessageHandle) -> Result<()> {
            self.events.push(Event::Delete(handle.clone()));
            Ok(())
        }
    }

    fn service() -> ServiceRef {
        ServiceRef {
            name: "dev-api".into(),
            id: "SVC1".into(),
            environment: Environment::Dev,
        }
    }

    fn sample(pairs: &[(&str, f64)]) -> Sample {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn run_session(
        source: &ScriptedSource,
        sink: &mut RecordingSink,
        clock: &ManualClock,
        duration: u64,
        interval: u64,
    ) -> SessionOutcome {
        let config = StreamConfig::from_secs(duration, interval).unwrap();
        SessionStreamer::with_clock(source, sink, service(), &["requests", "hits"], config, clock)
            .run()
    }

    fn deletes(sink: &RecordingSink) -> usize {
        sink.events
            .iter()
            .filter(|e| matches!(e, Event::Delete(_)))
            .count()
    }

    #[test]
    fn test_six_seconds_at_two_second_interval_polls_three_times() {
        let source = ScriptedSource::new(vec![
            Ok(vec![sample(&[("requests", 3.0)]), sample(&[("requests", 2.0), ("hits", 1.0)])]),
            Ok(vec![sample(&[("requests", 10.0), ("hits", 4.0)])]),
            Ok(vec![sample(&[("hits", 2.0)])]),
        ]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        let outcome = run_session(&source, &mut sink, &clock, 6, 2);

        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.polls, 3);
        assert_eq!(clock.slept.get(), 3);
        assert_eq!(outcome.totals[0].field, "requests");
        assert_eq!(outcome.totals[0].total, 15.0);
        assert_eq!(outcome.totals[1].field, "hits");
        assert_eq!(outcome.totals[1].total, 7.0);

        let requested = source.requested.borrow();
        assert_eq!(requested.len(), 3);
        assert!(requested.iter().all(|(id, secs)| id == "SVC1" && *secs == 2));
    }

    #[test]
    fn test_completed_session_event_order() {
        let source = ScriptedSource::new(vec![
            Ok(vec![sample(&[("requests", 1.0)])]),
            Ok(vec![sample(&[("requests", 5.0)])]),
        ]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        run_session(&source, &mut sink, &clock, 4, 2);

        assert_eq!(sink.events.len(), 5);
        assert_eq!(sink.events[0], Event::Publish(SummaryKind::Progress));
        assert!(matches!(&sink.events[1], Event::Update(Some(h), _) if *h == handle()));
        assert!(matches!(&sink.events[2], Event::Update(Some(_), _)));
        assert_eq!(sink.events[3], Event::Publish(SummaryKind::Final));
        assert_eq!(sink.events[4], Event::Delete(handle()));
    }

    #[test]
    fn test_progress_updates_carry_interval_and_trend() {
        let source = ScriptedSource::new(vec![
            Ok(vec![sample(&[("requests", 4.0)])]),
            Ok(vec![sample(&[("requests", 1.0), ("hits", 2.0)])]),
        ]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        run_session(&source, &mut sink, &clock, 4, 2);

        let Event::Update(_, fields) = &sink.events[2] else {
            panic!("expected update");
        };
        assert_eq!(fields[0].total, 5.0);
        assert_eq!(fields[0].last_interval, Some(1.0));
        assert_eq!(fields[0].trend, Trend::Down);
        assert_eq!(fields[1].trend, Trend::Up);
    }

    #[test]
    fn test_fetch_failure_aborts_and_still_deletes_progress() {
        let source = ScriptedSource::new(vec![
            Ok(vec![sample(&[("requests", 2.0)])]),
            Err(FastlyStatsError::Fetch("503".into())),
            Ok(vec![sample(&[("requests", 100.0)])]),
        ]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        let outcome = run_session(&source, &mut sink, &clock, 10, 2);

        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.totals[0].total, 2.0);
        // no retry after the failure
        assert_eq!(source.requested.borrow().len(), 2);
        assert!(!sink.events.contains(&Event::Publish(SummaryKind::Final)));
        assert_eq!(deletes(&sink), 1);
        assert_eq!(sink.events.last(), Some(&Event::Delete(handle())));
    }

    #[test]
    fn test_first_fetch_failure_aborts_without_polls() {
        let source = ScriptedSource::new(vec![]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        let outcome = run_session(&source, &mut sink, &clock, 6, 2);

        assert_eq!(outcome.state, SessionState::Aborted);
        assert_eq!(outcome.polls, 0);
        assert_eq!(deletes(&sink), 1);
    }

    #[test]
    fn test_sink_failures_do_not_stop_the_session() {
        let source = ScriptedSource::new(vec![
            Ok(vec![sample(&[("hits", 1.0)])]),
            Ok(vec![sample(&[("hits", 1.0)])]),
        ]);
        let mut sink = RecordingSink {
            fail_publish: true,
            ..Default::default()
        };
        let clock = ManualClock::new();

        let outcome = run_session(&source, &mut sink, &clock, 4, 2);

        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.polls, 2);
        assert_eq!(outcome.totals[1].total, 2.0);
        // nothing was posted, so nothing to delete
        assert_eq!(deletes(&sink), 0);
        assert!(matches!(&sink.events[1], Event::Update(None, _)));
    }

    #[test]
    fn test_duration_shorter_than_interval_polls_once() {
        let source = ScriptedSource::new(vec![Ok(vec![sample(&[("requests", 9.0)])])]);
        let mut sink = RecordingSink::default();
        let clock = ManualClock::new();

        let outcome = run_session(&source, &mut sink, &clock, 1, 2);

        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.totals[0].total, 9.0);
    }

    #[test]
    fn test_new_streamer_is_idle() {
        let source = ScriptedSource::new(vec![]);
        let mut sink = RecordingSink::default();
        let streamer = SessionStreamer::new(
            &source,
            &mut sink,
            service(),
            &["hits"],
            StreamConfig::default(),
        );
        assert_eq!(streamer.state(), SessionState::Idle);
    }
}
