use std::time::{Duration, Instant};

use tracing::debug;

use crate::controller::{NextStep, PollTicket, ResponseOutcome, StreamController, StreamStatus};
use crate::counters::Counters;
use crate::filter::{FilterEngine, FilterOutcome};
use crate::gate::LevelGate;
use crate::render::LineRenderer;
use crate::scheduler::{ChunkReport, InsertTarget, InsertionScheduler};
use crate::session::Session;
use crate::table::RowTable;
use tailscope_client::ApiError;
use tailscope_types::{FetchLogResponse, Severity};

/// Tuning knobs for a log tail
#[derive(Clone, Debug)]
pub struct TailConfig {
    /// Delay between a finished batch and the next fetch
    pub poll_interval: Duration,

    /// Rows inserted per scheduler step
    pub chunk_size: usize,

    /// How long rows from later batches stay highlighted
    pub fresh_highlight: Duration,

    /// Server-side long-poll timeout sent with every fetch
    pub long_poll_timeout_secs: u64,

    /// Initial level gate threshold
    pub min_level: Severity,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            chunk_size: 100,
            fresh_highlight: Duration::from_millis(1500),
            long_poll_timeout_secs: 10,
            min_level: Severity::Debug,
        }
    }
}

/// What a fetch result turned into
#[derive(Debug)]
pub enum TailUpdate {
    /// Response for a replaced or stopped session; nothing changed
    Stale,
    /// Batch accepted and queued for insertion
    Inserting { rows: usize },
    /// Fetch failed; polling halted until resumed
    Failed(ApiError),
}

/// Outcome of one insertion step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub chunk: ChunkReport,

    /// Set once the batch is fully inserted
    pub next: Option<NextStep>,
}

/// The full tail pipeline for one screen: control, insertion, and display state
pub struct LogTail {
    controller: StreamController,
    scheduler: InsertionScheduler,
    renderer: LineRenderer,
    table: RowTable,
    filter: FilterEngine,
    gate: LevelGate,
}

impl LogTail {
    pub fn new(config: &TailConfig) -> Self {
        Self {
            controller: StreamController::new(config.poll_interval, config.long_poll_timeout_secs),
            scheduler: InsertionScheduler::new(config.chunk_size),
            renderer: LineRenderer::new(config.fresh_highlight),
            table: RowTable::new(),
            filter: FilterEngine::new(),
            gate: LevelGate::new(config.min_level),
        }
    }

    /// Clear the display and begin tailing `path` from the start
    pub fn start_session(&mut self, path: &str, wait_for_start: bool) -> PollTicket {
        self.scheduler.cancel();
        self.table.clear();
        self.controller.start_session(path, wait_for_start)
    }

    /// Stop tailing; rows already shown stay on screen
    pub fn stop(&mut self) {
        self.scheduler.cancel();
        self.controller.stop();
    }

    /// Feed a fetch result back in
    pub fn handle_response(
        &mut self,
        ticket: &PollTicket,
        result: Result<FetchLogResponse, ApiError>,
    ) -> TailUpdate {
        match self.controller.on_response(ticket, result) {
            ResponseOutcome::Stale => TailUpdate::Stale,
            ResponseOutcome::Failed(e) => TailUpdate::Failed(e),
            ResponseOutcome::Batch {
                session,
                headers,
                records,
                initial,
            } => {
                if self.table.set_headers(headers.clone()) {
                    self.table.recompute_widths(&self.gate);
                }
                let rows = records.len();
                let first_row = self.table.len();
                self.scheduler
                    .enqueue(session, headers, records, first_row, !initial);
                TailUpdate::Inserting { rows }
            }
        }
    }

    pub fn has_pending_insertion(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Insert one chunk; when it completes the batch, the controller decides what follows
    pub fn step(&mut self, now: Instant) -> Option<StepReport> {
        let Some(session) = self.controller.session_mut() else {
            self.scheduler.cancel();
            return None;
        };

        let chunk = self.scheduler.step(
            InsertTarget {
                table: &mut self.table,
                renderer: &self.renderer,
                filter: &self.filter,
                gate: &self.gate,
                session,
            },
            now,
        )?;

        let next = if chunk.finished {
            let next = self.controller.on_batch_consumed(now);
            debug!("batch inserted, next: {:?}", next);
            next
        } else {
            None
        };

        Some(StepReport { chunk, next })
    }

    pub fn next_poll_due(&self) -> Option<Instant> {
        self.controller.next_poll_due()
    }

    pub fn poll_due(&mut self, now: Instant) -> Option<PollTicket> {
        self.controller.poll_due(now)
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn resume(&mut self) -> Option<PollTicket> {
        self.controller.resume()
    }

    pub fn toggle(&mut self) -> Option<PollTicket> {
        self.controller.stop_resume_toggle()
    }

    pub fn polling_enabled(&self) -> bool {
        self.controller.polling_enabled()
    }

    /// Replace the text filter and re-evaluate every row
    pub fn apply_filter(&mut self, pattern: &str) -> FilterOutcome {
        let outcome = self.filter.apply(pattern, self.table.rows_mut());
        if outcome != FilterOutcome::Rejected {
            self.table.recompute_widths(&self.gate);
        }
        outcome
    }

    pub fn set_minimum_level(&mut self, level: Severity) {
        self.gate.set_minimum_level(level);
        self.table.touch();
        self.table.recompute_widths(&self.gate);
    }

    pub fn counters(&self) -> Counters {
        self.controller
            .session()
            .map(|s| s.counters)
            .unwrap_or_default()
    }

    pub fn status(&self) -> StreamStatus {
        self.controller.status()
    }

    pub fn session(&self) -> Option<&Session> {
        self.controller.session()
    }

    pub fn table(&self) -> &RowTable {
        &self.table
    }

    pub fn filter(&self) -> &FilterEngine {
        &self.filter
    }

    pub fn gate(&self) -> &LevelGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailscope_types::ContinuationToken;

    fn response(url: &str, token: &str, messages: &[&str], is_running: bool) -> FetchLogResponse {
        FetchLogResponse {
            url: url.to_string(),
            headers: vec!["level".into(), "message".into()],
            joint_log: messages
                .iter()
                .map(|m| vec![serde_json::Value::from("INFO"), serde_json::Value::from(*m)])
                .collect(),
            logs_data: ContinuationToken(token.to_string()),
            is_running,
        }
    }

    fn tail(chunk_size: usize) -> LogTail {
        LogTail::new(&TailConfig {
            chunk_size,
            ..Default::default()
        })
    }

    fn drain(tail: &mut LogTail, now: Instant) -> Option<NextStep> {
        let mut next = None;
        while let Some(report) = tail.step(now) {
            next = report.next;
        }
        next
    }

    fn messages(tail: &LogTail) -> Vec<String> {
        tail.table()
            .rows()
            .iter()
            .map(|r| r.cells[1].text.clone())
            .collect()
    }

    #[test]
    fn test_session_switch_mid_insertion_leaves_no_old_rows() {
        let mut tail = tail(10);
        let old = tail.start_session("exp/a", false);
        let many: Vec<String> = (0..25).map(|i| format!("a{}", i)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        tail.handle_response(&old, Ok(response("exp/a", "t1", &many, true)));

        let first = tail.step(Instant::now()).unwrap();
        assert_eq!(first.chunk.inserted, 0..10);

        let new = tail.start_session("exp/b", false);
        assert!(tail.table().is_empty());
        assert!(tail.step(Instant::now()).is_none());

        let late = tail.handle_response(&old, Ok(response("exp/a", "t2", &["a-late"], true)));
        assert!(matches!(late, TailUpdate::Stale));

        tail.handle_response(&new, Ok(response("exp/b", "t1", &["b0", "b1"], true)));
        let next = drain(&mut tail, Instant::now());
        assert!(matches!(next, Some(NextStep::PollAt(_))));
        assert_eq!(messages(&tail), vec!["b0", "b1"]);
        assert_eq!(tail.counters().total, 2);
    }

    #[test]
    fn test_stale_response_changes_nothing() {
        let mut tail = tail(100);
        let old = tail.start_session("exp/a", false);
        tail.stop();

        let before = tail.table().revision();
        let update = tail.handle_response(&old, Ok(response("exp/a", "t1", &["x"], true)));
        assert!(matches!(update, TailUpdate::Stale));
        assert!(!tail.has_pending_insertion());
        assert_eq!(tail.table().revision(), before);
        assert_eq!(tail.status(), StreamStatus::Idle);
    }

    #[test]
    fn test_pause_while_in_flight() {
        let mut tail = tail(100);
        let ticket = tail.start_session("exp/a", false);
        tail.pause();

        tail.handle_response(&ticket, Ok(response("exp/a", "t1", &["x"], true)));
        assert_eq!(drain(&mut tail, Instant::now()), Some(NextStep::Paused));
        assert_eq!(messages(&tail), vec!["x"]);
        assert!(tail.next_poll_due().is_none());

        let resumed = tail.toggle().unwrap();
        assert_eq!(resumed.request.logs_data, Some(ContinuationToken("t1".into())));
    }

    #[test]
    fn test_later_batches_append_and_highlight() {
        let mut tail = tail(100);
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(response("exp/a", "t1", &["one"], true)));
        let now = Instant::now();
        drain(&mut tail, now);

        let due = tail.next_poll_due().unwrap();
        let ticket = tail.poll_due(due).unwrap();
        tail.handle_response(&ticket, Ok(response("exp/a", "t2", &["two", "three"], true)));
        drain(&mut tail, now);

        assert_eq!(messages(&tail), vec!["one", "two", "three"]);
        let fresh: Vec<bool> = tail.table().rows().iter().map(|r| r.is_fresh(now)).collect();
        assert_eq!(fresh, vec![false, true, true]);
    }

    #[test]
    fn test_empty_batch_reschedules() {
        let mut tail = tail(100);
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(response("exp/a", "t1", &[], true)));

        let report = tail.step(Instant::now()).unwrap();
        assert!(report.chunk.finished);
        assert!(matches!(report.next, Some(NextStep::PollAt(_))));
        assert_eq!(tail.table().headers().len(), 2);
    }

    #[test]
    fn test_filter_covers_rows_inserted_later() {
        let mut tail = tail(2);
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(
            &ticket,
            Ok(response("exp/a", "t1", &["keep 1", "drop", "keep 2", "drop"], true)),
        );
        tail.step(Instant::now());
        assert_eq!(tail.apply_filter("KEEP"), FilterOutcome::Applied { matching: 1 });
        drain(&mut tail, Instant::now());

        let visible: Vec<usize> = tail.table().visible_indices(tail.gate());
        assert_eq!(visible, vec![0, 2]);
    }

    #[test]
    fn test_level_gate_hides_rows() {
        let mut tail = tail(100);
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(response("exp/a", "t1", &["x", "y"], true)));
        drain(&mut tail, Instant::now());

        tail.set_minimum_level(Severity::Error);
        assert!(tail.table().visible_indices(tail.gate()).is_empty());
        assert_eq!(tail.counters().info, 2);
    }

    #[test]
    fn test_dead_process_reported_after_insertion() {
        let mut tail = tail(100);
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(response("exp/a", "t1", &["bye"], false)));

        assert_eq!(drain(&mut tail, Instant::now()), Some(NextStep::Dead));
        assert_eq!(tail.status(), StreamStatus::Dead);
    }
}
