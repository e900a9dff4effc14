use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionId};
use tailscope_client::ApiError;
use tailscope_types::{FetchLogRequest, FetchLogResponse, Headers, LogRecord};

/// A fetch the controller wants issued, tagged with who asked for it
#[derive(Clone, Debug, PartialEq)]
pub struct PollTicket {
    pub session: SessionId,

    /// Path the fetch targets; compared against the active session on arrival
    pub path: String,

    pub request: FetchLogRequest,
}

/// What became of a poll response
#[derive(Debug)]
pub enum ResponseOutcome {
    /// Belongs to a session that is no longer active; dropped
    Stale,
    /// Accepted; these records must now be inserted
    Batch {
        session: SessionId,
        headers: Headers,
        records: Vec<LogRecord>,
        /// First accepted response of the session
        initial: bool,
    },
    /// Transport or server error; polling stops until resumed
    Failed(ApiError),
}

/// What the controller does after a batch has been fully inserted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Fetch again once this instant passes
    PollAt(Instant),
    /// Alive but polling disabled
    Paused,
    /// The process is no longer running
    Dead,
}

/// Stream state as shown to the operator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Live,
    Paused,
    Dead,
    Failed,
}

impl StreamStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Dead => "terminated",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Fetching,
    Inserting,
    Waiting { due: Instant },
    Paused,
    Dead,
    Failed,
}

/// Owns the active session and decides when to poll
///
/// Polls are strictly sequential: a new fetch is only handed out once the
/// previous response was processed and its batch fully inserted.
pub struct StreamController {
    session: Option<Session>,
    next_id: u64,
    polling_enabled: bool,
    phase: Phase,
    poll_interval: Duration,
    long_poll_timeout: u64,
}

impl StreamController {
    pub fn new(poll_interval: Duration, long_poll_timeout: u64) -> Self {
        Self {
            session: None,
            next_id: 0,
            polling_enabled: true,
            phase: Phase::Idle,
            poll_interval,
            long_poll_timeout,
        }
    }

    /// Replace any existing session and request the full log of `path`
    pub fn start_session(&mut self, path: &str, wait_for_start: bool) -> PollTicket {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        info!("starting session {:?} for '{}'", id, path);

        let session = Session::new(id, path.to_string(), wait_for_start);
        let ticket = ticket_for(&session, self.long_poll_timeout);
        self.session = Some(session);
        self.polling_enabled = true;
        self.phase = Phase::Fetching;
        ticket
    }

    /// End the active session; late responses for it become stale
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("stopped session {:?} for '{}'", session.id, session.path);
        }
        self.phase = Phase::Idle;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Whether a ticket still belongs to the active session
    pub fn is_current(&self, ticket: &PollTicket) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.id == ticket.session && s.path == ticket.path)
    }

    /// Process the result of a fetch
    pub fn on_response(
        &mut self,
        ticket: &PollTicket,
        result: Result<FetchLogResponse, ApiError>,
    ) -> ResponseOutcome {
        if !self.is_current(ticket) || self.phase != Phase::Fetching {
            debug!(
                "discarding stale response for '{}' ({:?})",
                ticket.path, ticket.session
            );
            return ResponseOutcome::Stale;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("log fetch for '{}' failed: {}", ticket.path, e);
                self.phase = Phase::Failed;
                return ResponseOutcome::Failed(e);
            }
        };

        let Some(session) = self.session.as_mut() else {
            return ResponseOutcome::Stale;
        };

        if response.url != session.path {
            debug!(
                "server answered '{}' for session path '{}'",
                response.url, session.path
            );
        }

        let offered = Headers::new(response.headers.clone());
        let headers = match &session.headers {
            Some(existing) => {
                if *existing != offered {
                    warn!("ignoring header change mid-stream for '{}'", session.path);
                }
                existing.clone()
            }
            None => {
                session.headers = Some(offered.clone());
                offered
            }
        };

        session.token = Some(response.logs_data.clone());
        session.is_running = response.is_running;
        session.batches += 1;
        session.last_update = Some(Local::now());
        self.phase = Phase::Inserting;

        ResponseOutcome::Batch {
            session: session.id,
            headers,
            records: response.records(),
            initial: session.batches == 1,
        }
    }

    /// The insertion scheduler finished the current batch
    pub fn on_batch_consumed(&mut self, now: Instant) -> Option<NextStep> {
        if self.phase != Phase::Inserting {
            return None;
        }
        let session = self.session.as_ref()?;

        let next = if !session.is_running {
            info!("process at '{}' is no longer running", session.path);
            self.phase = Phase::Dead;
            NextStep::Dead
        } else if self.polling_enabled {
            let due = now + self.poll_interval;
            self.phase = Phase::Waiting { due };
            NextStep::PollAt(due)
        } else {
            self.phase = Phase::Paused;
            NextStep::Paused
        };
        Some(next)
    }

    /// When the next scheduled poll is due, if one is scheduled
    pub fn next_poll_due(&self) -> Option<Instant> {
        match self.phase {
            Phase::Waiting { due } => Some(due),
            _ => None,
        }
    }

    /// Hand out the scheduled poll once its delay has passed
    pub fn poll_due(&mut self, now: Instant) -> Option<PollTicket> {
        match self.phase {
            Phase::Waiting { due } if due <= now && self.polling_enabled => {
                let ticket = self.ticket()?;
                self.phase = Phase::Fetching;
                Some(ticket)
            }
            _ => None,
        }
    }

    /// Stop scheduling polls; an in-flight response is still processed
    pub fn pause(&mut self) {
        self.polling_enabled = false;
        if matches!(self.phase, Phase::Waiting { .. }) {
            self.phase = Phase::Paused;
        }
        debug!("polling paused");
    }

    /// Re-enable polling and fetch immediately from the last token
    ///
    /// Returns None when a fetch or insertion is already under way; that
    /// work reschedules polling on its own.
    pub fn resume(&mut self) -> Option<PollTicket> {
        self.polling_enabled = true;
        match self.phase {
            Phase::Paused | Phase::Dead | Phase::Failed | Phase::Waiting { .. } => {
                let ticket = self.ticket()?;
                debug!("polling resumed");
                self.phase = Phase::Fetching;
                Some(ticket)
            }
            Phase::Idle | Phase::Fetching | Phase::Inserting => None,
        }
    }

    /// Pause when live, resume otherwise; a dead or failed stream always resumes
    pub fn stop_resume_toggle(&mut self) -> Option<PollTicket> {
        if matches!(self.phase, Phase::Dead | Phase::Failed) || !self.polling_enabled {
            self.resume()
        } else {
            self.pause();
            None
        }
    }

    pub fn polling_enabled(&self) -> bool {
        self.polling_enabled
    }

    pub fn status(&self) -> StreamStatus {
        match self.phase {
            Phase::Idle => StreamStatus::Idle,
            Phase::Dead => StreamStatus::Dead,
            Phase::Failed => StreamStatus::Failed,
            Phase::Paused => StreamStatus::Paused,
            Phase::Fetching | Phase::Inserting | Phase::Waiting { .. } => {
                if self.polling_enabled {
                    StreamStatus::Live
                } else {
                    StreamStatus::Paused
                }
            }
        }
    }

    fn ticket(&self) -> Option<PollTicket> {
        self.session
            .as_ref()
            .map(|session| ticket_for(session, self.long_poll_timeout))
    }
}

fn ticket_for(session: &Session, timeout: u64) -> PollTicket {
    PollTicket {
        session: session.id,
        path: session.path.clone(),
        request: FetchLogRequest {
            path: session.path.clone(),
            logs_data: session.token.clone(),
            wait_for_start: session.wait_for_start,
            timeout,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailscope_types::ContinuationToken;

    fn response(url: &str, token: &str, rows: &[&[&str]], is_running: bool) -> FetchLogResponse {
        FetchLogResponse {
            url: url.to_string(),
            headers: vec!["level".into(), "message".into()],
            joint_log: rows
                .iter()
                .map(|r| r.iter().map(|c| serde_json::Value::from(*c)).collect())
                .collect(),
            logs_data: ContinuationToken(token.to_string()),
            is_running,
        }
    }

    fn controller() -> StreamController {
        StreamController::new(Duration::from_millis(100), 10)
    }

    #[test]
    fn test_initial_fetch_has_no_token() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        assert_eq!(ticket.request.logs_data, None);
        assert_eq!(ticket.request.path, "exp/a");
        assert_eq!(ctl.status(), StreamStatus::Live);
    }

    #[test]
    fn test_incremental_fetch_uses_latest_token() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.on_response(&ticket, Ok(response("exp/a", "t1", &[&["INFO", "x"]], true)));

        let now = Instant::now();
        let next = ctl.on_batch_consumed(now);
        assert_eq!(next, Some(NextStep::PollAt(now + Duration::from_millis(100))));
        assert!(ctl.poll_due(now).is_none());

        let ticket = ctl.poll_due(now + Duration::from_millis(100)).unwrap();
        assert_eq!(ticket.request.logs_data, Some(ContinuationToken("t1".into())));
    }

    #[test]
    fn test_stale_session_response_is_discarded() {
        let mut ctl = controller();
        let old = ctl.start_session("exp/a", false);
        let _new = ctl.start_session("exp/b", false);

        let outcome = ctl.on_response(&old, Ok(response("exp/a", "t1", &[&["INFO", "x"]], true)));
        assert!(matches!(outcome, ResponseOutcome::Stale));

        let session = ctl.session().unwrap();
        assert_eq!(session.token, None);
        assert_eq!(session.batches, 0);
        assert!(ctl.on_batch_consumed(Instant::now()).is_none());
        assert!(ctl.next_poll_due().is_none());
    }

    #[test]
    fn test_same_path_restart_discards_old_response() {
        let mut ctl = controller();
        let old = ctl.start_session("exp/a", false);
        let _new = ctl.start_session("exp/a", false);

        let outcome = ctl.on_response(&old, Ok(response("exp/a", "t1", &[], true)));
        assert!(matches!(outcome, ResponseOutcome::Stale));
    }

    #[test]
    fn test_pause_during_inflight_still_processes() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.pause();

        let outcome = ctl.on_response(&ticket, Ok(response("exp/a", "t1", &[&["INFO", "x"]], true)));
        assert!(matches!(outcome, ResponseOutcome::Batch { .. }));
        assert_eq!(ctl.on_batch_consumed(Instant::now()), Some(NextStep::Paused));
        assert_eq!(ctl.status(), StreamStatus::Paused);
        assert!(ctl.next_poll_due().is_none());

        let resumed = ctl.resume().unwrap();
        assert_eq!(resumed.request.logs_data, Some(ContinuationToken("t1".into())));
    }

    #[test]
    fn test_pause_cancels_scheduled_poll() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.on_response(&ticket, Ok(response("exp/a", "t1", &[], true)));
        let now = Instant::now();
        ctl.on_batch_consumed(now);

        ctl.pause();
        assert!(ctl.poll_due(now + Duration::from_secs(1)).is_none());
        assert_eq!(ctl.status(), StreamStatus::Paused);
    }

    #[test]
    fn test_dead_process_stops_polling() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.on_response(&ticket, Ok(response("exp/a", "t9", &[], false)));

        assert_eq!(ctl.on_batch_consumed(Instant::now()), Some(NextStep::Dead));
        assert_eq!(ctl.status(), StreamStatus::Dead);
        assert!(ctl.next_poll_due().is_none());
    }

    #[test]
    fn test_toggle_resumes_dead_stream() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.on_response(&ticket, Ok(response("exp/a", "t9", &[], false)));
        ctl.on_batch_consumed(Instant::now());

        let ticket = ctl.stop_resume_toggle().unwrap();
        assert_eq!(ticket.request.logs_data, Some(ContinuationToken("t9".into())));
        assert_eq!(ctl.status(), StreamStatus::Live);
    }

    #[test]
    fn test_toggle_pauses_live_stream() {
        let mut ctl = controller();
        ctl.start_session("exp/a", false);
        assert!(ctl.stop_resume_toggle().is_none());
        assert!(!ctl.polling_enabled());
        assert_eq!(ctl.status(), StreamStatus::Paused);
    }

    #[test]
    fn test_resume_never_overlaps_inflight_fetch() {
        let mut ctl = controller();
        ctl.start_session("exp/a", false);
        ctl.pause();
        assert!(ctl.resume().is_none());
        assert_eq!(ctl.status(), StreamStatus::Live);
    }

    #[test]
    fn test_failure_waits_for_manual_resume() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        let err = ApiError::InvalidUrl("boom".into());

        let outcome = ctl.on_response(&ticket, Err(err));
        assert!(matches!(outcome, ResponseOutcome::Failed(_)));
        assert_eq!(ctl.status(), StreamStatus::Failed);
        assert!(ctl.next_poll_due().is_none());
        assert!(ctl.resume().is_some());
    }

    #[test]
    fn test_headers_fixed_after_first_response() {
        let mut ctl = controller();
        let ticket = ctl.start_session("exp/a", false);
        ctl.on_response(&ticket, Ok(response("exp/a", "t1", &[], true)));
        ctl.on_batch_consumed(Instant::now());

        let ticket = ctl.resume().unwrap();
        let mut changed = response("exp/a", "t2", &[], true);
        changed.headers = vec!["other".into()];
        match ctl.on_response(&ticket, Ok(changed)) {
            ResponseOutcome::Batch { headers, initial, .. } => {
                assert_eq!(headers.columns(), &["level".to_string(), "message".to_string()]);
                assert!(!initial);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
