use chrono::{DateTime, Local};

use crate::Counters;
use tailscope_types::{ContinuationToken, Headers};

/// Identity of one tail session; a new one is issued for every start
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// The path being tailed plus everything learned about it so far
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,

    /// Canonical path of the tail target
    pub path: String,

    /// Cursor of the last accepted response (None = nothing fetched yet)
    pub token: Option<ContinuationToken>,

    /// Column order, fixed by the first response
    pub headers: Option<Headers>,

    /// Liveness reported by the last accepted response
    pub is_running: bool,

    pub counters: Counters,

    /// Accepted responses so far
    pub batches: u64,

    /// Ask the server to wait for the process to produce output
    pub wait_for_start: bool,

    /// Wall-clock time of the last accepted response
    pub last_update: Option<DateTime<Local>>,
}

impl Session {
    pub fn new(id: SessionId, path: String, wait_for_start: bool) -> Self {
        Self {
            id,
            path,
            token: None,
            headers: None,
            is_running: true,
            counters: Counters::default(),
            batches: 0,
            wait_for_start,
            last_update: None,
        }
    }
}
