//! Log processing for tailscope
//!
//! This crate provides the incremental tailing machinery: the stream
//! controller and its session, batched row insertion, line rendering,
//! live filtering, level gating, and per-severity counters.

mod controller;
mod counters;
mod filter;
mod gate;
mod poller;
mod render;
mod scheduler;
mod session;
mod table;
mod tail;

pub use controller::{NextStep, PollTicket, ResponseOutcome, StreamController, StreamStatus};
pub use counters::Counters;
pub use filter::{FilterEngine, FilterOutcome};
pub use gate::LevelGate;
pub use poller::{LogPoller, LogSource, PollEvent};
pub use render::{LineRenderer, RenderContext, RenderedCell, RenderedRow, Segment};
pub use scheduler::{ChunkReport, InsertTarget, InsertionJob, InsertionScheduler};
pub use session::{Session, SessionId};
pub use table::RowTable;
pub use tail::{LogTail, StepReport, TailConfig, TailUpdate};

// Re-export types used in our public API
pub use tailscope_client::ApiError;
pub use tailscope_types::{ContinuationToken, Headers, Hue, LogRecord, Severity};
