//! HTTP client for tailscope
//!
//! This crate talks to the experiment monitor server: resolving paths,
//! listing the workspace tree, fetching log chunks, and launching or
//! terminating processes.

mod client;
mod error;

pub use client::ExpClient;
pub use error::ApiError;

// Re-export types that are used in our public API
pub use tailscope_types::{
    ContinuationToken, FetchLogRequest, FetchLogResponse, LaunchRequest, LaunchResponse, Signal,
    TerminateRequest, TerminateResponse,
};
