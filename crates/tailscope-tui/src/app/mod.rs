//! Application state and actions

mod action;
mod state;

pub use action::Action;
pub use state::{AppState, ErrorReport, Screen, UiState, VisibleRows};
