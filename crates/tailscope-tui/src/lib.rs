//! TUI components for tailscope
//!
//! This crate provides the terminal user interface for tailscope,
//! including state management, keybindings, event handling, and UI components.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, ErrorReport, Screen, UiState, VisibleRows};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{ErrorPanel, HelpOverlay, ListSelector, ListSelectorExt, StatusBar, list_nav_hints};
pub use ui::screens::{LogViewerScreen, PathSelectScreen};
pub use ui::{Layout, Theme};
