mod error_panel;
mod help_overlay;
mod list_selector;
mod status_bar;

pub use error_panel::ErrorPanel;
pub use help_overlay::HelpOverlay;
pub use list_selector::{ListSelector, ListSelectorExt};
pub use status_bar::{StatusBar, list_nav_hints};
