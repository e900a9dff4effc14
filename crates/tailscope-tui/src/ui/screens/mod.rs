mod log_viewer;
mod path_select;

pub use log_viewer::LogViewerScreen;
pub use path_select::PathSelectScreen;
