use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use super::Action;
use tailscope_logs::{ApiError, LevelGate, RowTable};
use tailscope_types::Severity;

/// Cache of visible row indices to avoid re-scanning the table on every render
#[derive(Debug, Default)]
pub struct VisibleRows {
    /// Table revision when cache was built
    cached_revision: Option<u64>,
    /// Gate threshold when cache was built
    cached_minimum: Option<Severity>,
    /// Indices into the row table, in display order
    pub indices: Vec<usize>,
}

impl VisibleRows {
    /// Check if cache needs to be rebuilt for the current table and gate
    pub fn needs_refresh(&self, revision: u64, minimum: Severity) -> bool {
        self.cached_revision != Some(revision) || self.cached_minimum != Some(minimum)
    }

    /// Rebuild if stale and return the visible indices
    pub fn refresh(&mut self, table: &RowTable, gate: &LevelGate) -> &[usize] {
        if self.needs_refresh(table.revision(), gate.minimum()) {
            self.indices = table.visible_indices(gate);
            self.cached_revision = Some(table.revision());
            self.cached_minimum = Some(gate.minimum());
        }
        &self.indices
    }

    pub fn invalidate(&mut self) {
        self.cached_revision = None;
        self.cached_minimum = None;
        self.indices.clear();
    }
}

/// A failed operation as shown in the error panel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub traceback: Option<String>,
    /// Traceback shown instead of collapsed
    pub expanded: bool,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
            expanded: false,
        }
    }

    pub fn from_api(context: &str, error: &ApiError) -> Self {
        Self {
            message: format!("{}: {}", context, error.message()),
            traceback: error.traceback().map(str::to_string),
            expanded: false,
        }
    }
}

/// Screen enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    PathSelect,
    LogViewer,
}

/// UI-specific transient state
pub struct UiState {
    /// Is search/filter bar active?
    pub search_active: bool,

    /// Current search input text
    pub search_input: String,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// List state for the path picker
    pub list_state: ListState,

    /// Error to display (if any)
    pub error: Option<ErrorReport>,

    /// One-line informational message for the status bar
    pub notice: Option<String>,

    // Log viewer specific state
    /// Index of the top visible row in the viewport
    pub log_scroll: usize,

    /// Auto-scroll enabled (follow mode)?
    pub auto_scroll: bool,

    /// Follow mode a new session starts with
    pub auto_scroll_default: bool,

    /// Rows in the last rendered viewport (for paging)
    pub page_size: usize,

    /// Filter input error message (e.g., invalid regex)
    pub filter_error: Option<String>,

    /// Show statistics bar?
    pub stats_visible: bool,

    /// Cache of visible row indices
    pub visible_rows: VisibleRows,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            search_active: false,
            search_input: String::new(),
            help_visible: false,
            list_state: ListState::default(),
            error: None,
            notice: None,
            log_scroll: 0,
            auto_scroll: true,
            auto_scroll_default: true,
            page_size: 20,
            filter_error: None,
            stats_visible: true,
            visible_rows: VisibleRows::default(),
        }
    }
}

/// Global application state
pub struct AppState {
    /// Current screen being displayed
    pub current_screen: Screen,

    /// Navigation stack for back navigation
    pub screen_stack: Vec<Screen>,

    /// Server the client talks to (display only)
    pub server: String,

    /// Paths listed by the server's tree
    pub paths: Vec<String>,

    /// UI state
    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,

    /// Channel sender for async actions
    pub action_tx: mpsc::UnboundedSender<Action>,
}

impl AppState {
    pub fn new(action_tx: mpsc::UnboundedSender<Action>, server: String) -> Self {
        let mut ui_state = UiState::default();
        ui_state.list_state.select(Some(0));

        Self {
            current_screen: Screen::PathSelect,
            screen_stack: Vec::new(),
            server,
            paths: Vec::new(),
            ui_state,
            should_quit: false,
            action_tx,
        }
    }

    /// Navigate to a new screen, pushing current to stack
    pub fn navigate_to(&mut self, screen: Screen) {
        if self.current_screen == screen {
            return;
        }
        self.screen_stack.push(self.current_screen);
        self.current_screen = screen;
        self.reset_search();
    }

    /// Go back to previous screen
    pub fn go_back(&mut self) -> bool {
        if let Some(prev_screen) = self.screen_stack.pop() {
            self.current_screen = prev_screen;
            self.reset_search();
            true
        } else {
            false
        }
    }

    /// Replace the listed paths, keeping the selection in range
    pub fn set_paths(&mut self, paths: Vec<String>) {
        self.paths = paths;
        let len = self.current_list_len();
        let selected = self.ui_state.list_state.selected().unwrap_or(0);
        self.ui_state
            .list_state
            .select(if len == 0 { None } else { Some(selected.min(len - 1)) });
    }

    /// Paths matching the search input (case-insensitive substring)
    pub fn filtered_paths(&self) -> Vec<&str> {
        let needle = self.ui_state.search_input.to_lowercase();
        self.paths
            .iter()
            .filter(|p| needle.is_empty() || p.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Get the current list length based on screen
    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            Screen::PathSelect => self.filtered_paths().len(),
            Screen::LogViewer => 0,
        }
    }

    /// Move selection up
    pub fn list_up(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Move selection down
    pub fn list_down(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Currently highlighted path in the picker
    pub fn selected_path(&self) -> Option<String> {
        let idx = self.ui_state.list_state.selected()?;
        self.filtered_paths().get(idx).map(|p| p.to_string())
    }

    /// Show an error in the error panel
    pub fn show_error(&mut self, report: ErrorReport) {
        self.ui_state.error = Some(report);
    }

    /// Dismiss the error panel
    pub fn dismiss_error(&mut self) {
        self.ui_state.error = None;
    }

    pub fn toggle_traceback(&mut self) {
        if let Some(report) = &mut self.ui_state.error {
            report.expanded = !report.expanded;
        }
    }

    /// Start search/filter input, pre-filled with `current`
    pub fn start_search(&mut self, current: &str) {
        self.ui_state.search_active = true;
        self.ui_state.search_input = current.to_string();
        self.ui_state.filter_error = None;
    }

    /// Close the input and drop what was typed
    pub fn cancel_search(&mut self) {
        self.reset_search();
        self.ui_state.list_state.select(Some(0));
    }

    /// Close the input, keeping its effect
    pub fn close_search(&mut self) {
        self.ui_state.search_active = false;
    }

    /// Add a character to search input
    pub fn search_input_char(&mut self, c: char) {
        self.ui_state.search_input.push(c);
        self.on_search_changed();
    }

    /// Remove last character from search input
    pub fn search_input_backspace(&mut self) {
        self.ui_state.search_input.pop();
        self.on_search_changed();
    }

    pub fn search_clear(&mut self) {
        self.ui_state.search_input.clear();
        self.on_search_changed();
    }

    fn on_search_changed(&mut self) {
        if self.current_screen == Screen::PathSelect {
            let len = self.current_list_len();
            self.ui_state
                .list_state
                .select(if len == 0 { None } else { Some(0) });
        }
    }

    fn reset_search(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.search_input.clear();
        self.ui_state.filter_error = None;
    }

    /// Fresh viewer state for a new session
    pub fn reset_viewer(&mut self) {
        self.ui_state.log_scroll = 0;
        self.ui_state.auto_scroll = self.ui_state.auto_scroll_default;
        self.ui_state.filter_error = None;
        self.ui_state.visible_rows.invalidate();
    }

    // Log viewer scrolling; render clamps the position to the visible range

    pub fn scroll_up(&mut self, n: usize) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = self.ui_state.log_scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = self.ui_state.log_scroll.saturating_add(n);
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.ui_state.page_size.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.ui_state.page_size.max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.ui_state.auto_scroll = false;
        self.ui_state.log_scroll = 0;
    }

    /// Jump to the newest rows and resume following
    pub fn scroll_to_bottom(&mut self) {
        self.ui_state.auto_scroll = true;
        self.ui_state.log_scroll = usize::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = AppState::new(tx, "http://localhost:5050".into());
        state.set_paths(vec!["exp/alpha".into(), "exp/beta".into(), "other/Alpha2".into()]);
        state
    }

    #[test]
    fn test_search_narrows_paths_case_insensitively() {
        let mut state = state();
        state.start_search("");
        for c in "alpha".chars() {
            state.search_input_char(c);
        }

        assert_eq!(state.filtered_paths(), vec!["exp/alpha", "other/Alpha2"]);
        state.list_down();
        assert_eq!(state.selected_path().as_deref(), Some("other/Alpha2"));

        state.cancel_search();
        assert_eq!(state.filtered_paths().len(), 3);
    }

    #[test]
    fn test_list_wraps() {
        let mut state = state();
        state.list_up();
        assert_eq!(state.selected_path().as_deref(), Some("other/Alpha2"));
        state.list_down();
        assert_eq!(state.selected_path().as_deref(), Some("exp/alpha"));
    }

    #[test]
    fn test_navigation_stack() {
        let mut state = state();
        state.navigate_to(Screen::LogViewer);
        assert_eq!(state.current_screen, Screen::LogViewer);
        assert!(state.go_back());
        assert_eq!(state.current_screen, Screen::PathSelect);
        assert!(!state.go_back());
    }

    #[test]
    fn test_manual_scroll_disables_follow() {
        let mut state = state();
        state.scroll_down(3);
        assert!(!state.ui_state.auto_scroll);
        state.scroll_to_bottom();
        assert!(state.ui_state.auto_scroll);
    }

    #[test]
    fn test_traceback_toggle() {
        let mut state = state();
        state.show_error(ErrorReport {
            message: "boom".into(),
            traceback: Some("Traceback ...".into()),
            expanded: false,
        });
        state.toggle_traceback();
        assert!(state.ui_state.error.as_ref().unwrap().expanded);
        state.dismiss_error();
        assert!(state.ui_state.error.is_none());
    }

    #[test]
    fn test_visible_rows_cache_follows_revision() {
        let mut table = RowTable::new();
        let gate = LevelGate::default();
        let mut cache = VisibleRows::default();

        assert!(cache.refresh(&table, &gate).is_empty());
        assert!(!cache.needs_refresh(table.revision(), gate.minimum()));
        table.touch();
        assert!(cache.needs_refresh(table.revision(), gate.minimum()));
        assert!(cache.needs_refresh(table.revision(), Severity::Error));
    }
}
