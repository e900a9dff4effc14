use tailscope_types::{Severity, Signal};

/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Navigation
    GoBack,
    Quit,

    /// Open a path in the log viewer (resolved first)
    OpenPath(String),

    // UI toggles
    ToggleHelp,

    // List navigation
    ListUp,
    ListDown,
    ListSelect,
    RefreshTree,

    // Search input (narrows the path list, filters the log viewer)
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    ApplyFilter,
    ClearFilter,

    // Log viewer scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,
    ToggleStats,

    // Level gate
    SetMinLevel(Severity),
    CycleLevel,
    CycleLevelBack,

    // Stream control
    TogglePolling,
    FollowLink,
    Launch { overwrite: bool },
    Terminate(Signal),

    // Error panel
    DismissError,
    ToggleTraceback,

    // Tick (for periodic updates)
    Tick,
}
