use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

use crate::app::Action;
use tailscope_types::{Severity, Signal};

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    ListNavigation,
    LogViewer,
    FilterInput,
    ErrorPanel,
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        // Global bindings
        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::new(KeyCode::Esc), Action::GoBack);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // Path picker
        let mut list_nav = HashMap::new();
        list_nav.insert(KeyBinding::new(KeyCode::Char('j')), Action::ListDown);
        list_nav.insert(KeyBinding::new(KeyCode::Down), Action::ListDown);
        list_nav.insert(KeyBinding::new(KeyCode::Char('k')), Action::ListUp);
        list_nav.insert(KeyBinding::new(KeyCode::Up), Action::ListUp);
        list_nav.insert(KeyBinding::new(KeyCode::Enter), Action::ListSelect);
        list_nav.insert(KeyBinding::new(KeyCode::Char('/')), Action::OpenSearch);
        list_nav.insert(KeyBinding::new(KeyCode::Char('r')), Action::RefreshTree);
        bindings.insert(KeyContext::ListNavigation, list_nav);

        // Log viewer bindings - less-like navigation
        let mut log_viewer = HashMap::new();
        log_viewer.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('f')), Action::PageDown);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('b')), Action::PageUp);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        log_viewer.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        log_viewer.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::Home), Action::ScrollToTop);
        log_viewer.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('f')), Action::ToggleAutoScroll);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('s')), Action::ToggleStats);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('/')), Action::OpenSearch);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('n')), Action::ClearFilter);
        // Level gate: 1 = debug .. 5 = critical
        for (digit, level) in ('1'..='5').zip(Severity::ALL) {
            log_viewer.insert(KeyBinding::new(KeyCode::Char(digit)), Action::SetMinLevel(level));
        }
        log_viewer.insert(KeyBinding::new(KeyCode::Char('l')), Action::CycleLevel);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('L')), Action::CycleLevelBack);
        // Stream and process control
        log_viewer.insert(KeyBinding::new(KeyCode::Char('p')), Action::TogglePolling);
        log_viewer.insert(KeyBinding::new(KeyCode::Enter), Action::FollowLink);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('o')), Action::FollowLink);
        log_viewer.insert(
            KeyBinding::new(KeyCode::Char('x')),
            Action::Launch { overwrite: false },
        );
        log_viewer.insert(
            KeyBinding::shift(KeyCode::Char('X')),
            Action::Launch { overwrite: true },
        );
        log_viewer.insert(
            KeyBinding::new(KeyCode::Char('t')),
            Action::Terminate(Signal::Graceful),
        );
        log_viewer.insert(
            KeyBinding::shift(KeyCode::Char('K')),
            Action::Terminate(Signal::Kill),
        );
        bindings.insert(KeyContext::LogViewer, log_viewer);

        // Filter input bindings (when search bar is active)
        let mut filter_input = HashMap::new();
        filter_input.insert(KeyBinding::new(KeyCode::Enter), Action::ApplyFilter);
        filter_input.insert(KeyBinding::new(KeyCode::Esc), Action::CloseSearch);
        filter_input.insert(KeyBinding::new(KeyCode::Backspace), Action::SearchBackspace);
        filter_input.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::SearchClear);
        filter_input.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::CloseSearch);
        bindings.insert(KeyContext::FilterInput, filter_input);

        // Error panel
        let mut error_panel = HashMap::new();
        error_panel.insert(KeyBinding::new(KeyCode::Esc), Action::DismissError);
        error_panel.insert(KeyBinding::new(KeyCode::Enter), Action::DismissError);
        error_panel.insert(KeyBinding::new(KeyCode::Char('t')), Action::ToggleTraceback);
        bindings.insert(KeyContext::ErrorPanel, error_panel);

        Self { bindings }
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        // First check context-specific bindings
        if let Some(action) = self
            .bindings
            .get(&context)
            .and_then(|context_bindings| context_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // Fall back to global bindings
        self.bindings
            .get(&KeyContext::Global)?
            .get(&binding)
            .cloned()
    }

    /// Handle key event in filter input mode
    /// Returns Some(Action) for special keys, None for regular character input
    pub fn get_filter_input_action(&self, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&KeyContext::FilterInput)
            .and_then(|filter_bindings| filter_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // For regular characters, return SearchInput action
        if let KeyCode::Char(c) = key.code
            && (key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT)
        {
            return Some(Action::SearchInput(c));
        }

        None
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_digits_set_level_gate() {
        let kb = KeyBindings::new();
        let action = kb.get_action(
            KeyContext::LogViewer,
            &key(KeyCode::Char('3'), KeyModifiers::NONE),
        );
        assert_eq!(action, Some(Action::SetMinLevel(Severity::Warning)));
    }

    #[test]
    fn test_context_overrides_global() {
        let kb = KeyBindings::new();
        let esc = key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(kb.get_action(KeyContext::ErrorPanel, &esc), Some(Action::DismissError));
        assert_eq!(kb.get_action(KeyContext::LogViewer, &esc), Some(Action::GoBack));
    }

    #[test]
    fn test_filter_input_passes_characters() {
        let kb = KeyBindings::new();
        assert_eq!(
            kb.get_filter_input_action(&key(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Some(Action::SearchInput('Q'))
        );
        assert_eq!(
            kb.get_filter_input_action(&key(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Action::SearchInput('q'))
        );
        assert_eq!(
            kb.get_filter_input_action(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::ApplyFilter)
        );
    }
}
