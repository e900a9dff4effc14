use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

use crate::ui::Theme;

/// Status bar with keyboard hints on the left and a summary on the right
pub struct StatusBar<'a> {
    hints: Vec<(&'a str, &'a str)>,
    right_text: Option<String>,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            hints: Vec::new(),
            right_text: None,
        }
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Set text to display on the right side
    pub fn right<S: Into<String>>(mut self, text: S) -> Self {
        self.right_text = Some(text.into());
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Theme::status_bar());

        let mut spans = Vec::new();
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", Theme::status_bar()));
            }
            spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
            spans.push(Span::styled(format!(" {}", desc), Theme::status_bar()));
        }

        let line = Line::from(spans);
        let line_width = line.width() as u16;
        let right_width = self.right_text.as_deref().map_or(0, |r| r.width() as u16);

        // The summary wins over hints when both do not fit
        let hints_fit = self.right_text.is_none() || line_width + right_width + 4 <= area.width;
        if hints_fit {
            buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
        }

        if let Some(right) = self.right_text {
            let right_x = if hints_fit {
                area.x + area.width.saturating_sub(right_width + 1)
            } else {
                area.x + 1
            };
            let span = Span::styled(right.as_str(), Theme::status_bar());
            buf.set_span(right_x, area.y, &span, area.width.saturating_sub(2));
        }
    }
}

/// Default hints for the path picker
pub fn list_nav_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("↑/k", "Up"),
        ("↓/j", "Down"),
        ("Enter", "Open"),
        ("/", "Search"),
        ("r", "Refresh"),
        ("q", "Quit"),
    ]
}
