use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget},
};

use crate::ui::Theme;

/// A generic list selector component
pub struct ListSelector<'a> {
    items: Vec<ListItem<'a>>,
    title: String,
    empty_text: &'a str,
}

impl<'a> ListSelector<'a> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            title: title.into(),
            empty_text: "nothing to show",
        }
    }

    /// Add items, highlighting the part matching `needle` (case-insensitive)
    pub fn items<I, S>(mut self, items: I, needle: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let needle = needle.to_lowercase();
        self.items = items
            .into_iter()
            .map(|text| ListItem::new(highlight(text.into(), &needle)))
            .collect();
        self
    }

    /// Text shown when there are no items
    pub fn empty_text(mut self, text: &'a str) -> Self {
        self.empty_text = text;
        self
    }
}

fn highlight(text: String, needle: &str) -> Line<'static> {
    let start = if needle.is_empty() {
        None
    } else {
        // Byte offsets only line up when lowercasing keeps lengths
        let lower = text.to_lowercase();
        (lower.len() == text.len()).then(|| lower.find(needle)).flatten()
    };

    match start {
        Some(start) => {
            let end = start + needle.len();
            Line::from(vec![
                Span::styled(text[..start].to_string(), Theme::list_item()),
                Span::styled(text[start..end].to_string(), Theme::text_highlight()),
                Span::styled(text[end..].to_string(), Theme::list_item()),
            ])
        }
        None => Line::from(Span::styled(text, Theme::list_item())),
    }
}

impl StatefulWidget for ListSelector<'_> {
    type State = ListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(self.title, Theme::title()));

        let items = if self.items.is_empty() {
            vec![ListItem::new(Span::styled(self.empty_text, Theme::text_dim()))]
        } else {
            self.items
        };

        let list = List::new(items)
            .block(block)
            .highlight_style(Theme::list_item_selected())
            .highlight_symbol("▶ ");

        StatefulWidget::render(list, area, buf, state);
    }
}

/// Extension trait to render ListSelector more easily
pub trait ListSelectorExt {
    fn render_list_selector(&mut self, area: Rect, selector: ListSelector, state: &mut ListState);
}

impl ListSelectorExt for ratatui::Frame<'_> {
    fn render_list_selector(&mut self, area: Rect, selector: ListSelector, state: &mut ListState) {
        self.render_stateful_widget(selector, area, state);
    }
}
