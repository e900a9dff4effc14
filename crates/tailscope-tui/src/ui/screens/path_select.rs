use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout as RatatuiLayout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    app::AppState,
    ui::{
        Layout, Theme,
        components::{ListSelector, ListSelectorExt, StatusBar, list_nav_hints},
    },
};

/// Path picker fed by the server's tree listing
pub struct PathSelectScreen;

impl PathSelectScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        Self::render_header(frame, header_area, state);

        let list_area = Layout::centered_list(content_area, 80);
        let show_search = state.ui_state.search_active || !state.ui_state.search_input.is_empty();
        if show_search {
            let chunks = RatatuiLayout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(1)])
                .split(list_area);
            Self::render_search(frame, chunks[0], state);
            Self::render_list(frame, chunks[1], state);
        } else {
            Self::render_list(frame, list_area, state);
        }

        Self::render_status_bar(frame, status_area, state);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let title = Line::from(vec![
            Span::styled("tailscope", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(state.server.as_str(), Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled("Select Path", Theme::text()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_search(frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![
            Span::styled(" /", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(state.ui_state.search_input.clone(), Theme::text_highlight()),
        ];
        if state.ui_state.search_active {
            spans.push(Span::styled(
                "█",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        let border = if state.ui_state.search_active {
            Style::default().fg(Color::Yellow)
        } else {
            Theme::border()
        };
        let search = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(" Search ", Theme::title())),
        );

        frame.render_widget(search, area);
    }

    fn render_list(frame: &mut Frame, area: Rect, state: &mut AppState) {
        let paths: Vec<String> = state.filtered_paths().into_iter().map(str::to_string).collect();
        let title = format!(" Paths ({}/{}) ", paths.len(), state.paths.len());

        let selector = ListSelector::new(title)
            .items(paths, &state.ui_state.search_input)
            .empty_text("no paths (r to refresh)");

        frame.render_list_selector(area, selector, &mut state.ui_state.list_state);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let count = format!("{} paths", state.paths.len());
        let status = StatusBar::new().hints(list_nav_hints()).right(count);

        frame.render_widget(status, area);
    }
}
