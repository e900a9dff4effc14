use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::ui::Layout;

/// Help overlay showing keybindings
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame) {
        let popup_area = Layout::popup(frame.area(), 56, 34);
        frame.render_widget(Clear, popup_area);

        let help_text = vec![
            Line::from(Span::styled(
                "Keybindings",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Self::section("Navigation"),
            Self::key_line("j/↓ k/↑", "Scroll down / up"),
            Self::key_line("Ctrl+d/u", "Page down / up"),
            Self::key_line("g / G", "Top / bottom (follow)"),
            Self::key_line("f", "Toggle follow mode"),
            Line::from(""),
            Self::section("Filtering"),
            Self::key_line("/", "Filter rows (regex)"),
            Self::key_line("n", "Clear filter"),
            Self::key_line("1-5", "Minimum level debug..critical"),
            Self::key_line("l / L", "Raise / lower minimum level"),
            Self::key_line("s", "Toggle stats bar"),
            Line::from(""),
            Self::section("Stream"),
            Self::key_line("p", "Pause / resume polling"),
            Self::key_line("Enter/o", "Open first link in top row"),
            Self::key_line("x / X", "Launch / launch overwriting"),
            Self::key_line("t / K", "Terminate / kill process"),
            Line::from(""),
            Self::section("General"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("Esc", "Go back"),
            Self::key_line("q", "Quit"),
        ];

        let help_widget = Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Help ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

        frame.render_widget(help_widget, popup_area);
    }

    fn section(title: &str) -> Line<'_> {
        Line::from(Span::styled(title, Style::default().fg(Color::Yellow)))
    }

    fn key_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
        Line::from(vec![
            Span::styled(format!("  {:>9}", key), Style::default().fg(Color::Green)),
            Span::styled(format!("  {}", desc), Style::default().fg(Color::White)),
        ])
    }
}
