use ratatui::style::{Color, Modifier, Style};

use tailscope_types::{Hue, Severity};

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    // Border styles
    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::PRIMARY)
    }

    // Text styles
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    // List styles
    pub fn list_item() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn list_item_selected() -> Style {
        Style::default()
            .fg(Self::BG)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG_DIM).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    // Error
    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    // Log rows

    /// Row background: the level hue, alternating lightness for zebra rows
    pub fn row(level_hue: Option<Hue>, zebra: bool) -> Style {
        let lightness = if zebra { 0.17 } else { 0.12 };
        match level_hue {
            Some(hue) => Style::default().fg(Self::FG).bg(hue.to_color(0.45, lightness)),
            None if zebra => Style::default().fg(Self::FG).bg(Color::Rgb(30, 30, 30)),
            None => Style::default().fg(Self::FG),
        }
    }

    /// Level cell text
    pub fn level(severity: Option<Severity>) -> Style {
        match severity {
            Some(s) => Style::default().fg(s.color()).add_modifier(Modifier::BOLD),
            None => Self::text_dim(),
        }
    }

    /// Foreground for a grouped (`module`/`source`) cell
    pub fn grouped(hue: Hue) -> Style {
        Style::default().fg(hue.to_color(0.65, 0.65))
    }

    pub fn link() -> Style {
        Style::default()
            .fg(Color::LightBlue)
            .add_modifier(Modifier::UNDERLINED)
    }

    /// Filter match inside a cell
    pub fn matched() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    /// First cell of rows that arrived with the latest poll
    pub fn fresh() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::LightGreen)
            .add_modifier(Modifier::BOLD)
    }

    pub fn header_cell() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }
}
