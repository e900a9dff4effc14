use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Create the main layout with header, content, and status bar
    pub fn main(area: Rect) -> (Rect, Rect, Rect) {
        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(1),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

        (chunks[0], chunks[1], chunks[2])
    }

    /// Create a centered content area (for selection screens)
    pub fn centered_list(area: Rect, width_percent: u16) -> Rect {
        let horizontal = RatatuiLayout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - width_percent) / 2),
                Constraint::Percentage(width_percent),
                Constraint::Percentage((100 - width_percent) / 2),
            ])
            .split(area);

        let vertical = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(horizontal[1]);

        vertical[1]
    }

    /// Centered popup of at most `width` x `height`, leaving a 2-cell margin
    pub fn popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }

    /// Split the log viewer content into optional bars above the log table
    pub fn log_viewer(area: Rect, show_stats: bool, show_filter: bool) -> (Option<Rect>, Option<Rect>, Rect) {
        let mut constraints = Vec::new();
        if show_stats {
            constraints.push(Constraint::Length(3));
        }
        if show_filter {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(1));

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut idx = 0;
        let stats = show_stats.then(|| {
            idx += 1;
            chunks[idx - 1]
        });
        let filter = show_filter.then(|| {
            idx += 1;
            chunks[idx - 1]
        });
        (stats, filter, chunks[idx])
    }
}
