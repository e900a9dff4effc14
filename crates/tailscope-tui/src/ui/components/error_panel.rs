use ratatui::{
    Frame,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use unicode_width::UnicodeWidthStr;

use crate::app::ErrorReport;
use crate::ui::{Layout, Theme};

/// Popup describing the last failed operation
///
/// The server traceback stays collapsed until toggled. When expanded and too
/// long, its end is kept, since the raising frame is at the bottom. Dismissing
/// the panel has no effect on the stream.
pub struct ErrorPanel;

impl ErrorPanel {
    pub fn render(frame: &mut Frame, report: &ErrorReport) {
        let height = if report.expanded { frame.area().height } else { 9 };
        let area = Layout::popup(frame.area(), 90, height);
        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2) as usize;
        frame.render_widget(Clear, area);

        let mut lines = vec![
            Line::from(Span::styled(report.message.clone(), Theme::error())),
            Line::from(""),
        ];

        match (&report.traceback, report.expanded) {
            (Some(traceback), true) => {
                // Message, two blanks and the hint line
                let reserved = wrapped_rows(&report.message, inner_width) + 3;
                let (skipped, shown) =
                    traceback_tail(traceback, inner_height.saturating_sub(reserved), inner_width);
                if skipped > 0 {
                    lines.push(Self::hints_owned(format!("… {} earlier lines", skipped)));
                }
                lines.extend(
                    shown
                        .into_iter()
                        .map(|l| Line::from(Span::styled(l.to_string(), Theme::text_dim()))),
                );
                lines.push(Line::from(""));
                lines.push(Self::hints("[t] hide traceback  [Enter/Esc] dismiss"));
            }
            (Some(_), false) => lines.push(Self::hints("[t] show traceback  [Enter/Esc] dismiss")),
            (None, _) => lines.push(Self::hints("[Enter/Esc] dismiss")),
        }

        let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::error())
                .title(Span::styled(" Error ", Theme::error())),
        );

        frame.render_widget(panel, area);
    }

    fn hints(text: &str) -> Line<'_> {
        Line::from(Span::styled(text, Theme::text_dim()))
    }

    fn hints_owned(text: String) -> Line<'static> {
        Line::from(Span::styled(text, Theme::text_dim()))
    }
}

fn wrapped_rows(line: &str, width: usize) -> usize {
    line.width().div_ceil(width.max(1)).max(1)
}

/// Last lines of `traceback` that fit in `rows` once wrapped to `width`,
/// plus how many earlier lines were left out
fn traceback_tail(traceback: &str, rows: usize, width: usize) -> (usize, Vec<&str>) {
    let lines: Vec<&str> = traceback.lines().collect();
    let total: usize = lines.iter().map(|l| wrapped_rows(l, width)).sum();
    if total <= rows {
        return (0, lines);
    }

    // One row goes to the "earlier lines" marker
    let mut budget = rows.saturating_sub(1);
    let mut start = lines.len();
    while start > 0 {
        let needed = wrapped_rows(lines[start - 1], width);
        if needed > budget {
            break;
        }
        budget -= needed;
        start -= 1;
    }
    (start, lines[start..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_traceback_shown_whole() {
        let (skipped, shown) = traceback_tail("a\nb\nc", 10, 40);
        assert_eq!(skipped, 0);
        assert_eq!(shown, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_long_traceback_keeps_the_end() {
        let traceback: Vec<String> = (0..50).map(|i| format!("frame {}", i)).collect();
        let traceback = traceback.join("\n");

        let (skipped, shown) = traceback_tail(&traceback, 10, 40);
        assert_eq!(skipped, 41);
        assert_eq!(shown.len(), 9);
        assert_eq!(shown.last(), Some(&"frame 49"));
    }

    #[test]
    fn test_wrapped_lines_count_double() {
        let long = "x".repeat(30);
        let traceback = format!("first\n{}\nlast", long);

        // 1 + 2 + 1 rows at width 20 do not fit in 3
        let (skipped, shown) = traceback_tail(&traceback, 3, 20);
        assert_eq!(skipped, 2);
        assert_eq!(shown, vec!["last"]);
    }

    #[test]
    fn test_expanded_panel_shows_last_frame() {
        use ratatui::{Terminal, backend::TestBackend};

        let traceback: Vec<String> = (0..80).map(|i| format!("frame {}", i)).collect();
        let report = ErrorReport {
            message: "boom".into(),
            traceback: Some(traceback.join("\n")),
            expanded: true,
        };

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| ErrorPanel::render(frame, &report)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();

        assert!(screen.contains("frame 79"));
        assert!(screen.contains("earlier lines"));
        assert!(screen.contains("dismiss"));
    }
}
