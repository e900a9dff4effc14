use std::borrow::Cow;
use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::AppState;
use crate::ui::components::StatusBar;
use crate::ui::{Layout, Theme};
use tailscope_logs::{FilterEngine, LogTail, RenderedCell, RenderedRow, Segment, StreamStatus};
use tailscope_types::Severity;

/// Log viewer screen
pub struct LogViewerScreen;

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, tail: &LogTail, now: Instant) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        let show_filter_bar = state.ui_state.search_active
            || tail.filter().is_active()
            || state.ui_state.filter_error.is_some();
        let (stats_area, filter_area, logs_area) =
            Layout::log_viewer(content_area, state.ui_state.stats_visible, show_filter_bar);

        Self::render_header(frame, header_area, state, tail);
        if let Some(stats_area) = stats_area {
            Self::render_stats_bar(frame, stats_area, tail);
        }
        if let Some(filter_area) = filter_area {
            Self::render_filter_bar(frame, filter_area, state, tail);
        }
        Self::render_logs(frame, logs_area, state, tail, now);
        Self::render_status_bar(frame, status_area, state, tail);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState, tail: &LogTail) {
        let path = tail.session().map(|s| s.path.as_str()).unwrap_or("-");
        let status = tail.status();

        let title = Line::from(vec![
            Span::styled("tailscope", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(state.server.as_str(), Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(path.to_string(), Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("≥ {}", tail.gate().minimum().name()),
                Style::default().fg(tail.gate().minimum().color()).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(status.label(), status_style(status)),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_stats_bar(frame: &mut Frame, area: Rect, tail: &LogTail) {
        let counts = tail.counters();

        let mut spans = vec![Span::styled(" ", Theme::text())];
        for (label, count, color) in [
            ("INF:", counts.info, Severity::Info.color()),
            ("WRN:", counts.warning, Severity::Warning.color()),
            ("ERR:", counts.error_or_critical, Severity::Error.color()),
        ] {
            spans.push(Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)));
            spans.push(Span::styled(format!("{} ", count), Theme::text()));
        }
        spans.push(Span::styled("│ ", Theme::text_dim()));
        spans.push(Span::styled("Total:", Theme::text_dim()));
        spans.push(Span::styled(format!("{}", counts.total), Theme::text()));

        let hidden: Vec<&str> = tail.gate().hidden().map(|s| s.name()).collect();
        if !hidden.is_empty() {
            spans.push(Span::styled("  │ hidden: ", Theme::text_dim()));
            spans.push(Span::styled(hidden.join(", "), Theme::text_dim()));
        }

        let stats_widget = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(" Stats ", Theme::title())),
        );

        frame.render_widget(stats_widget, area);
    }

    fn render_filter_bar(frame: &mut Frame, area: Rect, state: &AppState, tail: &LogTail) {
        let mut spans = vec![];

        if state.ui_state.search_active {
            spans.push(Span::styled(
                " /",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(" Filter: ", Theme::text_dim()));
        }

        let pattern = if state.ui_state.search_active {
            state.ui_state.search_input.as_str()
        } else {
            tail.filter().pattern()
        };
        spans.push(Span::styled(pattern.to_string(), Theme::text_highlight()));

        if state.ui_state.search_active {
            spans.push(Span::styled(
                "█",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        if let Some(err) = &state.ui_state.filter_error {
            spans.push(Span::styled(" ", Theme::text()));
            spans.push(Span::styled(format!("⚠ {}", err), Style::default().fg(Color::Red)));
        }

        if state.ui_state.search_active {
            spans.push(Span::styled("  [Enter] Keep  [Esc] Cancel", Theme::text_dim()));
        } else if tail.filter().is_active() {
            spans.push(Span::styled("  [n] Clear  [/] Edit", Theme::text_dim()));
        }

        let border = if state.ui_state.search_active {
            Style::default().fg(Color::Yellow)
        } else if state.ui_state.filter_error.is_some() {
            Style::default().fg(Color::Red)
        } else {
            Theme::border()
        };

        let filter_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Span::styled(" Filter ", Theme::title())),
        );

        frame.render_widget(filter_bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, tail: &LogTail, now: Instant) {
        let table = tail.table();
        let visible = state.ui_state.visible_rows.refresh(table, tail.gate());
        let total = visible.len();

        // Borders plus the column header line
        let rows_height = area.height.saturating_sub(3) as usize;
        let inner_width = area.width.saturating_sub(3) as usize;
        state.ui_state.page_size = rows_height;

        let max_scroll = total.saturating_sub(rows_height);
        if state.ui_state.auto_scroll {
            state.ui_state.log_scroll = max_scroll;
        }
        state.ui_state.log_scroll = state.ui_state.log_scroll.min(max_scroll);

        let widths = table.column_widths();
        let level_col = table.headers().index_of("level");

        let mut lines = Vec::with_capacity(rows_height + 1);
        lines.push(header_line(table.headers().columns(), widths, inner_width));
        lines.extend(
            visible
                .iter()
                .skip(state.ui_state.log_scroll)
                .take(rows_height)
                .filter_map(|&i| table.rows().get(i))
                .map(|row| row_line(row, widths, inner_width, level_col, tail.filter(), now)),
        );

        let title = if tail.filter().is_active() || tail.gate().minimum() > Severity::Debug {
            format!(" Logs ({} of {} shown) ", total, table.len())
        } else {
            format!(" Logs ({}) ", total)
        };

        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );
        frame.render_widget(logs_widget, area);

        if total > rows_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(state.ui_state.log_scroll);

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, tail: &LogTail) {
        let updated = tail
            .session()
            .and_then(|s| s.last_update)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        let right = match &state.ui_state.notice {
            Some(notice) => format!("{} │ {}", notice, tail.status().label()),
            None => format!(
                "{} │ {}/{} rows │ updated {} {}",
                tail.status().label(),
                state.ui_state.visible_rows.indices.len(),
                tail.table().len(),
                updated,
                if state.ui_state.auto_scroll { "▼" } else { " " }
            ),
        };

        let pause_hint = if tail.polling_enabled() { "Pause" } else { "Resume" };
        let status = StatusBar::new()
            .hints([
                ("/", "Filter"),
                ("1-5", "Level"),
                ("p", pause_hint),
                ("o", "Link"),
                ("?", "Help"),
                ("Esc", "Back"),
            ])
            .right(right);

        frame.render_widget(status, area);
    }
}

fn status_style(status: StreamStatus) -> Style {
    let color = match status {
        StreamStatus::Live => Theme::SUCCESS,
        StreamStatus::Paused => Theme::WARNING,
        StreamStatus::Dead | StreamStatus::Failed => Theme::ERROR,
        StreamStatus::Idle => Theme::FG_DIM,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Control characters would break the single-line layout
fn display(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r', '\t']) {
        Cow::Owned(text.replace('\n', "⏎").replace('\r', "").replace('\t', " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// Longest prefix of `text` fitting in `width` display columns
fn truncate_to_width(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            return &text[..i];
        }
        used += w;
    }
    text
}

/// Width of column `i`; the last column takes what is left of the line
fn column_width(i: usize, last: usize, widths: &[usize], used: usize, line_width: usize) -> usize {
    if i == last {
        line_width.saturating_sub(used)
    } else {
        widths.get(i).copied().unwrap_or(0)
    }
}

fn header_line(columns: &[String], widths: &[usize], line_width: usize) -> Line<'static> {
    let mut spans = Vec::with_capacity(columns.len() * 2);
    let last = columns.len().saturating_sub(1);
    let mut used = 0;

    for (i, name) in columns.iter().enumerate() {
        let width = column_width(i, last, widths, used, line_width);
        let text = truncate_to_width(name, width);
        spans.push(Span::styled(text.to_string(), Theme::header_cell()));
        let pad = width.saturating_sub(text.width());
        if i != last {
            spans.push(Span::raw(" ".repeat(pad + 1)));
            used += width + 1;
        }
    }
    Line::from(spans)
}

fn row_line(
    row: &RenderedRow,
    widths: &[usize],
    line_width: usize,
    level_col: Option<usize>,
    filter: &FilterEngine,
    now: Instant,
) -> Line<'static> {
    let row_style = Theme::row(row.level_hue, row.zebra);
    let last = row.cells.len().saturating_sub(1);
    let mut spans = Vec::new();
    let mut used = 0;

    for (i, cell) in row.cells.iter().enumerate() {
        let width = column_width(i, last, widths, used, line_width);

        let mut base = row_style;
        if level_col == Some(i) {
            base = base.patch(Theme::level(row.severity));
        }
        if let Some(hue) = cell.hue {
            base = base.patch(Theme::grouped(hue));
        }
        if i == 0 && row.is_fresh(now) {
            base = base.patch(Theme::fresh());
        }

        let cell_spans = cell_spans(cell, width, base, filter);
        spans.extend(cell_spans);
        used += width;

        if i != last {
            spans.push(Span::styled(" ", row_style));
            used += 1;
        }
    }

    Line::from(spans)
}

/// Spans for one cell, cut or padded to exactly `width` columns
fn cell_spans(cell: &RenderedCell, width: usize, base: Style, filter: &FilterEngine) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut used = 0;

    if filter.is_active() && cell.matched {
        let text = display(&cell.text);
        let text = truncate_to_width(&text, width).to_string();
        let mut last_end = 0;
        for (start, end) in filter.find_matches(&text) {
            if start > last_end {
                spans.push(Span::styled(text[last_end..start].to_string(), base));
            }
            spans.push(Span::styled(text[start..end].to_string(), base.patch(Theme::matched())));
            last_end = end;
        }
        if last_end < text.len() {
            spans.push(Span::styled(text[last_end..].to_string(), base));
        }
        used = text.width();
    } else {
        for segment in &cell.segments {
            let (text, style) = match segment {
                Segment::Text(text) => (text, base),
                Segment::Link { text, .. } => (text, base.patch(Theme::link())),
            };
            let text = display(text);
            let piece = truncate_to_width(&text, width - used);
            if !piece.is_empty() {
                used += piece.width();
                spans.push(Span::styled(piece.to_string(), style));
            }
            if used >= width {
                break;
            }
        }
    }

    if used < width {
        spans.push(Span::styled(" ".repeat(width - used), base));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use tailscope_logs::TailConfig;
    use tailscope_types::{ContinuationToken, FetchLogResponse, Hue};
    use tokio::sync::mpsc;

    fn cell(text: &str) -> RenderedCell {
        RenderedCell {
            text: text.to_string(),
            segments: vec![Segment::Text(text.to_string())],
            ..Default::default()
        }
    }

    fn joined(spans: &[Span<'_>]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_truncate_respects_wide_chars() {
        assert_eq!(truncate_to_width("abcdef", 3), "abc");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("ab", 10), "ab");
    }

    #[test]
    fn test_cell_padded_to_width() {
        let spans = cell_spans(&cell("info"), 7, Style::default(), &FilterEngine::new());
        assert_eq!(joined(&spans), "info   ");
    }

    #[test]
    fn test_link_segment_styled() {
        let c = RenderedCell {
            text: "see /a/b".into(),
            segments: vec![
                Segment::Text("see ".into()),
                Segment::Link {
                    text: "/a/b".into(),
                    target: "/a/b".into(),
                },
            ],
            ..Default::default()
        };
        let spans = cell_spans(&c, 8, Style::default(), &FilterEngine::new());
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].style, Theme::link());
    }

    #[test]
    fn test_matches_highlighted() {
        let mut filter = FilterEngine::new();
        let mut c = cell("an error here");
        c.matched = true;
        filter.apply("error", &mut []);

        let spans = cell_spans(&c, 20, Style::default(), &filter);
        assert_eq!(spans[1].content, "error");
        assert_eq!(spans[1].style, Theme::matched());
        assert_eq!(joined(&spans).len(), 20);
    }

    #[test]
    fn test_row_line_fills_width() {
        let row = RenderedRow {
            seq: 1,
            severity: Some(Severity::Info),
            level_hue: Some(Hue::of("info")),
            zebra: true,
            cells: vec![cell("INFO"), cell("hello world")],
            filtered_out: false,
            fresh_until: None,
        };
        let line = row_line(&row, &[5, 7], 30, Some(0), &FilterEngine::new(), Instant::now());
        assert_eq!(line.width(), 30);
    }

    fn batch(path: &str, lines: std::ops::Range<usize>) -> FetchLogResponse {
        FetchLogResponse {
            url: path.to_string(),
            headers: vec!["level".into(), "message".into()],
            joint_log: lines
                .map(|i| {
                    vec![
                        serde_json::Value::from("info"),
                        serde_json::Value::from(format!("line {}", i)),
                    ]
                })
                .collect(),
            logs_data: ContinuationToken("t1".into()),
            is_running: true,
        }
    }

    fn draw(terminal: &mut Terminal<TestBackend>, state: &mut AppState, tail: &LogTail) -> String {
        terminal
            .draw(|frame| LogViewerScreen::render(frame, state, tail, Instant::now()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_follow_shows_last_inserted_row_per_chunk() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = AppState::new(tx, "http://localhost:5050".into());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        let mut tail = LogTail::new(&TailConfig {
            chunk_size: 30,
            ..Default::default()
        });
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(batch("exp/a", 0..90)));

        tail.step(Instant::now()).unwrap();
        let screen = draw(&mut terminal, &mut state, &tail);

        let page = state.ui_state.page_size;
        assert!(page > 0 && page < 30);
        assert_eq!(state.ui_state.log_scroll, 30 - page);
        assert!(screen.contains("line 29"));
        assert!(!screen.contains("line 0 "));

        tail.step(Instant::now()).unwrap();
        let screen = draw(&mut terminal, &mut state, &tail);
        assert_eq!(state.ui_state.log_scroll, 60 - page);
        assert!(screen.contains("line 59"));
    }

    #[test]
    fn test_manual_scroll_holds_position_across_chunks() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = AppState::new(tx, "http://localhost:5050".into());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        let mut tail = LogTail::new(&TailConfig {
            chunk_size: 30,
            ..Default::default()
        });
        let ticket = tail.start_session("exp/a", false);
        tail.handle_response(&ticket, Ok(batch("exp/a", 0..90)));

        tail.step(Instant::now()).unwrap();
        draw(&mut terminal, &mut state, &tail);
        let pinned = state.ui_state.log_scroll;

        state.scroll_up(3);
        tail.step(Instant::now()).unwrap();
        let screen = draw(&mut terminal, &mut state, &tail);

        assert!(!state.ui_state.auto_scroll);
        assert_eq!(state.ui_state.log_scroll, pinned - 3);
        assert!(!screen.contains("line 59"));
    }

    #[test]
    fn test_newlines_flattened() {
        assert_eq!(display("a\nb\tc"), "a⏎b c");
        assert!(matches!(display("plain"), Cow::Borrowed(_)));
    }
}
