use std::time::{Duration, Instant};

use regex::Regex;

use crate::Counters;
use crate::gate::LevelGate;
use tailscope_types::{Headers, Hue, LogRecord, Severity};

/// Path-like tokens: start of text or a delimiter, then an optional bare word, then `/...`
const LINK_PATTERN: &str = r#"(^|[\s(\[{'"=,])([\w.~-]*/[\w.~/:+@%-]*)"#;

/// Trailing characters never considered part of a link
const LINK_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

/// Piece of a rendered cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link { text: String, target: String },
}

/// One display cell
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedCell {
    /// Rendered text (what the filter matches against)
    pub text: String,

    /// Text split into plain and link pieces
    pub segments: Vec<Segment>,

    /// Grouping hue for `module`/`source` cells
    pub hue: Option<Hue>,

    /// Marked by the active filter
    pub matched: bool,
}

impl RenderedCell {
    fn plain(text: String) -> Self {
        Self {
            segments: if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Text(text.clone())]
            },
            text,
            hue: None,
            matched: false,
        }
    }
}

/// One display row per log record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedRow {
    /// Arrival order within the session
    pub seq: u64,

    /// Severity class of the whole row
    pub severity: Option<Severity>,

    /// Hue derived from the level name
    pub level_hue: Option<Hue>,

    /// Odd rows get the alternate lightness
    pub zebra: bool,

    pub cells: Vec<RenderedCell>,

    /// Hidden by the text filter
    pub filtered_out: bool,

    /// Transient "new since last poll" highlight on the first cell
    pub fresh_until: Option<Instant>,
}

impl RenderedRow {
    /// Visible iff it passes both the text filter and the level gate
    pub fn is_visible(&self, gate: &LevelGate) -> bool {
        !self.filtered_out && gate.shows(self.severity)
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.fresh_until.is_some_and(|until| now < until)
    }

    /// Target of the first link in the row
    pub fn first_link(&self) -> Option<&str> {
        self.cells
            .iter()
            .flat_map(|c| c.segments.iter())
            .find_map(|s| match s {
                Segment::Link { target, .. } => Some(target.as_str()),
                Segment::Text(_) => None,
            })
    }
}

/// Per-row inputs beyond the record itself
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    /// Active session path, for resolving `./` links
    pub session_path: &'a str,

    /// Arrival index of this row
    pub seq: u64,

    /// Row belongs to a non-initial batch
    pub fresh: bool,

    pub now: Instant,
}

/// Turns log records into display rows
pub struct LineRenderer {
    link_regex: Regex,
    fresh_for: Duration,
}

impl LineRenderer {
    pub fn new(fresh_for: Duration) -> Self {
        Self {
            link_regex: Regex::new(LINK_PATTERN).expect("link pattern is valid"),
            fresh_for,
        }
    }

    /// Render one record; counts its level when the stream has a `level` column
    pub fn render(
        &self,
        record: &LogRecord,
        headers: &Headers,
        ctx: &RenderContext<'_>,
        counters: &mut Counters,
    ) -> RenderedRow {
        let columns = headers.columns();
        let mut row = RenderedRow {
            seq: ctx.seq,
            severity: None,
            level_hue: None,
            zebra: ctx.seq % 2 == 1,
            cells: Vec::with_capacity(columns.len()),
            filtered_out: false,
            fresh_until: ctx.fresh.then(|| ctx.now + self.fresh_for),
        };

        for (i, column) in columns.iter().enumerate() {
            let value = record.cells.get(i).map(String::as_str).unwrap_or("");

            let cell = match column.as_str() {
                "thread" => {
                    // Compare with `module` wherever it sits, else the column after
                    let other = headers.index_of("module").unwrap_or(i + 1);
                    let other = record.cells.get(other).map(String::as_str);
                    if other == Some(value) {
                        RenderedCell::default()
                    } else {
                        RenderedCell::plain(value.to_string())
                    }
                }
                "message" => self.render_message(value, ctx.session_path),
                "level" => {
                    let severity = Severity::parse(value);
                    let name = severity
                        .map(|s| s.name().to_string())
                        .unwrap_or_else(|| value.trim().to_lowercase());
                    row.severity = severity;
                    row.level_hue = Some(Hue::of(&name));
                    counters.record(severity);
                    RenderedCell::plain(value.to_string())
                }
                "module" | "source" => {
                    let mut cell = RenderedCell::plain(value.to_string());
                    cell.hue = Some(Hue::of(value));
                    cell
                }
                _ => RenderedCell::plain(value.to_string()),
            };
            row.cells.push(cell);
        }

        row
    }

    fn render_message(&self, message: &str, session_path: &str) -> RenderedCell {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in self.link_regex.captures_iter(message) {
            let Some(token) = caps.get(2) else {
                continue;
            };
            let text = token.as_str().trim_end_matches(LINK_TRAILING);
            if !text.contains('/') {
                continue;
            }
            let start = token.start();
            let end = start + text.len();

            if start > last {
                segments.push(Segment::Text(message[last..start].to_string()));
            }
            segments.push(Segment::Link {
                text: text.to_string(),
                target: resolve_link(text, session_path),
            });
            last = end;
        }

        if last < message.len() {
            segments.push(Segment::Text(message[last..].to_string()));
        }

        RenderedCell {
            text: message.to_string(),
            segments,
            hue: None,
            matched: false,
        }
    }
}

/// Resolve a leading `.` or `..` segment against the session path
fn resolve_link(text: &str, session_path: &str) -> String {
    let relative = text == "." || text.starts_with("./") || text == ".." || text.starts_with("../");
    if !relative {
        return text.to_string();
    }

    let rest = text.strip_prefix("./").unwrap_or(text);
    let base = session_path.trim_end_matches('/');
    match (base.is_empty(), rest) {
        (true, _) => rest.to_string(),
        (false, ".") => base.to_string(),
        (false, _) => format!("{}/{}", base, rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Headers {
        Headers::new(cols.iter().map(|c| c.to_string()).collect())
    }

    fn record(cells: &[&str]) -> LogRecord {
        LogRecord::new(cells.iter().map(|c| c.to_string()).collect())
    }

    fn ctx(seq: u64) -> RenderContext<'static> {
        RenderContext {
            session_path: "exp/run1",
            seq,
            fresh: false,
            now: Instant::now(),
        }
    }

    fn render(cols: &[&str], cells: &[&str]) -> (RenderedRow, Counters) {
        let renderer = LineRenderer::new(Duration::from_secs(1));
        let mut counters = Counters::default();
        let row = renderer.render(&record(cells), &headers(cols), &ctx(0), &mut counters);
        (row, counters)
    }

    #[test]
    fn test_thread_duplicate_and_message_link() {
        let (row, counters) = render(
            &["level", "module", "thread", "message"],
            &["info", "modA", "modA", "hello /x/y"],
        );

        assert_eq!(row.cells[2].text, "");
        assert_eq!(
            row.cells[3].segments,
            vec![
                Segment::Text("hello ".to_string()),
                Segment::Link {
                    text: "/x/y".to_string(),
                    target: "/x/y".to_string()
                },
            ]
        );
        assert_eq!(row.severity, Some(Severity::Info));
        assert_eq!(counters.info, 1);
        assert_eq!(counters.total, 1);
    }

    #[test]
    fn test_thread_suppressed_when_module_follows() {
        let (row, _) = render(
            &["level", "thread", "module", "message"],
            &["info", "modA", "modA", "x"],
        );
        assert_eq!(row.cells[1].text, "");
        assert_eq!(row.cells[2].text, "modA");
    }

    #[test]
    fn test_thread_checked_against_next_without_module() {
        let (row, _) = render(&["thread", "source"], &["worker", "worker"]);
        assert_eq!(row.cells[0].text, "");
    }

    #[test]
    fn test_thread_kept_when_distinct() {
        let (row, _) = render(
            &["level", "thread", "module", "message"],
            &["info", "MainThread", "mom.guest", "x"],
        );
        assert_eq!(row.cells[1].text, "MainThread");
    }

    #[test]
    fn test_relative_link_resolves_against_session() {
        let (row, _) = render(&["message"], &["wrote ./out/results.csv."]);
        assert_eq!(row.first_link(), Some("exp/run1/out/results.csv"));
    }

    #[test]
    fn test_bare_word_prefix_and_trailing_punctuation() {
        let (row, _) = render(&["message"], &["saved (results/a/b), done"]);
        assert_eq!(row.first_link(), Some("results/a/b"));
        let text: String = row.cells[0]
            .segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.as_str(),
                Segment::Link { text, .. } => text.as_str(),
            })
            .collect();
        assert_eq!(text, "saved (results/a/b), done");
    }

    #[test]
    fn test_no_link_without_slash() {
        let (row, _) = render(&["message"], &["nothing to see here."]);
        assert_eq!(row.first_link(), None);
    }

    #[test]
    fn test_level_hue_and_zebra() {
        let renderer = LineRenderer::new(Duration::from_secs(1));
        let mut counters = Counters::default();
        let cols = headers(&["level", "source"]);

        let even = renderer.render(&record(&["ERROR", "guest-1"]), &cols, &ctx(0), &mut counters);
        let odd = renderer.render(&record(&["error", "guest-1"]), &cols, &ctx(1), &mut counters);

        assert_eq!(even.level_hue, odd.level_hue);
        assert_eq!(even.level_hue, Some(Hue::of("error")));
        assert!(!even.zebra);
        assert!(odd.zebra);
        assert_eq!(even.cells[1].hue, Some(Hue::of("guest-1")));
        assert_eq!(counters.error_or_critical, 2);
    }

    #[test]
    fn test_no_level_column_is_not_counted() {
        let (row, counters) = render(&["time", "message"], &["0s", "hi"]);
        assert_eq!(row.severity, None);
        assert_eq!(counters.total, 0);
    }

    #[test]
    fn test_fresh_highlight_expires() {
        let renderer = LineRenderer::new(Duration::from_millis(500));
        let mut counters = Counters::default();
        let now = Instant::now();
        let context = RenderContext {
            session_path: "",
            seq: 0,
            fresh: true,
            now,
        };
        let row = renderer.render(&record(&["hi"]), &headers(&["message"]), &context, &mut counters);

        assert!(row.is_fresh(now));
        assert!(!row.is_fresh(now + Duration::from_secs(1)));
    }
}
