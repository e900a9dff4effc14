//! Shared types for tailscope
//!
//! This crate contains data structures used across multiple tailscope crates:
//! severities, structured log records, and the request/response shapes of the
//! experiment monitor's HTTP endpoints.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

// ============================================================================
// Severity
// ============================================================================

/// Log severity class, totally ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Parse a level field value (case-insensitive, common aliases accepted)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "dbg" => Some(Self::Debug),
            "info" | "inf" => Some(Self::Info),
            "warning" | "warn" | "wrn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "critical" | "crit" | "fatal" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Canonical lowercase name, also used as the hue hash input
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Foreground color used for the whole row of this severity
    pub fn color(&self) -> Color {
        match self {
            Self::Debug => Color::DarkGray,
            Self::Info => Color::White,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
            Self::Critical => Color::Magenta,
        }
    }

    /// Cycle to the next, more severe, class
    pub fn next(&self) -> Self {
        match self {
            Self::Debug => Self::Info,
            Self::Info => Self::Warning,
            Self::Warning => Self::Error,
            Self::Error => Self::Critical,
            Self::Critical => Self::Debug,
        }
    }

    /// Cycle to the previous, less severe, class
    pub fn prev(&self) -> Self {
        match self {
            Self::Debug => Self::Critical,
            Self::Info => Self::Debug,
            Self::Warning => Self::Info,
            Self::Error => Self::Warning,
            Self::Critical => Self::Error,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Hue
// ============================================================================

/// A stable hue (0..360) derived from a string, used for visual grouping
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hue(pub u16);

impl Hue {
    /// Same input always yields the same hue
    pub fn of(s: &str) -> Self {
        let hash = s
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        Self((hash % 360) as u16)
    }

    /// Convert to an RGB terminal color with the given saturation and lightness (0.0..=1.0)
    pub fn to_color(self, saturation: f32, lightness: f32) -> Color {
        let h = f32::from(self.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = lightness - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let channel = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Color::Rgb(channel(r), channel(g), channel(b))
    }
}

// ============================================================================
// Log Records
// ============================================================================

/// Column names of a stream, established once by the first poll response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<String>);

impl Headers {
    pub fn new(columns: Vec<String>) -> Self {
        Self(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of a named column
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }
}

/// One structured log line: cell values in header order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogRecord {
    pub cells: Vec<String>,
}

impl LogRecord {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }
}

/// Opaque server-issued cursor marking how much of a stream has been consumed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub String);

// ============================================================================
// Endpoint Shapes
// ============================================================================

/// Body of `POST /getlogs`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FetchLogRequest {
    pub path: String,

    /// Omitted means "from the start"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_data: Option<ContinuationToken>,

    pub wait_for_start: bool,

    /// Seconds the server may block waiting for new output
    pub timeout: u64,
}

/// Response of `POST /getlogs`
#[derive(Clone, Debug, Deserialize)]
pub struct FetchLogResponse {
    pub url: String,
    pub headers: Vec<String>,
    pub joint_log: Vec<Vec<serde_json::Value>>,
    pub logs_data: ContinuationToken,
    pub is_running: bool,
}

impl FetchLogResponse {
    /// Convert the raw rows into records; non-string cells are rendered as JSON text
    pub fn records(&self) -> Vec<LogRecord> {
        self.joint_log
            .iter()
            .map(|row| LogRecord::new(row.iter().map(cell_text).collect()))
            .collect()
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Body of `POST /get_relative_path`
#[derive(Clone, Debug, Serialize)]
pub struct ResolveRequest {
    pub path: String,
}

/// Response of `POST /get_relative_path`
#[derive(Clone, Debug, Deserialize)]
pub struct ResolveResponse {
    pub url: String,
}

/// Response of `GET /tree`
#[derive(Clone, Debug, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<String>,
}

/// Body of `POST /launch`
#[derive(Clone, Debug, Serialize)]
pub struct LaunchRequest {
    pub path: String,
    pub overwrite: bool,
    pub wait_for_start: bool,
    pub batch: bool,
}

/// Response of `POST /launch`
#[derive(Clone, Debug, Deserialize)]
pub struct LaunchResponse {
    pub url: String,
    #[serde(default)]
    pub pid: Option<u32>,
}

/// How to stop a running process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Signal {
    #[serde(rename = "int")]
    Graceful,
    #[serde(rename = "kill")]
    Kill,
}

/// Body of `POST /terminate`
#[derive(Clone, Debug, Serialize)]
pub struct TerminateRequest {
    pub path: String,
    pub signal: Signal,
}

/// Response of `POST /terminate`
#[derive(Clone, Debug, Deserialize)]
pub struct TerminateResponse {
    pub url: String,
}

/// Body of any non-2xx response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub traceback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse(" critical "), Some(Severity::Critical));
        assert_eq!(Severity::parse("verbose"), None);
    }

    #[test]
    fn test_severity_cycle() {
        assert_eq!(Severity::Critical.next(), Severity::Debug);
        assert_eq!(Severity::Debug.prev(), Severity::Critical);
    }

    #[test]
    fn test_hue_is_stable() {
        assert_eq!(Hue::of("module.a"), Hue::of("module.a"));
        assert!(Hue::of("anything").0 < 360);
    }

    #[test]
    fn test_hue_to_color_primary() {
        assert_eq!(Hue(0).to_color(1.0, 0.5), Color::Rgb(255, 0, 0));
        assert_eq!(Hue(120).to_color(1.0, 0.5), Color::Rgb(0, 255, 0));
    }

    #[test]
    fn test_fetch_response_records() {
        let json = r#"{
            "url": "exp/run1",
            "headers": ["time", "level", "message"],
            "joint_log": [["0s", "INFO", "hello"], ["1s", "ERROR", null], ["2s", "DEBUG", 42]],
            "logs_data": "b64token",
            "is_running": true
        }"#;
        let resp: FetchLogResponse = serde_json::from_str(json).unwrap();
        let records = resp.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].cells[2], "");
        assert_eq!(records[2].cells[2], "42");
        assert_eq!(resp.logs_data, ContinuationToken("b64token".to_string()));
    }

    #[test]
    fn test_fetch_request_omits_missing_token() {
        let req = FetchLogRequest {
            path: "exp".to_string(),
            logs_data: None,
            wait_for_start: false,
            timeout: 10,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("logs_data").is_none());
    }

    #[test]
    fn test_signal_wire_names() {
        assert_eq!(serde_json::to_string(&Signal::Graceful).unwrap(), "\"int\"");
        assert_eq!(serde_json::to_string(&Signal::Kill).unwrap(), "\"kill\"");
    }
}
