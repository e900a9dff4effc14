use regex::Regex;
use tracing::debug;

use crate::render::RenderedRow;

/// Result of a filter request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Pattern compiled and applied; number of rows left matching
    Applied { matching: usize },
    /// Empty pattern: everything visible, no highlights
    Cleared,
    /// Pattern did not compile; previous filter kept
    Rejected,
}

/// Live case-insensitive regex filter over rendered cell text
#[derive(Clone, Debug, Default)]
pub struct FilterEngine {
    /// Compiled pattern (None = no filter)
    regex: Option<Regex>,

    /// Original pattern string
    pattern: String,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active pattern and apply it to `rows`
    pub fn apply(&mut self, pattern: &str, rows: &mut [RenderedRow]) -> FilterOutcome {
        if pattern.is_empty() {
            self.regex = None;
            self.pattern.clear();
            self.apply_to(rows);
            return FilterOutcome::Cleared;
        }

        match Regex::new(&format!("(?i){}", pattern)) {
            Ok(regex) => {
                self.regex = Some(regex);
                self.pattern = pattern.to_string();
                let matching = self.apply_to(rows);
                debug!("filter '{}' matches {} rows", pattern, matching);
                FilterOutcome::Applied { matching }
            }
            Err(e) => {
                debug!("ignoring invalid filter pattern '{}': {}", pattern, e);
                FilterOutcome::Rejected
            }
        }
    }

    /// Apply the current pattern to a scope of rows; returns how many pass
    pub fn apply_to(&self, rows: &mut [RenderedRow]) -> usize {
        let Some(regex) = &self.regex else {
            for row in rows.iter_mut() {
                row.filtered_out = false;
                row.cells.iter_mut().for_each(|c| c.matched = false);
            }
            return rows.len();
        };

        let mut matching = 0;
        for row in rows.iter_mut() {
            let mut any = false;
            for cell in row.cells.iter_mut() {
                cell.matched = regex.is_match(&cell.text);
                any |= cell.matched;
            }
            row.filtered_out = !any;
            if any {
                matching += 1;
            }
        }
        matching
    }

    /// Match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }
}
