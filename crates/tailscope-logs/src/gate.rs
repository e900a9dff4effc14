use tailscope_types::Severity;

/// Class-level show/hide of whole severities below a threshold
///
/// Independent of the text filter: a row is shown only when it passes both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelGate {
    minimum: Severity,
}

impl LevelGate {
    pub fn new(minimum: Severity) -> Self {
        Self { minimum }
    }

    pub fn set_minimum_level(&mut self, level: Severity) {
        self.minimum = level;
    }

    pub fn minimum(&self) -> Severity {
        self.minimum
    }

    /// Whether rows of this class are shown; rows without a recognized level always are
    pub fn shows(&self, severity: Option<Severity>) -> bool {
        severity.is_none_or(|s| s >= self.minimum)
    }

    /// Classes currently hidden
    pub fn hidden(&self) -> impl Iterator<Item = Severity> + '_ {
        Severity::ALL.into_iter().filter(|s| *s < self.minimum)
    }
}
