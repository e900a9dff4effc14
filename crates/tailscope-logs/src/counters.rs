use tailscope_types::Severity;

/// Running totals per severity bucket for the current stream
///
/// Counts reflect every ingested row with a level field, regardless of
/// what is currently visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub info: u64,
    pub warning: u64,
    /// `error` and `critical` share one bucket
    pub error_or_critical: u64,
    pub total: u64,
}

impl Counters {
    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Count one row; unrecognized level values only count toward the total
    pub fn record(&mut self, level: Option<Severity>) {
        self.total += 1;
        match level {
            Some(Severity::Info) => self.info += 1,
            Some(Severity::Warning) => self.warning += 1,
            Some(Severity::Error | Severity::Critical) => self.error_or_critical += 1,
            Some(Severity::Debug) | None => {}
        }
    }
}
