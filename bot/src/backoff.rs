/// Consecutive failures tolerated before a session gives up.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Counts consecutive round failures within one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorBackoff {
    failures: u32,
    threshold: u32,
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl ErrorBackoff {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold,
        }
    }

    /// Returns the updated failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.failures
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// True once the failure count exceeds the threshold.
    pub fn should_abort(&self) -> bool {
        self.failures > self.threshold
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
