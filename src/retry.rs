use std::time::Duration;

/// Ordered backoff schedule consumed one wait per retry. The default
/// table is a fixed sequence, not a computed curve; the exact timings
/// are part of the client's observable behavior.
#[derive(Debug, Clone)]
pub struct RetryPlan {
    waits: Vec<Duration>,
}

impl Default for RetryPlan {
    fn default() -> Self {
        RetryPlan {
            waits: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }
}

impl RetryPlan {
    /// A custom schedule. Tests use millisecond waits to keep retry
    /// scenarios fast.
    pub fn new(waits: Vec<Duration>) -> Self {
        RetryPlan { waits }
    }

    /// Maximum number of retries; total attempts are `max_retries() + 1`.
    pub fn max_retries(&self) -> usize {
        self.waits.len()
    }

    /// Wait to apply before retry `attempt` (1-based). `None` once the
    /// schedule is exhausted.
    pub fn wait_before(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        self.waits.get(attempt - 1).copied()
    }
}
