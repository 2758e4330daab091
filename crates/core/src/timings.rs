//! Per-session timing marks used for performance logging.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Elapsed time since the session handle was created, keyed by operation.
#[derive(Debug, Clone)]
pub struct SessionTimings {
    started_at: Instant,
    marks: Vec<(String, Duration)>,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            marks: Vec::new(),
        }
    }
}

impl SessionTimings {
    /// Starts a fresh measurement window.
    pub fn restart(&mut self) {
        *self = Self::default();
    }

    /// Records the elapsed time for `operation`, replacing an earlier mark
    /// with the same label.
    pub fn mark(&mut self, operation: &str) -> Duration {
        let elapsed = self.started_at.elapsed();
        debug!(
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Session performance"
        );
        match self.marks.iter_mut().find(|(op, _)| op == operation) {
            Some(entry) => entry.1 = elapsed,
            None => self.marks.push((operation.to_string(), elapsed)),
        }
        elapsed
    }

    pub fn get(&self, operation: &str) -> Option<Duration> {
        self.marks
            .iter()
            .find(|(op, _)| op == operation)
            .map(|(_, elapsed)| *elapsed)
    }

    pub fn entries(&self) -> &[(String, Duration)] {
        &self.marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_marks_measure_from_restart() {
        let mut timings = SessionTimings::default();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(timings.mark("Avatar initialization"), Duration::from_millis(250));

        timings.restart();
        assert!(timings.entries().is_empty());
        tokio::time::advance(Duration::from_millis(40)).await;
        timings.mark("Stream ready");
        assert_eq!(timings.get("Stream ready"), Some(Duration::from_millis(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_mark_replaces_previous_value() {
        let mut timings = SessionTimings::default();
        timings.mark("User started talking");
        tokio::time::advance(Duration::from_secs(2)).await;
        timings.mark("User started talking");
        assert_eq!(timings.entries().len(), 1);
        assert_eq!(
            timings.get("User started talking"),
            Some(Duration::from_secs(2))
        );
    }
}
