use std::time::Duration;

/// Throughput accumulator for one job, used to project remaining time.
///
/// Purely observational. Updates return a new value instead of mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobTimeEstimate {
    items_processed: usize,
    elapsed: Duration,
}

impl JobTimeEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate after another `items` were processed in `elapsed`.
    #[must_use]
    pub fn record(self, items: usize, elapsed: Duration) -> Self {
        Self {
            items_processed: self.items_processed + items,
            elapsed: self.elapsed + elapsed,
        }
    }

    pub fn items_processed(&self) -> usize {
        self.items_processed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Projected time for `remaining_items`, unknown until something was processed.
    pub fn remaining(&self, remaining_items: usize) -> Option<Duration> {
        if self.items_processed == 0 {
            return None;
        }
        let per_item = self.elapsed.as_secs_f64() / self.items_processed as f64;
        Some(Duration::from_secs_f64(per_item * remaining_items as f64))
    }
}

/// Human-readable duration rounded to whole seconds.
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_before_first_batch() {
        assert_eq!(JobTimeEstimate::new().remaining(10), None);
    }

    #[test]
    fn projects_linearly() {
        let estimate = JobTimeEstimate::new()
            .record(10, Duration::from_secs(20))
            .record(10, Duration::from_secs(20));
        assert_eq!(estimate.items_processed(), 20);
        assert_eq!(estimate.elapsed(), Duration::from_secs(40));
        assert_eq!(estimate.remaining(5), Some(Duration::from_secs(10)));
        assert_eq!(estimate.remaining(0), Some(Duration::ZERO));
    }

    #[test]
    fn formats_whole_seconds() {
        assert_eq!(format_duration(Duration::from_millis(90_400)), "1m 30s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
