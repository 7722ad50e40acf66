use std::time::{Duration, Instant};

use tracing::info;

/// Running totals for one filter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Pages whose id was read
    pub scanned: u64,
    /// Pages whose id was in the allow list
    pub matched: u64,
    pub last_identifier: Option<u64>,
}

impl RunCounters {
    pub fn record_scan(&mut self, identifier: u64) {
        self.scanned += 1;
        self.last_identifier = Some(identifier);
    }

    pub fn record_match(&mut self) {
        self.matched += 1;
    }
}

/// Emits a progress line every `every` scanned pages
#[derive(Debug)]
pub struct ProgressReporter {
    every: u64,
    started: Instant,
}

impl ProgressReporter {
    /// `every == 0` disables progress lines
    pub fn new(every: u64) -> Self {
        ProgressReporter {
            every,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether `counters` sits on a reporting boundary
    pub fn is_due(&self, counters: &RunCounters) -> bool {
        self.every > 0 && counters.scanned > 0 && counters.scanned % self.every == 0
    }

    pub fn maybe_report(&self, counters: &RunCounters) {
        if self.is_due(counters) {
            info!(
                scanned = counters.scanned,
                matched = counters.matched,
                id = counters.last_identifier.unwrap_or(0),
                elapsed_secs = self.elapsed().as_secs(),
                "progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut counters = RunCounters::default();
        counters.record_scan(10);
        counters.record_match();
        counters.record_scan(20);

        assert_eq!(counters.scanned, 2);
        assert_eq!(counters.matched, 1);
        assert_eq!(counters.last_identifier, Some(20));
    }

    #[test]
    fn test_reporting_interval() {
        let reporter = ProgressReporter::new(50);
        let mut counters = RunCounters::default();
        assert!(!reporter.is_due(&counters));

        for id in 1..=49 {
            counters.record_scan(id);
            assert!(!reporter.is_due(&counters));
        }
        counters.record_scan(50);
        assert!(reporter.is_due(&counters));
    }

    #[test]
    fn test_disabled_reporter() {
        let reporter = ProgressReporter::new(0);
        let counters = RunCounters {
            scanned: 100,
            ..RunCounters::default()
        };
        assert!(!reporter.is_due(&counters));
    }
}
