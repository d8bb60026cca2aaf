//! Rate-limited progress reporting from a transfer back into the scheduler.

use std::time::{Duration, Instant};

/// Minimum spacing between delivered progress updates (at most 10 Hz).
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Snapshot delivered to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Total bytes on disk for this task, including any resumed prefix.
    pub downloaded_bytes: u64,
    pub speed_bps: u64,
    /// Full size once the executor has learned it.
    pub total_bytes: Option<u64>,
}

/// Handed to the executor; forwards at most one update per `PROGRESS_INTERVAL`.
pub struct ProgressReporter {
    sink: Box<dyn FnMut(ProgressUpdate) + Send>,
    min_interval: Duration,
    last_sent: Option<Instant>,
    total: Option<u64>,
    total_pending: bool,
}

impl ProgressReporter {
    pub fn new(sink: impl FnMut(ProgressUpdate) + Send + 'static) -> Self {
        Self::with_interval(PROGRESS_INTERVAL, sink)
    }

    pub fn with_interval(
        min_interval: Duration,
        sink: impl FnMut(ProgressUpdate) + Send + 'static,
    ) -> Self {
        Self {
            sink: Box::new(sink),
            min_interval,
            last_sent: None,
            total: None,
            total_pending: false,
        }
    }

    /// Reporter that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Record the full size; delivered with the next report regardless of rate.
    pub fn set_total(&mut self, total: u64) {
        if total > 0 && self.total != Some(total) {
            self.total = Some(total);
            self.total_pending = true;
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Report bytes on disk and the current rate. Dropped if called too soon after the last one.
    pub fn report(&mut self, downloaded_bytes: u64, speed_bps: u64) {
        let now = Instant::now();
        let due = match self.last_sent {
            None => true,
            Some(t) => now.duration_since(t) >= self.min_interval,
        };
        if due || self.total_pending {
            self.deliver(now, downloaded_bytes, speed_bps);
        }
    }

    /// Deliver unconditionally (end of a run).
    pub fn flush(&mut self, downloaded_bytes: u64, speed_bps: u64) {
        self.deliver(Instant::now(), downloaded_bytes, speed_bps);
    }

    fn deliver(&mut self, now: Instant, downloaded_bytes: u64, speed_bps: u64) {
        self.last_sent = Some(now);
        self.total_pending = false;
        (self.sink)(ProgressUpdate {
            downloaded_bytes,
            speed_bps,
            total_bytes: self.total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting(interval: Duration) -> (ProgressReporter, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let r = ProgressReporter::with_interval(interval, move |u| sink.lock().unwrap().push(u));
        (r, seen)
    }

    #[test]
    fn bursts_are_rate_limited() {
        let (mut r, seen) = collecting(Duration::from_secs(3600));
        for i in 0..100 {
            r.report(i, 1);
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
        r.flush(100, 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].downloaded_bytes, 100);
    }

    #[test]
    fn new_total_bypasses_rate_limit() {
        let (mut r, seen) = collecting(Duration::from_secs(3600));
        r.report(1, 1);
        r.set_total(500);
        r.report(2, 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].total_bytes, Some(500));
    }
}
