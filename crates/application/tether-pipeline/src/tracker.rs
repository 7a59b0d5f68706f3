use std::collections::VecDeque;
use std::time::Instant;
use tether_core::{TransferOutcome, TransferStatus};

#[derive(Debug, Clone)]
pub struct TransferSnapshot {
    pub total_files: u64,
    pub uploaded_files: u64,
    pub uploaded_bytes: u64,
    pub speed_bps: u64,
    pub failed_count: u64,
    pub transport_errors: u64,
    pub last_completed: Option<String>,
}

/// Folds the outcome stream of one run into counters for display.
///
/// A run may cover several folders whose plans are not known up front, so the total
/// is the number of outcomes seen so far.
pub struct ProgressTracker {
    uploaded_files: u64,
    failed_count: u64,
    transport_errors: u64,
    uploaded_bytes: u64,
    total_files: u64,
    last_completed: Option<String>,
    last_tick: Instant,
    bytes_since_last_tick: u64,
    speed_bps: u64,
    history: VecDeque<u64>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            uploaded_files: 0,
            failed_count: 0,
            transport_errors: 0,
            uploaded_bytes: 0,
            last_completed: None,
            last_tick: Instant::now(),
            bytes_since_last_tick: 0,
            speed_bps: 0,
            history: VecDeque::new(),
        }
    }

    pub fn update(&mut self, outcome: TransferOutcome) {
        self.total_files += 1;
        match outcome.status {
            TransferStatus::Success => {
                self.uploaded_files += 1;
                self.uploaded_bytes += outcome.bytes;
                self.bytes_since_last_tick += outcome.bytes;
            }
            TransferStatus::Failure => self.failed_count += 1,
            TransferStatus::TransportError => {
                self.failed_count += 1;
                self.transport_errors += 1;
            }
        }
        self.last_completed = Some(outcome.relative_path);
    }

    pub fn get_snapshot(&mut self) -> TransferSnapshot {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();

        if elapsed >= 0.5 {
            let current_bps = (self.bytes_since_last_tick as f64 / elapsed) as u64;
            self.history.push_back(current_bps);
            if self.history.len() > 5 {
                self.history.pop_front();
            }
            self.speed_bps =
                (self.history.iter().sum::<u64>() as f64 / self.history.len() as f64) as u64;
            self.last_tick = now;
            self.bytes_since_last_tick = 0;
        }

        TransferSnapshot {
            total_files: self.total_files,
            uploaded_files: self.uploaded_files,
            uploaded_bytes: self.uploaded_bytes,
            speed_bps: self.speed_bps,
            failed_count: self.failed_count,
            transport_errors: self.transport_errors,
            last_completed: self.last_completed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_status() {
        let mut t = ProgressTracker::new();
        t.update(TransferOutcome::success("a", 10));
        t.update(TransferOutcome::failure("b", "peer answered 500"));
        t.update(TransferOutcome::transport_error("c", "connection reset"));

        let snap = t.get_snapshot();
        assert_eq!(snap.total_files, 3);
        assert_eq!(snap.uploaded_files, 1);
        assert_eq!(snap.uploaded_bytes, 10);
        assert_eq!(snap.failed_count, 2);
        assert_eq!(snap.transport_errors, 1);
        assert_eq!(snap.last_completed.as_deref(), Some("c"));
    }

    #[test]
    fn total_grows_with_each_folder_reported() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.get_snapshot().total_files, 0);

        t.update(TransferOutcome::success("docs/a.txt", 3));
        assert_eq!(t.get_snapshot().total_files, 1);

        // A second folder may report the same relative path.
        t.update(TransferOutcome::success("docs/a.txt", 4));
        let snap = t.get_snapshot();
        assert_eq!(snap.total_files, 2);
        assert_eq!(snap.uploaded_files, 2);
        assert_eq!(snap.uploaded_bytes, 7);
    }
}
