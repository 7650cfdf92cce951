use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::search::processor::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Counters shared between the scan coordinator and its workers
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Dispatch metrics
    files_submitted: Arc<AtomicU64>,
    files_matched: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,
    files_aborted: Arc<AtomicU64>,
    walk_errors: Arc<AtomicU64>,

    // Read strategy metrics
    small_files_processed: Arc<AtomicU64>,
    buffered_files_processed: Arc<AtomicU64>,
    mmap_files_processed: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            files_submitted: Arc::new(AtomicU64::new(0)),
            files_matched: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
            files_aborted: Arc::new(AtomicU64::new(0)),
            walk_errors: Arc::new(AtomicU64::new(0)),
            small_files_processed: Arc::new(AtomicU64::new(0)),
            buffered_files_processed: Arc::new(AtomicU64::new(0)),
            mmap_files_processed: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_submitted(&self) {
        self.files_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_matched(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate that could not be read or decoded
    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate whose worker observed cancellation before reading
    pub fn record_aborted(&self) {
        self.files_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry the walker could not visit
    pub fn record_walk_error(&self) {
        self.walk_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records which read strategy a file of `size` bytes goes through
    pub fn record_file_processing(&self, size: u64) {
        if size < SMALL_FILE_THRESHOLD {
            self.small_files_processed.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files_processed
                .fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_read.fetch_add(size, Ordering::Relaxed);
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            files_submitted: self.files_submitted.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_aborted: self.files_aborted.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            small_files: self.small_files_processed.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_processed.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_processed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// Logs current scan statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files submitted/matched: {}/{}\n\
             Files skipped/aborted: {}/{}\n\
             Walk errors: {}\n\
             Files read (small/buffered/mmap): {}/{}/{}\n\
             Bytes read: {}",
            stats.files_submitted,
            stats.files_matched,
            stats.files_skipped,
            stats.files_aborted,
            stats.walk_errors,
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files,
            stats.bytes_read
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_submitted: u64,
    pub files_matched: u64,
    pub files_skipped: u64,
    pub files_aborted: u64,
    pub walk_errors: u64,
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
    pub bytes_read: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_tracking() {
        let metrics = ScanMetrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_matched();
        metrics.record_skipped();
        metrics.record_walk_error();

        let stats = metrics.get_stats();
        assert_eq!(stats.files_submitted, 3);
        assert_eq!(stats.files_matched, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_aborted, 0);
        assert_eq!(stats.walk_errors, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ScanMetrics::new();
        let worker_view = metrics.clone();

        worker_view.record_aborted();
        assert_eq!(metrics.get_stats().files_aborted, 1);
    }

    #[test]
    fn test_file_processing_tracking() {
        let metrics = ScanMetrics::new();

        metrics.record_file_processing(1000); // Small file
        metrics.record_file_processing(100_000); // Buffered file
        metrics.record_file_processing(20_000_000); // Memory mapped file

        let stats = metrics.get_stats();
        assert_eq!(stats.small_files, 1);
        assert_eq!(stats.buffered_files, 1);
        assert_eq!(stats.mmap_files, 1);
        assert_eq!(stats.bytes_read, 20_101_000);
    }
}
