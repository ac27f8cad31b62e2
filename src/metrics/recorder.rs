//! Recording functions for sync, archive and backup operations

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "savesync_sync_requests_total",
        "Sync requests handled, by outcome"
    );
    describe_counter!(
        "savesync_files_deleted_total",
        "Server files deleted because the client no longer has them"
    );

    describe_counter!("savesync_backups_created_total", "Backups written");
    describe_counter!(
        "savesync_backup_bytes_total",
        "Compressed bytes written to backups"
    );
    describe_counter!(
        "savesync_backups_evicted_total",
        "Old backups removed by rotation"
    );

    describe_counter!(
        "savesync_archive_bytes_streamed_total",
        "Compressed bytes delivered to download consumers"
    );
    describe_counter!(
        "savesync_streams_aborted_total",
        "Archive streams abandoned by their consumer"
    );

    describe_histogram!("savesync_scan_duration_seconds", "Time to hash a save tree");
    describe_histogram!("savesync_scan_files", "Files hashed per tree scan");
    describe_histogram!(
        "savesync_request_duration_seconds",
        "Service operation duration"
    );
}

// ============== Sync ==============

/// Record a sync request and how it ended ("report", "pull_required", "error")
pub fn record_sync(outcome: &'static str) {
    counter!("savesync_sync_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_files_deleted(count: usize) {
    if count > 0 {
        counter!("savesync_files_deleted_total").increment(count as u64);
    }
}

/// Record a completed tree scan
pub fn record_scan(files: usize, duration: Duration) {
    histogram!("savesync_scan_duration_seconds").record(duration.as_secs_f64());
    histogram!("savesync_scan_files").record(files as f64);
}

// ============== Archives ==============

pub fn record_archive_streamed(bytes: u64) {
    counter!("savesync_archive_bytes_streamed_total").increment(bytes);
}

/// Record a stream whose consumer went away after `bytes_sent` bytes
pub fn record_stream_aborted(bytes_sent: u64) {
    counter!("savesync_streams_aborted_total").increment(1);
    counter!("savesync_archive_bytes_streamed_total").increment(bytes_sent);
}

// ============== Backups ==============

pub fn record_backup_created(bytes: u64) {
    counter!("savesync_backups_created_total").increment(1);
    counter!("savesync_backup_bytes_total").increment(bytes);
}

pub fn record_backups_evicted(count: usize) {
    if count > 0 {
        counter!("savesync_backups_evicted_total").increment(count as u64);
    }
}

/// Times one service operation and records it under its name on drop
pub struct RequestTimer {
    operation: &'static str,
    start_time: Instant,
}

impl RequestTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        histogram!("savesync_request_duration_seconds", "operation" => self.operation)
            .record(self.start_time.elapsed().as_secs_f64());
    }
}
