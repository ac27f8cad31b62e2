//! Metrics for the save sync server
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed. Exposed series:
//! - sync requests by outcome, and files deleted while reconciling
//! - backups created and evicted
//! - archive bytes streamed and streams aborted by the consumer
//! - tree scan duration

pub mod exporter;
pub mod recorder;

pub use exporter::{metrics_route, render_metrics, start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{
    init_metrics, record_archive_streamed, record_backup_created, record_backups_evicted,
    record_files_deleted, record_scan, record_stream_aborted, record_sync, RequestTimer,
};
