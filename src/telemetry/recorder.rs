//! Metric descriptions and batch-level recorders

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

pub const SITE_BANDWIDTH_BYTES: &str = "sitepulse_site_bandwidth_bytes_total";
pub const ORG_BANDWIDTH_BYTES: &str = "sitepulse_org_bandwidth_bytes_total";
pub const ORG_UPTIME_MINUTES: &str = "sitepulse_org_uptime_minutes";
pub const BATCHES_PROCESSED: &str = "sitepulse_batches_processed_total";
pub const REPORTS_RECEIVED: &str = "sitepulse_reports_received_total";
pub const BATCHES_FAILED: &str = "sitepulse_batches_failed_total";
pub const REPORTS_SKIPPED: &str = "sitepulse_reports_skipped_total";
pub const OFFLINE_TRACKED: &str = "sitepulse_offline_tracked_peers";

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        SITE_BANDWIDTH_BYTES,
        "Bytes reported per site, by direction and transport"
    );
    describe_counter!(ORG_BANDWIDTH_BYTES, "Bytes reported per organization");
    describe_gauge!(
        ORG_UPTIME_MINUTES,
        "Observed uptime per organization, in minutes"
    );
    describe_counter!(BATCHES_PROCESSED, "Report batches committed");
    describe_counter!(BATCHES_FAILED, "Report batches aborted");
    describe_counter!(REPORTS_RECEIVED, "Peer reports in committed batches");
    describe_counter!(
        REPORTS_SKIPPED,
        "Reports skipped because no site matched the peer"
    );
    describe_gauge!(
        OFFLINE_TRACKED,
        "Peers currently held in the offline tracker"
    );
}

/// Record a committed batch
pub fn record_batch_processed(reports: usize) {
    counter!(BATCHES_PROCESSED).increment(1);
    counter!(REPORTS_RECEIVED).increment(reports as u64);
}

/// Record an aborted batch
pub fn record_batch_failed(reason: &str) {
    counter!(BATCHES_FAILED, "reason" => reason.to_string()).increment(1);
}

/// Record reports that resolved to no site
pub fn record_reports_skipped(count: u64) {
    if count > 0 {
        counter!(REPORTS_SKIPPED).increment(count);
    }
}

/// Update the offline tracker gauge
pub fn set_offline_tracked(peers: usize) {
    gauge!(OFFLINE_TRACKED).set(peers as f64);
}
