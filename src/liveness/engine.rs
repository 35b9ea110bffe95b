use crate::liveness::error::{IngestError, IngestResult};
use crate::liveness::state_machine::{classify, Transition};
use crate::liveness::tracker::OfflineTracker;
use crate::liveness::types::{BatchOutcome, EngineConfig, PeerReport, ReportingNode};
use crate::site::{Site, SiteStore};
use crate::telemetry::recorder;
use crate::telemetry::{BandwidthObservation, Direction, TelemetrySink};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a batch wants to do once its transaction has committed
#[derive(Default)]
struct BatchWork {
    outcome: BatchOutcome,
    came_online: Vec<String>,
    went_offline: Vec<String>,
    observations: Vec<BandwidthObservation>,
}

#[derive(Clone)]
pub struct LivenessEngine {
    store: Arc<SiteStore>,
    tracker: Arc<OfflineTracker>,
    telemetry: Arc<dyn TelemetrySink>,
    config: EngineConfig,
}

impl LivenessEngine {
    pub fn new(store: Arc<SiteStore>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            store,
            tracker: Arc::new(OfflineTracker::new()),
            telemetry,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing tracker instead of starting with an empty one
    pub fn with_tracker(mut self, tracker: Arc<OfflineTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn store(&self) -> &SiteStore {
        &self.store
    }

    pub fn tracker(&self) -> &OfflineTracker {
        &self.tracker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply one batch of reports at the current wall-clock time
    pub async fn process_batch(
        &self,
        reports: &[PeerReport],
        node: Option<&ReportingNode>,
    ) -> IngestResult<BatchOutcome> {
        self.process_batch_at(reports, node, chrono::Utc::now().timestamp())
            .await
    }

    /// Apply one batch of reports as of `now` (unix seconds).
    ///
    /// All durable writes share one transaction. It is committed only when
    /// every report was applied; any failure rolls back the whole batch and
    /// leaves the tracker and telemetry untouched.
    pub async fn process_batch_at(
        &self,
        reports: &[PeerReport],
        node: Option<&ReportingNode>,
        now: i64,
    ) -> IngestResult<BatchOutcome> {
        let mut tx = self.store.begin().await?;

        match self.apply(&mut tx, reports, node, now).await {
            Ok(work) => {
                if let Err(e) = tx.commit().await {
                    let err = IngestError::from(e);
                    warn!(error = %err, reports = reports.len(), "batch commit failed");
                    recorder::record_batch_failed(err.kind());
                    return Err(err);
                }
                Ok(self.finish(work))
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "batch rollback failed");
                }
                warn!(error = %err, reports = reports.len(), "batch aborted");
                recorder::record_batch_failed(err.kind());
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        reports: &[PeerReport],
        node: Option<&ReportingNode>,
        now: i64,
    ) -> IngestResult<BatchWork> {
        let mut work = BatchWork::default();
        let mut authorized_orgs = HashMap::new();
        let quantum = self.config.uptime_quantum_minutes();
        work.outcome.summary.reports = reports.len();

        for report in reports.iter().filter(|r| r.is_active()) {
            let Some(site) = SiteStore::find_by_pub_key(conn, &report.public_key).await? else {
                debug!(peer = %report.public_key, "no site for active peer, skipping");
                work.outcome.summary.skipped_unknown += 1;
                continue;
            };
            authorize(conn, node, &site.org_id, &mut authorized_orgs).await?;

            let bytes_in = store_count(report, report.bytes_in)?;
            let bytes_out = store_count(report, report.bytes_out)?;
            SiteStore::record_activity(conn, &site.site_id, bytes_in, bytes_out, now).await?;

            let summary = &mut work.outcome.summary;
            summary.writes += 1;
            summary.marked_online += 1;
            work.outcome.org_usage.record_active(
                &site.org_id,
                report.bytes_in.saturating_add(report.bytes_out),
                quantum,
            );
            work.came_online.push(report.public_key.clone());
            push_observations(&mut work.observations, &site, report);

            debug!(
                site_id = %site.site_id,
                bytes_in = report.bytes_in,
                bytes_out = report.bytes_out,
                "site active"
            );
        }

        for report in reports.iter().filter(|r| !r.is_active()) {
            if self.tracker.contains(&report.public_key) {
                work.outcome.summary.skipped_tracked += 1;
                continue;
            }

            let Some(site) = SiteStore::find_by_pub_key(conn, &report.public_key).await? else {
                debug!(peer = %report.public_key, "no site for idle peer, skipping");
                work.outcome.summary.skipped_unknown += 1;
                continue;
            };

            let transition = classify(report, &site, now, self.config.staleness_window);
            match transition {
                Transition::MarkOffline => {
                    authorize(conn, node, &site.org_id, &mut authorized_orgs).await?;
                    if SiteStore::mark_offline(conn, &site.site_id).await? {
                        work.outcome.summary.writes += 1;
                    }
                    work.outcome.summary.marked_offline += 1;
                    debug!(site_id = %site.site_id, "site went offline");
                }
                Transition::StayOffline | Transition::Unchanged | Transition::MarkOnline => {
                    work.outcome.summary.unchanged += 1;
                }
            }

            if transition.leaves_offline() {
                work.went_offline.push(report.public_key.clone());
            }
        }

        Ok(work)
    }

    fn finish(&self, work: BatchWork) -> BatchOutcome {
        for peer in &work.came_online {
            self.tracker.remove(peer);
        }
        for peer in work.went_offline {
            self.tracker.insert(peer);
        }

        for observation in &work.observations {
            if let Err(e) = self.telemetry.add_bandwidth(observation) {
                debug!(error = %e, site_id = %observation.site_id, "bandwidth telemetry dropped");
            }
        }
        for (org_id, bytes, minutes) in work.outcome.org_usage.iter() {
            if let Err(e) = self.telemetry.add_org_usage(org_id, bytes, minutes) {
                debug!(error = %e, org_id, "org usage telemetry dropped");
            }
        }

        let summary = &work.outcome.summary;
        recorder::record_batch_processed(summary.reports);
        recorder::record_reports_skipped(summary.skipped_unknown as u64);
        recorder::set_offline_tracked(self.tracker.len());

        info!(
            reports = summary.reports,
            online = summary.marked_online,
            offline = summary.marked_offline,
            skipped = summary.skipped_unknown,
            writes = summary.writes,
            "batch applied"
        );

        work.outcome
    }
}

/// Fails the batch when a reporting node is given and is not allowed to
/// touch `org_id`. Results are cached for the rest of the batch.
async fn authorize(
    conn: &mut SqliteConnection,
    node: Option<&ReportingNode>,
    org_id: &str,
    cache: &mut HashMap<String, bool>,
) -> IngestResult<()> {
    let Some(node) = node else {
        return Ok(());
    };

    let allowed = match cache.get(org_id) {
        Some(allowed) => *allowed,
        None => {
            let allowed = SiteStore::is_node_authorized(conn, node.as_str(), org_id).await?;
            cache.insert(org_id.to_string(), allowed);
            allowed
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(IngestError::Unauthorized {
            node: node.to_string(),
            org: org_id.to_string(),
        })
    }
}

fn store_count(report: &PeerReport, count: u64) -> IngestResult<i64> {
    i64::try_from(count).map_err(|_| {
        IngestError::InvalidInput(format!(
            "byte count {count} out of range for peer {}",
            report.public_key
        ))
    })
}

fn push_observations(out: &mut Vec<BandwidthObservation>, site: &Site, report: &PeerReport) {
    for (direction, bytes) in [
        (Direction::In, report.bytes_in),
        (Direction::Out, report.bytes_out),
    ] {
        if bytes > 0 {
            out.push(BandwidthObservation {
                site_id: site.site_id.clone(),
                direction,
                transport: site.transport.clone(),
                bytes,
            });
        }
    }
}
