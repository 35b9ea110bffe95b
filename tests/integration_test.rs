use parking_lot::Mutex;
use sitepulse::liveness::{IngestError, LivenessEngine, PeerReport, ReportingNode};
use sitepulse::site::{NewSite, SiteStore};
use sitepulse::telemetry::{BandwidthObservation, Direction, TelemetryError, TelemetrySink};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

#[derive(Default)]
struct RecordingSink {
    observations: Mutex<Vec<BandwidthObservation>>,
}

impl TelemetrySink for RecordingSink {
    fn add_bandwidth(&self, observation: &BandwidthObservation) -> Result<(), TelemetryError> {
        self.observations.lock().push(observation.clone());
        Ok(())
    }

    fn add_org_usage(&self, _: &str, _: u64, _: f64) -> Result<(), TelemetryError> {
        Ok(())
    }
}

async fn setup(sites: Vec<NewSite>) -> (LivenessEngine, Arc<RecordingSink>) {
    let store = SiteStore::new_in_memory().await.unwrap();
    for site in &sites {
        store.register_site(site).await.unwrap();
    }
    let sink = Arc::new(RecordingSink::default());
    (LivenessEngine::new(Arc::new(store), sink.clone()), sink)
}

/// Active-only batches leave every referenced site online and untracked
#[tokio::test]
async fn test_active_batch_brings_all_sites_online() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard"),
        NewSite::new("s2", "org-a", "P2", "wireguard").last_bandwidth_update(NOW - 3600),
        NewSite::new("s3", "org-b", "P3", "websocket").online(true),
    ])
    .await;
    engine.tracker().insert("P1");
    engine.tracker().insert("P2");

    engine
        .process_batch_at(
            &[
                PeerReport::new("P1", 1, 0),
                PeerReport::new("P2", 20, 20),
                PeerReport::new("P3", 300, 1),
            ],
            None,
            NOW,
        )
        .await
        .unwrap();

    for (site_id, peer) in [("s1", "P1"), ("s2", "P2"), ("s3", "P3")] {
        let site = engine.store().get_site(site_id).await.unwrap().unwrap();
        assert!(site.online, "{site_id} should be online");
        assert_eq!(site.last_bandwidth_update, Some(NOW));
        assert!(!engine.tracker().contains(peer));
    }
}

/// Idle report on a stale site: offline and tracked
#[tokio::test]
async fn test_stale_idle_site_goes_offline() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard")
            .online(true)
            .last_bandwidth_update(NOW - 61),
    ])
    .await;

    let outcome = engine
        .process_batch_at(&[PeerReport::new("P1", 0, 12)], None, NOW)
        .await
        .unwrap();

    let site = engine.store().get_site("s1").await.unwrap().unwrap();
    assert!(!site.online);
    assert_eq!(site.last_bandwidth_update, Some(NOW - 61));
    assert!(engine.tracker().contains("P1"));
    assert_eq!(outcome.summary.writes, 1);
}

/// Idle report within the window: flag unchanged, nothing written
#[tokio::test]
async fn test_fresh_idle_site_unchanged() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard")
            .online(true)
            .last_bandwidth_update(NOW - 59),
        NewSite::new("s2", "org-a", "P2", "wireguard").last_bandwidth_update(NOW - 10),
    ])
    .await;

    let outcome = engine
        .process_batch_at(
            &[PeerReport::new("P1", 0, 0), PeerReport::new("P2", 0, 3)],
            None,
            NOW,
        )
        .await
        .unwrap();

    assert!(engine.store().get_site("s1").await.unwrap().unwrap().online);
    assert!(!engine.store().get_site("s2").await.unwrap().unwrap().online);
    assert_eq!(outcome.summary.writes, 0);
    assert_eq!(outcome.summary.unchanged, 2);
}

/// Keep-alives never refresh liveness
#[tokio::test]
async fn test_keepalives_do_not_refresh_liveness() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard")
            .online(true)
            .last_bandwidth_update(NOW),
    ])
    .await;

    for offset in [20, 40, 60] {
        engine
            .process_batch_at(&[PeerReport::new("P1", 0, 5)], None, NOW + offset)
            .await
            .unwrap();
        assert!(engine.store().get_site("s1").await.unwrap().unwrap().online);
    }

    engine
        .process_batch_at(&[PeerReport::new("P1", 0, 5)], None, NOW + 61)
        .await
        .unwrap();
    let site = engine.store().get_site("s1").await.unwrap().unwrap();
    assert!(!site.online);
    assert_eq!(site.last_bandwidth_update, Some(NOW));
}

/// Repeating a zero-byte report for an offline, tracked peer writes nothing
#[tokio::test]
async fn test_idle_report_is_idempotent() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard").online(true),
    ])
    .await;

    let first = engine
        .process_batch_at(&[PeerReport::new("P1", 0, 1)], None, NOW)
        .await
        .unwrap();
    assert_eq!(first.summary.writes, 1);

    for _ in 0..3 {
        let again = engine
            .process_batch_at(&[PeerReport::new("P1", 0, 1)], None, NOW + 5)
            .await
            .unwrap();
        assert_eq!(again.summary.writes, 0);
        assert_eq!(again.summary.skipped_tracked, 1);
    }
    assert!(engine.tracker().contains("P1"));
}

/// Per-org sums and the fixed uptime quantum
#[tokio::test]
async fn test_org_aggregation() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard"),
        NewSite::new("s2", "org-a", "P2", "wireguard"),
        NewSite::new("s3", "org-b", "P3", "wireguard"),
    ])
    .await;

    let outcome = engine
        .process_batch_at(
            &[
                PeerReport::new("P1", 100, 50),
                PeerReport::new("P2", 7, 3),
                PeerReport::new("P3", 1000, 1),
            ],
            None,
            NOW,
        )
        .await
        .unwrap();

    let usage = &outcome.org_usage;
    assert_eq!(usage.bandwidth_for("org-a"), 100 + 50 + 7 + 3);
    assert_eq!(usage.bandwidth_for("org-b"), 1001);
    assert!((usage.uptime_for("org-a") - 2.0 * (10.0 / 60.0)).abs() < 1e-9);
    assert!((usage.uptime_for("org-b") - 10.0 / 60.0).abs() < 1e-9);
}

/// An authorization failure anywhere in the batch rolls back every site
#[tokio::test]
async fn test_authorization_failure_is_atomic() {
    let (engine, sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard"),
        NewSite::new("s2", "org-a", "P2", "wireguard")
            .online(true)
            .last_bandwidth_update(NOW - 600),
        NewSite::new("s3", "org-b", "P3", "wireguard"),
    ])
    .await;
    engine
        .store()
        .grant_node_access("node-1", "org-a")
        .await
        .unwrap();
    let before: Vec<_> = snapshot(&engine, &["s1", "s2", "s3"]).await;

    let node = ReportingNode::new("node-1");
    let result = engine
        .process_batch_at(
            &[
                PeerReport::new("P1", 10, 10),
                PeerReport::new("P2", 0, 0),
                PeerReport::new("P3", 10, 10),
            ],
            Some(&node),
            NOW,
        )
        .await;

    match result {
        Err(IngestError::Unauthorized { node, org }) => {
            assert_eq!(node, "node-1");
            assert_eq!(org, "org-b");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }

    let after: Vec<_> = snapshot(&engine, &["s1", "s2", "s3"]).await;
    assert_eq!(before, after);
    assert!(engine.tracker().is_empty());
    assert!(sink.observations.lock().is_empty());
}

async fn snapshot(engine: &LivenessEngine, ids: &[&str]) -> Vec<sitepulse::site::Site> {
    let mut sites = Vec::new();
    for id in ids {
        sites.push(engine.store().get_site(id).await.unwrap().unwrap());
    }
    sites
}

/// Peer's inbound bytes land in the site's outbound counter
#[tokio::test]
async fn test_direction_inversion() {
    let (engine, _sink) = setup(vec![NewSite::new("s1", "org-a", "P1", "wireguard")]).await;

    engine
        .process_batch_at(&[PeerReport::new("P1", 100, 5)], None, NOW)
        .await
        .unwrap();
    engine
        .process_batch_at(&[PeerReport::new("P1", 100, 5)], None, NOW + 10)
        .await
        .unwrap();

    let site = engine.store().get_site("s1").await.unwrap().unwrap();
    assert_eq!(site.megabytes_out, 200);
    assert_eq!(site.megabytes_in, 10);
}

/// Counters pinned at the top of the range keep later batches working
#[tokio::test]
async fn test_counters_saturate_across_batches() {
    let max = i64::MAX as u64;
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard"),
        NewSite::new("s2", "org-b", "P2", "wireguard"),
    ])
    .await;

    engine
        .process_batch_at(&[PeerReport::new("P1", max, 0)], None, NOW)
        .await
        .unwrap();
    engine
        .process_batch_at(&[PeerReport::new("P1", 1, 0)], None, NOW + 10)
        .await
        .unwrap();

    let outcome = engine
        .process_batch_at(
            &[PeerReport::new("P2", 5, 5), PeerReport::new("P1", 0, 0)],
            None,
            NOW + 20,
        )
        .await
        .unwrap();
    assert_eq!(outcome.summary.marked_online, 1);

    let sites = snapshot(&engine, &["s1", "s2"]).await;
    assert_eq!(sites[0].megabytes_out, i64::MAX);
    assert_eq!(sites[0].megabytes_in, 0);
    assert!(sites[0].online);
    assert!(sites[1].online);
    assert_eq!(sites[1].megabytes_out, 5);
}

/// Two maxed-out reports in one org saturate the org total instead of failing
#[tokio::test]
async fn test_org_bandwidth_saturates_within_batch() {
    let max = i64::MAX as u64;
    let (engine, sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard"),
        NewSite::new("s2", "org-a", "P2", "websocket"),
    ])
    .await;

    let outcome = engine
        .process_batch_at(
            &[PeerReport::new("P1", max, max), PeerReport::new("P2", max, max)],
            None,
            NOW,
        )
        .await
        .unwrap();

    assert_eq!(outcome.org_usage.bandwidth_for("org-a"), u64::MAX);
    assert_eq!(sink.observations.lock().len(), 4);
    for site in snapshot(&engine, &["s1", "s2"]).await {
        assert!(site.online);
        assert_eq!(site.megabytes_in, i64::MAX);
    }
}

#[tokio::test]
async fn test_scenario_never_active_site_goes_offline() {
    let (engine, sink) = setup(vec![
        NewSite::new("sA", "org-a", "A", "wireguard").online(true),
    ])
    .await;

    engine
        .process_batch_at(&[PeerReport::new("A", 0, 1)], None, NOW)
        .await
        .unwrap();

    assert!(!engine.store().get_site("sA").await.unwrap().unwrap().online);
    assert!(engine.tracker().contains("A"));
    assert!(sink.observations.lock().is_empty());
}

#[tokio::test]
async fn test_scenario_websocket_bandwidth_telemetry() {
    let (engine, sink) = setup(vec![
        NewSite::new("sB", "org-a", "B", "websocket")
            .online(true)
            .last_bandwidth_update(NOW - 10),
    ])
    .await;

    engine
        .process_batch_at(&[PeerReport::new("B", 500, 500)], None, NOW)
        .await
        .unwrap();

    let observations = sink.observations.lock();
    assert_eq!(observations.len(), 2);
    assert!(observations.contains(&BandwidthObservation {
        site_id: "sB".into(),
        direction: Direction::In,
        transport: "websocket".into(),
        bytes: 500,
    }));
    assert!(observations.contains(&BandwidthObservation {
        site_id: "sB".into(),
        direction: Direction::Out,
        transport: "websocket".into(),
        bytes: 500,
    }));
}

/// Sites not mentioned in a batch are left alone
#[tokio::test]
async fn test_absent_sites_untouched() {
    let (engine, _sink) = setup(vec![
        NewSite::new("s1", "org-a", "P1", "wireguard").online(true),
        NewSite::new("s2", "org-a", "P2", "wireguard").online(true),
    ])
    .await;

    engine
        .process_batch_at(&[PeerReport::new("P1", 0, 0)], None, NOW)
        .await
        .unwrap();

    assert!(!engine.store().get_site("s1").await.unwrap().unwrap().online);
    assert!(engine.store().get_site("s2").await.unwrap().unwrap().online);
    assert!(!engine.tracker().contains("P2"));
}

/// Overlapping batches share one tracker safely
#[tokio::test]
async fn test_concurrent_batches() {
    let sites: Vec<NewSite> = (0..20)
        .map(|i| NewSite::new(format!("s{i}"), "org-a", format!("P{i}"), "wireguard").online(true))
        .collect();
    let (engine, _sink) = setup(sites).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let report = if i % 2 == 0 {
                PeerReport::new(format!("P{i}"), 10, 10)
            } else {
                PeerReport::new(format!("P{i}"), 0, 0)
            };
            engine.process_batch_at(&[report], None, NOW).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..20 {
        let site = engine
            .store()
            .get_site(&format!("s{i}"))
            .await
            .unwrap()
            .unwrap();
        let peer = format!("P{i}");
        if i % 2 == 0 {
            assert!(site.online);
            assert!(!engine.tracker().contains(&peer));
        } else {
            assert!(!site.online);
            assert!(engine.tracker().contains(&peer));
        }
    }
    assert_eq!(engine.tracker().len(), 10);
}
