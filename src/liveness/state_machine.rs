use crate::liveness::types::PeerReport;
use crate::site::Site;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessState {
    Online,
    Offline,
}

impl LivenessState {
    pub fn of(site: &Site) -> Self {
        if site.online {
            LivenessState::Online
        } else {
            LivenessState::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, LivenessState::Online)
    }
}

/// What one report does to one site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Active report: set online, add counters, stamp activity time
    MarkOnline,
    /// Idle report on a stale online site: set offline
    MarkOffline,
    /// Idle report on a stale site that is already offline: no write
    StayOffline,
    /// Idle report within the staleness window: no write
    Unchanged,
}

impl Transition {
    /// Whether the site ends the batch believed offline
    pub fn leaves_offline(&self) -> bool {
        matches!(self, Transition::MarkOffline | Transition::StayOffline)
    }
}

/// Decide the transition for `site` given `report`.
///
/// Staleness is measured from the last active report only. A site that never
/// had one is stale.
pub fn classify(report: &PeerReport, site: &Site, now: i64, staleness: Duration) -> Transition {
    let window = i64::try_from(staleness.as_secs()).unwrap_or(i64::MAX);
    let stale = site
        .seconds_since_activity(now)
        .map_or(true, |elapsed| elapsed > window);

    match (LivenessState::of(site), report.is_active(), stale) {
        (_, true, _) => Transition::MarkOnline,
        (LivenessState::Online, false, true) => Transition::MarkOffline,
        (LivenessState::Offline, false, true) => Transition::StayOffline,
        (_, false, false) => Transition::Unchanged,
    }
}
