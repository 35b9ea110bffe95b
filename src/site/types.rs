use serde::{Deserialize, Serialize};

/// A registered remote endpoint and its durable liveness/bandwidth state.
///
/// `megabytes_in` / `megabytes_out` are named from the local service's point
/// of view: `megabytes_in` accumulates what the peer reports as *sent*, and
/// `megabytes_out` what it reports as *received*.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Site {
    pub site_id: String,
    pub org_id: String,
    pub pub_key: String,
    pub online: bool,
    /// Unix seconds of the last report carrying inbound bytes.
    pub last_bandwidth_update: Option<i64>,
    pub megabytes_in: i64,
    pub megabytes_out: i64,
    /// Tunnel transport label, e.g. "wireguard" or "websocket".
    pub transport: String,
}

impl Site {
    /// Seconds since the last active report, or `None` if there never was one.
    pub fn seconds_since_activity(&self, now: i64) -> Option<i64> {
        self.last_bandwidth_update.map(|last| now - last)
    }
}

/// Registration input. Sites are created out of band, never by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
    pub site_id: String,
    pub org_id: String,
    pub pub_key: String,
    pub transport: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_bandwidth_update: Option<i64>,
}

impl NewSite {
    pub fn new(
        site_id: impl Into<String>,
        org_id: impl Into<String>,
        pub_key: impl Into<String>,
        transport: impl Into<String>,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            org_id: org_id.into(),
            pub_key: pub_key.into(),
            transport: transport.into(),
            online: false,
            last_bandwidth_update: None,
        }
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn last_bandwidth_update(mut self, at: i64) -> Self {
        self.last_bandwidth_update = Some(at);
        self
    }
}
