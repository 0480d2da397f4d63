// ── Network domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use relaylink_api::{Band, MacAddress};
use serde::{Deserialize, Serialize};

/// The remote module's 1-based network index.
///
/// This is the only key the module accepts when a later command targets
/// a network, so it is kept exactly as printed and never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(pub u32);

impl EntityKey {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityKey {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// One discovered wireless network and the stations seen talking to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntity {
    pub key: EntityKey,
    /// May be empty for hidden networks. Not unique.
    pub ssid: String,
    pub bssid: MacAddress,
    /// Unknown until a sniffer header reports it when the scan grammar
    /// carried none.
    pub channel: Option<u8>,
    pub security: String,
    /// Signal strength in dBm.
    pub rssi: i16,
    pub band: Band,
    /// Stations in first-seen order. Only grows until the next scan.
    pub clients: IndexSet<MacAddress>,
    pub discovered_at: DateTime<Utc>,
}

impl NetworkEntity {
    pub fn display_index(&self) -> u32 {
        self.key.0
    }

    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
