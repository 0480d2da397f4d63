// ── Engine domain model ──
//
// The session entity table holds `NetworkEntity` values keyed by the
// index the remote module assigned. Wire-level value types come from
// relaylink-api and are re-exported here so consumers need one import.

pub mod network;

// ── Re-exports ──────────────────────────────────────────────────────

pub use network::{EntityKey, NetworkEntity};

pub use relaylink_api::parse::{HostEntry, ProbeEntry};
pub use relaylink_api::{Band, MacAddress};
