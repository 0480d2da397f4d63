// ── Reactive entity table ──
//
// Ordered storage for one session's networks with push-based change
// notification. Only the session worker mutates it; readers get an
// immutable snapshot through a `watch` channel.

use std::sync::Arc;

use indexmap::IndexMap;
use relaylink_api::MacAddress;
use tokio::sync::watch;

use super::EntitySnapshot;
use crate::model::{EntityKey, NetworkEntity};

/// Networks keyed by display index, in the order the scan printed them.
///
/// Every published mutation rebuilds the snapshot subscribers receive.
/// The `_silent` variants batch changes until [`flush`](Self::flush).
pub(crate) struct EntityTable {
    entries: IndexMap<EntityKey, NetworkEntity>,
    snapshot: watch::Sender<EntitySnapshot>,
    dirty: bool,
}

impl EntityTable {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: IndexMap::new(),
            snapshot,
            dirty: false,
        }
    }

    /// Insert or replace an entity and publish. Returns `true` if the key
    /// was new.
    #[cfg(test)]
    pub(crate) fn upsert(&mut self, entity: NetworkEntity) -> bool {
        let is_new = self.upsert_silent(entity);
        self.flush();
        is_new
    }

    /// Insert or replace without publishing.
    pub(crate) fn upsert_silent(&mut self, entity: NetworkEntity) -> bool {
        self.dirty = true;
        self.entries.insert(entity.key, entity).is_none()
    }

    /// Publish pending changes. Returns `true` if anything was sent.
    pub(crate) fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.rebuild_snapshot();
        true
    }

    /// Drop every entity. Only a fresh scan does this.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
        self.rebuild_snapshot();
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: EntityKey) -> Option<&NetworkEntity> {
        self.entries.get(&key)
    }

    pub(crate) fn contains(&self, key: EntityKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Pick the entity a sniffer header refers to.
    ///
    /// SSIDs are not unique: among equal SSIDs the one already known to be
    /// on `channel` wins, otherwise the first in table order.
    pub(crate) fn find_for_header(&self, ssid: &str, channel: u8) -> Option<EntityKey> {
        let mut first = None;
        for entity in self.entries.values().filter(|e| e.ssid == ssid) {
            if entity.channel == Some(channel) {
                return Some(entity.key);
            }
            first.get_or_insert(entity.key);
        }
        first
    }

    /// Record the channel a sniffer header reported, if none is known.
    pub(crate) fn note_channel(&mut self, key: EntityKey, channel: u8) {
        if let Some(entity) = self.entries.get_mut(&key) {
            if entity.channel.is_none() {
                entity.channel = Some(channel);
                self.dirty = true;
            }
        }
    }

    /// Add a station to an entity. Returns `true` if it was not there yet.
    pub(crate) fn add_client(&mut self, key: EntityKey, mac: MacAddress) -> bool {
        let Some(entity) = self.entries.get_mut(&key) else {
            return false;
        };
        let added = entity.clients.insert(mac);
        self.dirty |= added;
        added
    }

    /// Get the current snapshot (cheap `Arc` clone).
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> EntitySnapshot {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<EntitySnapshot> {
        self.snapshot.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<NetworkEntity>> = self.entries.values().cloned().map(Arc::new).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
