// ── Channel registry ──
//
// Knows every configured channel, hands out one session per channel on
// first use, and tracks which channel the UI is looking at. Switching
// the active channel is pure bookkeeping; sessions keep running.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use relaylink_api::{Connector, SerialConnector};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ChannelConfig, ChannelId, ChannelKind, SessionTiming};
use crate::error::CoreError;
use crate::portal::PortalControl;
use crate::session::Session;

/// A registered channel and how to reach it.
#[derive(Clone)]
pub struct ChannelEntry {
    pub id: ChannelId,
    pub kind: ChannelKind,
    connector: Arc<dyn Connector>,
}

impl ChannelEntry {
    /// Description of the link, e.g. `/dev/ttyACM0@115200`.
    pub fn endpoint(&self) -> String {
        self.connector.describe()
    }
}

/// All channels of one device.
///
/// Cheaply cloneable via `Arc<RegistryInner>`.
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    channels: IndexMap<ChannelId, ChannelEntry>,
    sessions: DashMap<ChannelId, Session>,
    active: watch::Sender<Option<ChannelId>>,
    timing: SessionTiming,
    portal: Option<PortalControl>,
    cancel: CancellationToken,
}

impl ChannelRegistry {
    pub fn builder(timing: SessionTiming) -> ChannelRegistryBuilder {
        ChannelRegistryBuilder {
            timing,
            channels: IndexMap::new(),
            active: None,
            portal: None,
        }
    }

    /// Build a registry of serial channels.
    pub fn from_configs(configs: impl IntoIterator<Item = ChannelConfig>, timing: SessionTiming) -> Self {
        configs
            .into_iter()
            .fold(Self::builder(timing), ChannelRegistryBuilder::channel)
            .build()
    }

    /// Registered channels in configuration order.
    pub fn channels(&self) -> Vec<ChannelEntry> {
        self.inner.channels.values().cloned().collect()
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.inner.channels.contains_key(id)
    }

    /// The session for `id`, spawning its worker on first use.
    pub fn session_for(&self, id: &ChannelId) -> Result<Session, CoreError> {
        if let Some(session) = self.inner.sessions.get(id) {
            return Ok(session.clone());
        }
        let entry = self.entry(id)?;

        let session = self
            .inner
            .sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(channel = %id, endpoint = %entry.endpoint(), "spawning session");
                Session::spawn_under(
                    id.clone(),
                    Arc::clone(&entry.connector),
                    self.inner.timing,
                    &self.inner.cancel,
                )
            })
            .clone();
        Ok(session)
    }

    /// Sessions spawned so far.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.sessions.iter().map(|s| s.value().clone()).collect()
    }

    // ── Active channel ───────────────────────────────────────────

    pub fn active(&self) -> Option<ChannelId> {
        self.inner.active.borrow().clone()
    }

    /// Switch the UI's current channel. Sessions are not touched.
    pub fn set_active(&self, id: &ChannelId) -> Result<(), CoreError> {
        self.entry(id)?;
        let changed = self.inner.active.send_if_modified(|active| {
            if active.as_ref() == Some(id) {
                return false;
            }
            *active = Some(id.clone());
            true
        });
        if changed {
            info!(channel = %id, "active channel changed");
        }
        Ok(())
    }

    pub fn watch_active(&self) -> watch::Receiver<Option<ChannelId>> {
        self.inner.active.subscribe()
    }

    /// Session of the active channel.
    pub fn active_session(&self) -> Result<Session, CoreError> {
        let id = self.active().ok_or_else(|| CoreError::UnknownChannel {
            channel: "(no active channel)".into(),
        })?;
        self.session_for(&id)
    }

    // ── Portal ───────────────────────────────────────────────────

    pub fn portal(&self) -> Option<&PortalControl> {
        self.inner.portal.as_ref()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Cancel every session and timer and wait for the workers to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for session in self.sessions() {
            session.shutdown().await;
        }
        if let Some(portal) = &self.inner.portal {
            if let Err(e) = portal.stop().await {
                debug!(error = %e, "portal stop during shutdown failed");
            }
        }
        debug!("registry shut down");
    }

    fn entry(&self, id: &ChannelId) -> Result<&ChannelEntry, CoreError> {
        self.inner.channels.get(id).ok_or_else(|| CoreError::UnknownChannel {
            channel: id.to_string(),
        })
    }
}

// ── Builder ──────────────────────────────────────────────────────

/// Collects channels before the registry is frozen.
pub struct ChannelRegistryBuilder {
    timing: SessionTiming,
    channels: IndexMap<ChannelId, ChannelEntry>,
    active: Option<ChannelId>,
    portal: Option<PortalControl>,
}

impl ChannelRegistryBuilder {
    /// Add a serial channel from its configuration.
    pub fn channel(self, config: ChannelConfig) -> Self {
        let connector = Arc::new(SerialConnector::new(config.serial));
        self.connector(config.id, config.kind, connector)
    }

    /// Add a channel reached through any connector. Re-using an id
    /// replaces the earlier entry.
    pub fn connector(mut self, id: ChannelId, kind: ChannelKind, connector: Arc<dyn Connector>) -> Self {
        self.channels.insert(id.clone(), ChannelEntry { id, kind, connector });
        self
    }

    /// Initial active channel. Defaults to the first registered one.
    pub fn active(mut self, id: ChannelId) -> Self {
        self.active = Some(id);
        self
    }

    pub fn portal(mut self, portal: PortalControl) -> Self {
        self.portal = Some(portal);
        self
    }

    pub fn build(self) -> ChannelRegistry {
        let active = self
            .active
            .filter(|id| self.channels.contains_key(id))
            .or_else(|| self.channels.keys().next().cloned());
        let (active, _) = watch::channel(active);

        ChannelRegistry {
            inner: Arc::new(RegistryInner {
                channels: self.channels,
                sessions: DashMap::new(),
                active,
                timing: self.timing,
                portal: self.portal,
                cancel: CancellationToken::new(),
            }),
        }
    }
}
