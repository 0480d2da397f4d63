// ── Captive portal control ──
//
// The portal itself (HTTP server, credential capture) lives outside the
// engine. This module only starts and stops it and relays its counters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::error::CoreError;

/// Aggregate counters a portal reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortalCounts {
    pub visitors: u64,
    pub submissions: u64,
}

/// An external captive-portal implementation.
#[async_trait]
pub trait Portal: Send + Sync {
    async fn start(&self) -> Result<(), CoreError>;

    async fn stop(&self) -> Result<(), CoreError>;

    /// Live counters. The receiver stays valid across restarts.
    fn counts(&self) -> watch::Receiver<PortalCounts>;
}

/// Idempotent start/stop wrapper around a [`Portal`].
#[derive(Clone)]
pub struct PortalControl {
    portal: Arc<dyn Portal>,
    running: Arc<Mutex<bool>>,
}

impl PortalControl {
    pub fn new(portal: Arc<dyn Portal>) -> Self {
        Self {
            portal,
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Start the portal. Does nothing if it is already running.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if *running {
            debug!("portal already running");
            return Ok(());
        }
        self.portal.start().await?;
        *running = true;
        info!("portal started");
        Ok(())
    }

    /// Stop the portal. Does nothing if it is not running.
    pub async fn stop(&self) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if !*running {
            return Ok(());
        }
        self.portal.stop().await?;
        *running = false;
        info!("portal stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    pub fn counts(&self) -> PortalCounts {
        *self.portal.counts().borrow()
    }

    pub fn watch_counts(&self) -> watch::Receiver<PortalCounts> {
        self.portal.counts()
    }
}
