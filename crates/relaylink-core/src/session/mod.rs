// ── Channel session ──
//
// One session per physical channel. A single worker task owns the
// transport, the state machine and the entity table; everything else
// talks to it through a cheap-clone `Session` handle.

mod request;
mod sniffer;
mod timer;
mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relaylink_api::{Command, Connector, ExchangeReport, ExchangeResult, MacAddress, NetworkRecord};
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ChannelId, SessionTiming};
use crate::error::CoreError;
use crate::model::{EntityKey, HostEntry, NetworkEntity, ProbeEntry};
use crate::store::EntitySnapshot;
use crate::stream::EntityStream;

use request::{Envelope, Reply, Request};
use worker::Worker;

const REQUEST_CHANNEL_SIZE: usize = 32;

// ── SessionState ─────────────────────────────────────────────────

/// Where a session is in its observe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    Scanning,
    SnifferActive,
    Focused,
}

/// Link health as last observed by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ChannelHealth {
    Unknown,
    Online,
    Offline { reason: String },
}

/// Result of the most recent background poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PollOutcome {
    Complete,
    Failed { reason: String },
}

/// Observable session state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub channel: ChannelId,
    pub state: SessionState,
    pub focused: Option<EntityKey>,
    /// Period of the active poll timer, `None` when not polling.
    pub poll_interval: Option<Duration>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_poll: Option<PollOutcome>,
    pub polls: u64,
    pub scan_in_flight: bool,
    /// The last scan hit its deadline before the completion marker.
    pub scan_incomplete: bool,
    pub health: ChannelHealth,
    pub correlation_misses: u64,
    pub lines_dropped: u64,
}

impl SessionStatus {
    fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            state: SessionState::Idle,
            focused: None,
            poll_interval: None,
            last_poll_at: None,
            last_poll: None,
            polls: 0,
            scan_in_flight: false,
            scan_incomplete: false,
            health: ChannelHealth::Unknown,
            correlation_misses: 0,
            lines_dropped: 0,
        }
    }

    pub fn is_online(&self) -> bool {
        self.health == ChannelHealth::Online
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Handle to one channel's session.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Operations queue on the
/// worker and resolve when it has finished them, so two calls never
/// interleave on the wire.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    channel: ChannelId,
    endpoint: String,
    request_tx: mpsc::Sender<Envelope>,
    status: watch::Receiver<SessionStatus>,
    entities: watch::Receiver<EntitySnapshot>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Start a session worker for `channel`. Must be called inside a
    /// Tokio runtime. The link is opened lazily by the first operation.
    pub fn spawn(channel: ChannelId, connector: Arc<dyn Connector>, timing: SessionTiming) -> Self {
        Self::spawn_under(channel, connector, timing, &CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), but cancelled together with `parent`.
    pub fn spawn_under(
        channel: ChannelId,
        connector: Arc<dyn Connector>,
        timing: SessionTiming,
        parent: &CancellationToken,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (status_tx, status) = watch::channel(SessionStatus::new(channel.clone()));
        let cancel = parent.child_token();
        let endpoint = connector.describe();

        let worker = Worker::new(
            channel.clone(),
            connector,
            timing,
            status_tx,
            request_tx.downgrade(),
            cancel.clone(),
        );
        let entities = worker.subscribe_entities();
        let handle = tokio::spawn(worker.run(request_rx));

        Self {
            inner: Arc::new(SessionInner {
                channel,
                endpoint,
                request_tx,
                status,
                entities,
                cancel,
                worker: Mutex::new(Some(handle)),
            }),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.inner.channel
    }

    /// Description of the underlying link, e.g. `/dev/ttyACM0@115200`.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    // ── State transitions ────────────────────────────────────────

    /// Clear the table, scan, then start the sniffer and the background
    /// poll. A running observe cycle is stopped and restarted.
    pub async fn start_observing(&self) -> Result<ExchangeReport, CoreError> {
        match self.request(Request::StartObserving).await? {
            Reply::Scan(report) => Ok(report),
            other => Err(unexpected(&other)),
        }
    }

    /// Narrow sniffing to one network and switch to the fast poll.
    pub async fn focus(&self, key: EntityKey) -> Result<(), CoreError> {
        self.request(Request::Focus(key)).await.map(drop)
    }

    /// Return from focus to sniffing every network.
    pub async fn unfocus(&self) -> Result<(), CoreError> {
        self.request(Request::Unfocus).await.map(drop)
    }

    /// Stop the remote module and all polling. The table is kept.
    pub async fn stop(&self) -> Result<(), CoreError> {
        self.request(Request::Stop).await.map(drop)
    }

    // ── One-shot exchanges ───────────────────────────────────────

    /// One-shot network-list scan. Does not touch the entity table and
    /// is only allowed while idle.
    pub async fn list_networks(&self) -> Result<ExchangeResult<NetworkRecord>, CoreError> {
        match self.request(Request::ListNetworks).await? {
            Reply::Networks(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list_probes(&self) -> Result<ExchangeResult<ProbeEntry>, CoreError> {
        match self.request(Request::ListProbes).await? {
            Reply::Probes(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list_hosts(&self) -> Result<ExchangeResult<HostEntry>, CoreError> {
        match self.request(Request::ListHosts).await? {
            Reply::Hosts(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn select_stations(&self, mac: MacAddress) -> Result<(), CoreError> {
        self.request(Request::SelectStations(mac)).await.map(drop)
    }

    /// Relay an opaque command and wait out the settle delay.
    pub async fn send(&self, command: Command) -> Result<(), CoreError> {
        self.request(Request::Send(command)).await.map(drop)
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.clone()
    }

    /// Copy of the entity table as of now.
    pub fn snapshot(&self) -> EntitySnapshot {
        self.inner.entities.borrow().clone()
    }

    pub fn entity(&self, key: EntityKey) -> Option<Arc<NetworkEntity>> {
        self.snapshot().iter().find(|e| e.key == key).cloned()
    }

    pub fn entities(&self) -> EntityStream {
        EntityStream::new(self.inner.entities.clone())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Cancel timers and stop the worker once its current request is
    /// done. An exchange in progress is never cut short.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.worker.lock().await.take() {
            let _ = handle.await;
        }
    }

    async fn request(&self, request: Request) -> Result<Reply, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(Envelope {
                request,
                reply_tx: Some(reply_tx),
            })
            .await
            .map_err(|_| self.closed())?;

        reply_rx.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> CoreError {
        CoreError::SessionClosed {
            channel: self.inner.channel.to_string(),
        }
    }
}

fn unexpected(reply: &Reply) -> CoreError {
    CoreError::Internal(format!("unexpected worker reply: {reply:?}"))
}
