// ── Session worker ──
//
// Owns everything stateful about one channel. Requests are handled
// strictly one after another; the only suspension points are inside
// transport reads and protocol settle delays.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use relaylink_api::exchange::{self, ExchangeSpec, send_command};
use relaylink_api::{Classified, Command, Connector, CsvGrammar, ExchangeReport, Transport};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::request::{Envelope, Reply, Request};
use super::sniffer::SnifferAccumulator;
use super::timer::PollTimer;
use super::{ChannelHealth, PollOutcome, SessionState, SessionStatus};
use crate::config::{ChannelId, SessionTiming};
use crate::error::CoreError;
use crate::model::EntityKey;
use crate::store::{EntitySnapshot, EntityTable};

pub(crate) struct Worker {
    channel: ChannelId,
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    timing: SessionTiming,
    state: SessionState,
    focused: Option<EntityKey>,
    table: EntityTable,
    status: watch::Sender<SessionStatus>,
    timer: Option<PollTimer>,
    next_timer_id: u64,
    in_flight: Arc<AtomicBool>,
    request_tx: mpsc::WeakSender<Envelope>,
    cancel: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        channel: ChannelId,
        connector: Arc<dyn Connector>,
        timing: SessionTiming,
        status: watch::Sender<SessionStatus>,
        request_tx: mpsc::WeakSender<Envelope>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel,
            connector,
            transport: None,
            timing,
            state: SessionState::Idle,
            focused: None,
            table: EntityTable::new(),
            status,
            timer: None,
            next_timer_id: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            request_tx,
            cancel,
        }
    }

    pub(crate) fn subscribe_entities(&self) -> watch::Receiver<EntitySnapshot> {
        self.table.subscribe()
    }

    /// Process requests until cancelled or every handle is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    let name = envelope.request.name();
                    let result = self.handle(envelope.request).await;
                    match envelope.reply_tx {
                        Some(reply_tx) => {
                            let _ = reply_tx.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                warn!(channel = %self.channel, request = name, error = %e, "background request failed");
                            }
                        }
                    }
                }
            }
        }

        self.timer = None;
        debug!(channel = %self.channel, "session worker stopped");
    }

    async fn handle(&mut self, request: Request) -> Result<Reply, CoreError> {
        match request {
            Request::StartObserving => self.start_observing().await.map(Reply::Scan),
            Request::Focus(key) => self.focus(key).await.map(|()| Reply::Done),
            Request::Unfocus => self.unfocus().await.map(|()| Reply::Done),
            Request::Stop => self.stop().await.map(|()| Reply::Done),
            Request::ListNetworks => {
                self.require_idle("list networks")?;
                let deadline = self.timing.scan_deadline;
                let transport = self.link().await?;
                let result = exchange::scan_network_list(transport, deadline).await;
                let result = self.check(result)?;
                self.count_dropped(&result.report);
                Ok(Reply::Networks(result))
            }
            Request::ListProbes => {
                let deadline = self.timing.probe_deadline;
                let transport = self.link().await?;
                let result = exchange::list_probes(transport, deadline).await;
                let result = self.check(result)?;
                self.count_dropped(&result.report);
                Ok(Reply::Probes(result))
            }
            Request::ListHosts => {
                let deadline = self.timing.host_deadline;
                let transport = self.link().await?;
                let result = exchange::list_hosts(transport, deadline).await;
                let result = self.check(result)?;
                self.count_dropped(&result.report);
                Ok(Reply::Hosts(result))
            }
            Request::SelectStations(mac) => self.command(&Command::select_stations(&mac)).await.map(|()| Reply::Done),
            Request::Send(command) => self.command(&command).await.map(|()| Reply::Done),
            Request::Poll(timer_id) => {
                self.poll(timer_id).await;
                self.in_flight.store(false, Ordering::Release);
                Ok(Reply::Done)
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    async fn start_observing(&mut self) -> Result<ExchangeReport, CoreError> {
        self.disarm();
        if matches!(self.state, SessionState::SnifferActive | SessionState::Focused) {
            if let Err(e) = self.command(&Command::stop()).await {
                self.enter(SessionState::Idle, None);
                return Err(e);
            }
        }

        self.table.clear();
        self.enter(SessionState::Scanning, None);
        self.status.send_modify(|s| {
            s.scan_in_flight = true;
            s.scan_incomplete = false;
        });

        let scanned = self.scan().await;
        self.status.send_modify(|s| s.scan_in_flight = false);
        let report = match scanned {
            Ok(report) => report,
            Err(e) => {
                self.enter(SessionState::Idle, None);
                return Err(e);
            }
        };
        self.status.send_modify(|s| s.scan_incomplete = report.may_be_incomplete());
        self.count_dropped(&report);
        info!(
            channel = %self.channel,
            networks = self.table.len(),
            outcome = %report.outcome,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "scan finished"
        );

        // Sniff the networks just scanned; a plain `start_sniffer` would
        // rescan and renumber them.
        if let Err(e) = self.command(&Command::start_sniffer_noscan()).await {
            self.enter(SessionState::Idle, None);
            return Err(e);
        }
        self.enter(SessionState::SnifferActive, None);
        self.arm(self.timing.poll_interval);
        Ok(report)
    }

    async fn focus(&mut self, key: EntityKey) -> Result<(), CoreError> {
        if self.state != SessionState::SnifferActive {
            return Err(self.invalid("focus"));
        }
        if !self.table.contains(key) {
            return Err(CoreError::EntityNotFound { key });
        }

        self.disarm();
        let steps = [
            Command::stop(),
            Command::select_networks(&[key.index()])?,
            Command::start_sniffer_noscan(),
        ];
        for step in &steps {
            if let Err(e) = self.command(step).await {
                return Err(self.abandon("focus", e));
            }
        }

        self.enter(SessionState::Focused, Some(key));
        self.arm(self.timing.focused_poll_interval);
        info!(channel = %self.channel, %key, "focused");
        Ok(())
    }

    async fn unfocus(&mut self) -> Result<(), CoreError> {
        if self.state != SessionState::Focused {
            return Err(self.invalid("unfocus"));
        }

        self.disarm();
        for step in [Command::unselect_networks(), Command::start_sniffer_noscan()] {
            if let Err(e) = self.command(&step).await {
                return Err(self.abandon("unfocus", e));
            }
        }

        self.enter(SessionState::SnifferActive, None);
        self.arm(self.timing.poll_interval);
        info!(channel = %self.channel, "focus released");
        Ok(())
    }

    /// A multi-step transition failed part way. Earlier steps may already
    /// have stopped the module, so nothing is sniffing any more.
    fn abandon(&mut self, operation: &'static str, err: CoreError) -> CoreError {
        warn!(channel = %self.channel, operation, error = %err, "transition failed, session idle");
        self.disarm();
        self.enter(SessionState::Idle, None);
        err
    }

    async fn stop(&mut self) -> Result<(), CoreError> {
        self.disarm();
        let from = self.state;
        self.enter(SessionState::Idle, None);
        debug!(channel = %self.channel, %from, "stopping");
        self.command(&Command::stop()).await
    }

    // ── Exchanges ────────────────────────────────────────────────

    async fn scan(&mut self) -> Result<ExchangeReport, CoreError> {
        let spec = ExchangeSpec::scan(CsvGrammar::ObserverScan).with_deadline(self.timing.scan_deadline);
        self.link().await?;
        let Some(transport) = self.transport.as_deref_mut() else {
            return Err(CoreError::Internal("link vanished".into()));
        };

        let table = &mut self.table;
        let result = exchange::exchange(transport, &spec, |item| match item {
            Classified::Observed(network) => {
                table.upsert_silent(network.into());
                true
            }
            _ => false,
        })
        .await;
        self.table.flush();
        self.check(result)
    }

    async fn poll(&mut self, timer_id: u64) {
        let live = self.timer.as_ref().map(PollTimer::id) == Some(timer_id);
        if !live || !matches!(self.state, SessionState::SnifferActive | SessionState::Focused) {
            trace!(channel = %self.channel, timer = timer_id, "stale poll ignored");
            return;
        }

        let spec = ExchangeSpec::sniffer_results().with_deadline(self.timing.sniffer_deadline);
        let outcome = match self.sniff(&spec).await {
            Ok((report, misses)) => {
                if misses > 0 {
                    warn!(channel = %self.channel, misses, "sniffer stations with no matching network dropped");
                }
                self.count_dropped(&report);
                self.status.send_modify(|s| s.correlation_misses += misses);
                // A dump has no terminator; running to the deadline is its end.
                PollOutcome::Complete
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "sniffer poll failed");
                PollOutcome::Failed { reason: e.to_string() }
            }
        };

        self.status.send_modify(|s| {
            s.last_poll_at = Some(Utc::now());
            s.last_poll = Some(outcome);
            s.polls += 1;
        });
    }

    async fn sniff(&mut self, spec: &ExchangeSpec) -> Result<(ExchangeReport, u64), CoreError> {
        self.link().await?;
        let Some(transport) = self.transport.as_deref_mut() else {
            return Err(CoreError::Internal("link vanished".into()));
        };

        let mut acc = SnifferAccumulator::new(&mut self.table);
        let result = exchange::exchange(transport, spec, |item| acc.accept(item)).await;
        let (added, misses, headers) = (acc.clients_added, acc.misses, acc.headers);
        self.table.flush();
        let report = self.check(result)?;
        debug!(channel = %self.channel, headers, added, misses, "sniffer results merged");
        Ok((report, misses))
    }

    /// Fire-and-forget command followed by the settle delay.
    async fn command(&mut self, command: &Command) -> Result<(), CoreError> {
        let settle = self.timing.settle_delay;
        let transport = self.link().await?;
        let result = send_command(transport, command, settle).await;
        self.check(result)
    }

    // ── Link management ──────────────────────────────────────────

    /// The open transport, connecting first if needed.
    async fn link(&mut self) -> Result<&mut (dyn Transport + 'static), CoreError> {
        if self.transport.is_none() {
            match self.connector.connect().await {
                Ok(transport) => {
                    info!(channel = %self.channel, endpoint = %self.connector.describe(), "link opened");
                    self.transport = Some(transport);
                    self.set_health(ChannelHealth::Online);
                }
                Err(e) => {
                    let err = CoreError::from(e);
                    self.set_health(ChannelHealth::Offline { reason: err.to_string() });
                    return Err(err);
                }
            }
        }
        self.transport
            .as_deref_mut()
            .ok_or_else(|| CoreError::Internal("link vanished".into()))
    }

    /// Map an exchange result, dropping the link if it failed underneath.
    fn check<T>(&mut self, result: Result<T, relaylink_api::Error>) -> Result<T, CoreError> {
        match result {
            Ok(value) => {
                self.set_health(ChannelHealth::Online);
                Ok(value)
            }
            Err(e) => {
                if matches!(e, relaylink_api::Error::Transport(_)) {
                    warn!(channel = %self.channel, error = %e, "link failed, will reopen on next request");
                    self.transport = None;
                    self.set_health(ChannelHealth::Offline { reason: e.to_string() });
                }
                Err(e.into())
            }
        }
    }

    fn set_health(&self, health: ChannelHealth) {
        self.status.send_if_modified(|s| {
            if s.health == health {
                return false;
            }
            s.health = health;
            true
        });
    }

    // ── Timers and bookkeeping ───────────────────────────────────

    fn arm(&mut self, period: Duration) {
        self.next_timer_id += 1;
        self.timer = Some(PollTimer::arm(
            self.next_timer_id,
            period,
            &self.cancel,
            self.request_tx.clone(),
            Arc::clone(&self.in_flight),
        ));
        self.status.send_modify(|s| s.poll_interval = Some(period));
        debug!(channel = %self.channel, timer = self.next_timer_id, ?period, "poll timer armed");
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!(channel = %self.channel, timer = timer.id(), period = ?timer.period(), "poll timer cancelled");
        }
        self.status.send_modify(|s| s.poll_interval = None);
    }

    fn enter(&mut self, state: SessionState, focused: Option<EntityKey>) {
        if self.state != state {
            debug!(channel = %self.channel, from = %self.state, to = %state, "state change");
        }
        self.state = state;
        self.focused = focused;
        self.status.send_modify(|s| {
            s.state = state;
            s.focused = focused;
        });
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), CoreError> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.state,
            operation,
        }
    }

    fn count_dropped(&self, report: &ExchangeReport) {
        if report.lines_dropped > 0 {
            self.status.send_modify(|s| s.lines_dropped += report.lines_dropped);
        }
    }
}
