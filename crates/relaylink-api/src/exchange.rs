// ── Command/response exchange ──
//
// One command out, then read lines until the response ends. The module
// has no request IDs, so whoever calls this must hold the transport
// exclusively for the whole cycle.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::command::Command;
use crate::error::Error;
use crate::line::LineAssembler;
use crate::parse::{Classified, CsvGrammar, HostEntry, NetworkRecord, ObservedNetwork, ProbeEntry, classify};
use crate::transport::{Transport, write_all};

/// Per-read wait inside the response loop.
pub const READ_SLICE: Duration = Duration::from_millis(100);
/// Pause after a fire-and-forget command before the next one is safe.
pub const SETTLE_DELAY: Duration = Duration::from_millis(150);

pub const SCAN_DEADLINE: Duration = Duration::from_secs(30);
pub const SNIFFER_DEADLINE: Duration = Duration::from_secs(5);
pub const PROBE_DEADLINE: Duration = Duration::from_secs(5);
pub const HOST_DEADLINE: Duration = Duration::from_secs(5);
pub const LISTING_DEADLINE: Duration = Duration::from_secs(3);

/// What ends the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    /// A completion marker. Hitting the deadline first means `TimedOut`.
    Marker,
    /// The dump has no terminator; the deadline is its normal end.
    Silence,
}

/// Everything needed to run one exchange.
#[derive(Debug, Clone)]
pub struct ExchangeSpec {
    pub command: Command,
    pub deadline: Duration,
    pub grammar: CsvGrammar,
    pub end: EndCondition,
}

impl ExchangeSpec {
    pub fn new(command: Command, deadline: Duration, end: EndCondition) -> Self {
        Self {
            command,
            deadline,
            grammar: CsvGrammar::ObserverScan,
            end,
        }
    }

    /// `scan_networks`, read with the given CSV variant.
    pub fn scan(grammar: CsvGrammar) -> Self {
        Self {
            grammar,
            ..Self::new(Command::scan_networks(), SCAN_DEADLINE, EndCondition::Marker)
        }
    }

    pub fn sniffer_results() -> Self {
        Self::new(Command::show_sniffer_results(), SNIFFER_DEADLINE, EndCondition::Silence)
    }

    pub fn probes() -> Self {
        Self::new(Command::list_probes(), PROBE_DEADLINE, EndCondition::Silence)
    }

    pub fn hosts() -> Self {
        Self::new(Command::list_hosts(), HOST_DEADLINE, EndCondition::Silence)
    }

    /// Directory or file listing style commands.
    pub fn listing(command: Command) -> Self {
        Self::new(command, LISTING_DEADLINE, EndCondition::Silence)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExchangeOutcome {
    Complete,
    /// The deadline passed before the completion marker. Results may be
    /// incomplete.
    TimedOut,
}

/// Bookkeeping for one finished exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeReport {
    pub command: String,
    pub outcome: ExchangeOutcome,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub lines_seen: usize,
    pub lines_matched: usize,
    pub lines_dropped: u64,
}

impl ExchangeReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ExchangeOutcome::Complete
    }

    pub fn may_be_incomplete(&self) -> bool {
        self.outcome == ExchangeOutcome::TimedOut
    }
}

/// Items gathered by an exchange plus its report. Items are kept even
/// when the exchange timed out.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResult<T> {
    pub items: Vec<T>,
    pub report: ExchangeReport,
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// Run one exchange, handing every classified line to `accept`.
///
/// `accept` returns whether it used the item; that only feeds the
/// `lines_matched` counter. A completion marker is consumed here and
/// never reaches `accept` when the spec ends on a marker.
pub async fn exchange<F>(transport: &mut dyn Transport, spec: &ExchangeSpec, mut accept: F) -> Result<ExchangeReport, Error>
where
    F: FnMut(Classified) -> bool + Send,
{
    let started = Instant::now();
    let deadline = started + spec.deadline;
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 256];
    let mut seen = 0usize;
    let mut matched = 0usize;

    transport.flush_input().await?;
    write_all(transport, &spec.command.to_wire()).await?;
    debug!(command = %spec.command, deadline = ?spec.deadline, "exchange started");

    let mut handle = |line: &str| -> bool {
        seen += 1;
        match classify(line, spec.grammar) {
            Some(Classified::Completion(_)) if spec.end == EndCondition::Marker => return true,
            Some(item) => {
                if accept(item) {
                    matched += 1;
                }
            }
            None => trace!(line, "unmatched line"),
        }
        false
    };

    let outcome = 'pump: loop {
        let now = Instant::now();
        if now >= deadline {
            if assembler.finish().is_some_and(|tail| handle(&tail)) {
                break ExchangeOutcome::Complete;
            }
            break match spec.end {
                EndCondition::Marker => ExchangeOutcome::TimedOut,
                EndCondition::Silence => ExchangeOutcome::Complete,
            };
        }

        let slice = READ_SLICE.min(deadline - now);
        let n = transport.read(&mut buf, slice).await?;
        let Some(chunk) = buf.get(..n) else { continue };
        for line in assembler.feed(chunk) {
            if handle(&line) {
                break 'pump ExchangeOutcome::Complete;
            }
        }
    };

    let report = ExchangeReport {
        command: spec.command.to_string(),
        outcome,
        elapsed: started.elapsed(),
        lines_seen: seen,
        lines_matched: matched,
        lines_dropped: assembler.dropped(),
    };
    debug!(
        command = %report.command,
        outcome = %report.outcome,
        seen = report.lines_seen,
        matched = report.lines_matched,
        "exchange finished"
    );
    Ok(report)
}

/// Run an exchange and collect the items `pick` keeps.
pub async fn collect<T, F>(transport: &mut dyn Transport, spec: &ExchangeSpec, mut pick: F) -> Result<ExchangeResult<T>, Error>
where
    T: Send,
    F: FnMut(Classified) -> Option<T> + Send,
{
    let mut items = Vec::new();
    let report = exchange(transport, spec, |item| match pick(item) {
        Some(value) => {
            items.push(value);
            true
        }
        None => false,
    })
    .await?;
    Ok(ExchangeResult { items, report })
}

/// `scan_networks` read as a network list (with channels).
pub async fn scan_network_list(transport: &mut dyn Transport, deadline: Duration) -> Result<ExchangeResult<NetworkRecord>, Error> {
    let spec = ExchangeSpec::scan(CsvGrammar::NetworkList).with_deadline(deadline);
    collect(transport, &spec, |item| match item {
        Classified::Network(rec) => Some(rec),
        _ => None,
    })
    .await
}

/// `scan_networks` read as an observer scan.
pub async fn scan_observed(transport: &mut dyn Transport, deadline: Duration) -> Result<ExchangeResult<ObservedNetwork>, Error> {
    let spec = ExchangeSpec::scan(CsvGrammar::ObserverScan).with_deadline(deadline);
    collect(transport, &spec, |item| match item {
        Classified::Observed(obs) => Some(obs),
        _ => None,
    })
    .await
}

pub async fn list_probes(transport: &mut dyn Transport, deadline: Duration) -> Result<ExchangeResult<ProbeEntry>, Error> {
    let spec = ExchangeSpec::probes().with_deadline(deadline);
    collect(transport, &spec, |item| match item {
        Classified::Probe(probe) => Some(probe),
        _ => None,
    })
    .await
}

pub async fn list_hosts(transport: &mut dyn Transport, deadline: Duration) -> Result<ExchangeResult<HostEntry>, Error> {
    let spec = ExchangeSpec::hosts().with_deadline(deadline);
    collect(transport, &spec, |item| match item {
        Classified::Host(host) => Some(host),
        _ => None,
    })
    .await
}

/// Send a command that has no response worth parsing, then wait out the
/// settle delay and throw away whatever acknowledgement came back.
pub async fn send_command(transport: &mut dyn Transport, command: &Command, settle: Duration) -> Result<(), Error> {
    transport.flush_input().await?;
    write_all(transport, &command.to_wire()).await?;
    debug!(%command, "command sent");
    tokio::time::sleep(settle).await;
    transport.flush_input().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[tokio::test(start_paused = true)]
    async fn marker_ends_scan_early() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.respond_to(
            "scan_networks",
            [
                r#""1","Cafe","","aa:bb:cc:dd:ee:01","","WPA2","-50","2.4GHz""#,
                "Scan results printed",
            ],
        );

        let result = scan_observed(&mut transport, SCAN_DEADLINE).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.report.outcome, ExchangeOutcome::Complete);
        assert!(result.report.elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_is_normal_end_for_dumps() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.respond_to("list_probes", ["1 HomeNet", "2 Office", "garbage"]);

        let result = list_probes(&mut transport, PROBE_DEADLINE).await.unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.report.outcome, ExchangeOutcome::Complete);
        assert_eq!(result.report.lines_seen, 3);
        assert_eq!(result.report.lines_matched, 2);
        assert!(result.report.elapsed >= PROBE_DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_tail_is_parsed_at_deadline() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.respond_to("list_hosts", Vec::<String>::new());
        let task = tokio::spawn(async move {
            let r = list_hosts(&mut transport, HOST_DEADLINE).await;
            r.unwrap()
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        peer.push_bytes(b"10.0.0.7 -> aa:bb:cc:dd:ee:07");

        let result = task.await.unwrap();
        assert_eq!(result.items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_input_is_flushed_before_command() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.push_lines(["1 Stale"]);
        peer.respond_to("list_probes", ["2 Fresh"]);

        let result = list_probes(&mut transport, PROBE_DEADLINE).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].ssid, "Fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_mid_exchange_is_an_error() {
        let (mut transport, peer) = MemoryTransport::pair();
        let task = tokio::spawn(async move { list_probes(&mut transport, PROBE_DEADLINE).await });
        tokio::time::sleep(Duration::from_millis(250)).await;
        peer.disconnect();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn send_command_waits_settle_delay() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.respond_to("stop", ["Stopping..."]);
        let started = Instant::now();

        send_command(&mut transport, &Command::stop(), SETTLE_DELAY).await.unwrap();

        assert!(started.elapsed() >= SETTLE_DELAY);
        assert_eq!(peer.written(), vec!["stop".to_owned()]);
        let mut buf = [0u8; 32];
        assert_eq!(transport.read(&mut buf, Duration::from_millis(10)).await.unwrap(), 0);
    }
}
