// ── Session requests ──
//
// Every operation on a session travels to its worker as a `Request`.
// The worker handles them one at a time, which is what keeps exchanges
// on a channel from overlapping.

use relaylink_api::{Command, ExchangeReport, ExchangeResult, MacAddress, NetworkRecord};
use tokio::sync::oneshot;

use crate::error::CoreError;
use crate::model::{EntityKey, HostEntry, ProbeEntry};

/// Operations the worker understands.
#[derive(Debug, Clone)]
pub(crate) enum Request {
    StartObserving,
    Focus(EntityKey),
    Unfocus,
    Stop,
    ListNetworks,
    ListProbes,
    ListHosts,
    SelectStations(MacAddress),
    Send(Command),
    /// Tick from the poll timer with the given id.
    Poll(u64),
}

impl Request {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::StartObserving => "start_observing",
            Self::Focus(_) => "focus",
            Self::Unfocus => "unfocus",
            Self::Stop => "stop",
            Self::ListNetworks => "list_networks",
            Self::ListProbes => "list_probes",
            Self::ListHosts => "list_hosts",
            Self::SelectStations(_) => "select_stations",
            Self::Send(_) => "send",
            Self::Poll(_) => "poll",
        }
    }
}

/// Result payloads, one per request family.
#[derive(Debug)]
pub(crate) enum Reply {
    Done,
    Scan(ExchangeReport),
    Networks(ExchangeResult<NetworkRecord>),
    Probes(ExchangeResult<ProbeEntry>),
    Hosts(ExchangeResult<HostEntry>),
}

/// A request plus the channel its result goes back on. Timer ticks carry
/// no reply channel.
pub(crate) struct Envelope {
    pub request: Request,
    pub reply_tx: Option<oneshot::Sender<Result<Reply, CoreError>>>,
}

impl Envelope {
    pub(crate) fn poll(timer_id: u64) -> Self {
        Self {
            request: Request::Poll(timer_id),
            reply_tx: None,
        }
    }
}
