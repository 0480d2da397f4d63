// ── Runtime channel configuration ──
//
// These types describe *which* links exist and how sessions pace
// themselves on them. They never touch disk: relaylink-config (or a
// board bring-up layer) builds them and hands them in.

use std::fmt;
use std::time::Duration;

use relaylink_api::SerialSettings;
use relaylink_api::exchange::{HOST_DEADLINE, PROBE_DEADLINE, SCAN_DEADLINE, SETTLE_DELAY, SNIFFER_DEADLINE};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable name of one physical channel (e.g. `"uart-a"`, `"usb"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Physical link type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Onboard UART, first pin mapping.
    UartA,
    /// Onboard UART, second pin mapping.
    UartB,
    /// USB-CDC serial.
    Usb,
}

/// GPIO pins routed to an onboard UART. Informational for the engine;
/// board bring-up applies them before the port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    pub tx: u8,
    pub rx: u8,
}

/// One configured channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub serial: SerialSettings,
    pub pins: Option<PinMap>,
}

/// Timers and deadlines shared by every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Sniffer poll period while observing all networks.
    pub poll_interval: Duration,
    /// Sniffer poll period while focused on one network.
    pub focused_poll_interval: Duration,
    pub scan_deadline: Duration,
    pub sniffer_deadline: Duration,
    pub probe_deadline: Duration,
    pub host_deadline: Duration,
    /// Pause after fire-and-forget commands.
    pub settle_delay: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            focused_poll_interval: Duration::from_secs(10),
            scan_deadline: SCAN_DEADLINE,
            sniffer_deadline: SNIFFER_DEADLINE,
            probe_deadline: PROBE_DEADLINE,
            host_deadline: HOST_DEADLINE,
            settle_delay: SETTLE_DELAY,
        }
    }
}
