use std::fmt;

use strum::{AsRefStr, Display, EnumString};

use crate::error::Error;
use crate::types::MacAddress;

/// Commands with a fixed meaning in the session protocol.
///
/// Anything else the module understands goes through [`Command::raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    ScanNetworks,
    SelectNetworks,
    UnselectNetworks,
    StartSniffer,
    StartSnifferNoscan,
    Stop,
    ShowSnifferResults,
    ListProbes,
    ListHosts,
    SelectStations,
}

/// One outbound command line. Never empty and never contains CR or LF.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    line: String,
}

impl Command {
    /// Validate an arbitrary command line, e.g. an attack start the
    /// engine only relays.
    pub fn raw(line: impl Into<String>) -> Result<Self, Error> {
        let line = line.into();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCommand {
                command: line,
                reason: "empty command",
            });
        }
        if trimmed.contains(['\r', '\n']) {
            return Err(Error::InvalidCommand {
                command: line,
                reason: "embedded line break",
            });
        }
        Ok(Self {
            line: trimmed.to_owned(),
        })
    }

    fn verb(verb: Verb) -> Self {
        Self {
            line: verb.to_string(),
        }
    }

    pub fn scan_networks() -> Self {
        Self::verb(Verb::ScanNetworks)
    }

    /// Restart sniffing on the existing scan results.
    pub fn start_sniffer_noscan() -> Self {
        Self::verb(Verb::StartSnifferNoscan)
    }

    pub fn stop() -> Self {
        Self::verb(Verb::Stop)
    }

    pub fn show_sniffer_results() -> Self {
        Self::verb(Verb::ShowSnifferResults)
    }

    pub fn list_probes() -> Self {
        Self::verb(Verb::ListProbes)
    }

    pub fn list_hosts() -> Self {
        Self::verb(Verb::ListHosts)
    }

    pub fn unselect_networks() -> Self {
        Self::verb(Verb::UnselectNetworks)
    }

    /// `select_networks <idx> [<idx> ...]` using the module's own indices.
    pub fn select_networks(indices: &[u32]) -> Result<Self, Error> {
        if indices.is_empty() {
            return Err(Error::InvalidCommand {
                command: Verb::SelectNetworks.to_string(),
                reason: "no network index given",
            });
        }
        let mut line = Verb::SelectNetworks.to_string();
        for idx in indices {
            line.push(' ');
            line.push_str(&idx.to_string());
        }
        Ok(Self { line })
    }

    pub fn select_stations(mac: &MacAddress) -> Self {
        Self {
            line: format!("{} {mac}", Verb::SelectStations),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// First word of the line.
    pub fn name(&self) -> &str {
        self.line.split_whitespace().next().unwrap_or_default()
    }

    /// The known verb, if this is not an opaque command.
    pub fn known_verb(&self) -> Option<Verb> {
        self.name().parse().ok()
    }

    /// Bytes to put on the wire, CRLF-terminated.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.line.len() + 2);
        bytes.extend_from_slice(self.line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}
