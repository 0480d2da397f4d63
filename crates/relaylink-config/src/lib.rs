//! Channel and timing configuration for relaylink.
//!
//! TOML file + `RELAYLINK_` environment overrides, validated and turned
//! into `relaylink_core::ChannelConfig` / `SessionTiming`. Core never sees
//! these types; it receives the pre-built values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Data, Env, Format, Serialized, Toml},
};
use relaylink_api::{Parity, SerialSettings};
use relaylink_core::{ChannelConfig, ChannelId, ChannelKind, PinMap, SessionTiming};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `RELAYLINK_TIMING__POLL_INTERVAL_SECS=5`.
pub const ENV_PREFIX: &str = "RELAYLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Channel the UI starts on. Defaults to the first channel.
    pub default_channel: Option<String>,

    #[serde(default)]
    pub timing: Timing,

    /// Channels by id.
    #[serde(default)]
    pub channels: BTreeMap<String, Channel>,
}

/// Poll periods and exchange deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timing {
    pub poll_interval_secs: u64,
    pub focused_poll_interval_secs: u64,
    pub scan_deadline_secs: u64,
    pub sniffer_deadline_secs: u64,
    pub probe_deadline_secs: u64,
    pub host_deadline_secs: u64,
    pub settle_delay_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        let d = SessionTiming::default();
        Self {
            poll_interval_secs: d.poll_interval.as_secs(),
            focused_poll_interval_secs: d.focused_poll_interval.as_secs(),
            scan_deadline_secs: d.scan_deadline.as_secs(),
            sniffer_deadline_secs: d.sniffer_deadline.as_secs(),
            probe_deadline_secs: d.probe_deadline.as_secs(),
            host_deadline_secs: d.host_deadline.as_secs(),
            settle_delay_ms: u64::try_from(d.settle_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// One `[channels.<id>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Channel {
    /// `uart-a`, `uart-b` or `usb`.
    pub kind: String,

    /// Serial device path.
    pub port: String,

    #[serde(default = "default_baud")]
    pub baud: u32,

    #[serde(default)]
    pub parity: Parity,

    pub tx_pin: Option<u8>,
    pub rx_pin: Option<u8>,
}

fn default_baud() -> u32 {
    115_200
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "relaylink", "relaylink").map_or_else(
        || PathBuf::from(".relaylink").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate config from `path` (or the default location) plus
/// the environment.
///
/// A missing file at the default location yields an empty config; an
/// explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(p) if !p.exists() => Err(ConfigError::NotFound { path: p.to_path_buf() }),
        Some(p) => load_from(&figment(Toml::file_exact(p))),
        None => load_from(&figment(Toml::file(config_path()))),
    }
}

/// Defaults, then the TOML file, then `RELAYLINK_*` overrides.
fn figment(file: Data<Toml>) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(file)
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Extract and validate a config from an assembled figment.
pub fn load_from(figment: &Figment) -> Result<Config, ConfigError> {
    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Check every field that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        for (id, channel) in &self.channels {
            channel.validate(id)?;
        }
        if let Some(default) = &self.default_channel {
            if !self.channels.contains_key(default) {
                return Err(invalid(
                    "default_channel",
                    format!("'{default}' is not a configured channel"),
                ));
            }
        }
        Ok(())
    }

    /// Engine timing derived from `[timing]`.
    pub fn session_timing(&self) -> SessionTiming {
        self.timing.to_session_timing()
    }

    /// Engine channel definitions, in id order.
    pub fn channel_configs(&self) -> Result<Vec<ChannelConfig>, ConfigError> {
        self.channels
            .iter()
            .map(|(id, channel)| channel.to_channel_config(id))
            .collect()
    }

    /// The channel to start on: `default_channel`, else the first one.
    pub fn default_channel_id(&self) -> Option<ChannelId> {
        self.default_channel
            .as_deref()
            .or_else(|| self.channels.keys().next().map(String::as_str))
            .map(ChannelId::from)
    }
}

impl Timing {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timing.poll_interval_secs", self.poll_interval_secs),
            ("timing.focused_poll_interval_secs", self.focused_poll_interval_secs),
            ("timing.scan_deadline_secs", self.scan_deadline_secs),
            ("timing.sniffer_deadline_secs", self.sniffer_deadline_secs),
            ("timing.probe_deadline_secs", self.probe_deadline_secs),
            ("timing.host_deadline_secs", self.host_deadline_secs),
        ];
        match fields.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(invalid(field, "must be greater than zero")),
            None => Ok(()),
        }
    }

    pub fn to_session_timing(&self) -> SessionTiming {
        SessionTiming {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            focused_poll_interval: Duration::from_secs(self.focused_poll_interval_secs),
            scan_deadline: Duration::from_secs(self.scan_deadline_secs),
            sniffer_deadline: Duration::from_secs(self.sniffer_deadline_secs),
            probe_deadline: Duration::from_secs(self.probe_deadline_secs),
            host_deadline: Duration::from_secs(self.host_deadline_secs),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

impl Channel {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        self.kind(id)?;
        if self.port.trim().is_empty() {
            return Err(invalid(format!("channels.{id}.port"), "must not be empty"));
        }
        if self.baud == 0 {
            return Err(invalid(format!("channels.{id}.baud"), "must be greater than zero"));
        }
        self.pins(id)?;
        Ok(())
    }

    fn kind(&self, id: &str) -> Result<ChannelKind, ConfigError> {
        ChannelKind::from_str(&self.kind).map_err(|_| {
            invalid(
                format!("channels.{id}.kind"),
                format!("expected 'uart-a', 'uart-b', or 'usb', got '{}'", self.kind),
            )
        })
    }

    fn pins(&self, id: &str) -> Result<Option<PinMap>, ConfigError> {
        match (self.tx_pin, self.rx_pin) {
            (Some(tx), Some(rx)) => Ok(Some(PinMap { tx, rx })),
            (None, None) => Ok(None),
            _ => Err(invalid(
                format!("channels.{id}"),
                "tx_pin and rx_pin must be set together",
            )),
        }
    }

    pub fn to_channel_config(&self, id: &str) -> Result<ChannelConfig, ConfigError> {
        let mut serial = SerialSettings::new(self.port.clone(), self.baud);
        serial.parity = self.parity;
        Ok(ChannelConfig {
            id: ChannelId::from(id),
            kind: self.kind(id)?,
            serial,
            pins: self.pins(id)?,
        })
    }
}
