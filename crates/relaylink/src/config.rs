//! CLI configuration -- thin wrapper around `relaylink_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (`--config`, `--channel`, `--port`).

use relaylink_api::SerialSettings;
use relaylink_config::{Config, config_path, load_config};
use relaylink_core::{ChannelConfig, ChannelId, ChannelKind, ChannelRegistry};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Channel id given to a `--port` device.
const DIRECT_CHANNEL: &str = "direct";

/// Load the config file named by `--config`, or the default one.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config(global.config.as_deref())?)
}

/// Human-readable location of the config file in use.
pub fn display_path(global: &GlobalOpts) -> String {
    global.config.clone().unwrap_or_else(config_path).display().to_string()
}

/// Build the channel registry for a session-bound command.
///
/// `--port` wins over configured channels; otherwise `--channel` (or the
/// configured default) selects the active one.
pub fn build_registry(global: &GlobalOpts) -> Result<ChannelRegistry, CliError> {
    let config = load(global)?;
    let timing = config.session_timing();

    if let Some(port) = &global.port {
        if global.baud == 0 {
            return Err(CliError::Validation {
                field: "baud".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let id = ChannelId::new(global.channel.as_deref().unwrap_or(DIRECT_CHANNEL));
        let direct = ChannelConfig {
            id: id.clone(),
            kind: ChannelKind::Usb,
            serial: SerialSettings::new(port.clone(), global.baud),
            pins: None,
        };
        return Ok(ChannelRegistry::builder(timing).channel(direct).active(id).build());
    }

    if config.channels.is_empty() {
        return Err(CliError::NoChannels {
            path: display_path(global),
        });
    }

    let active = match &global.channel {
        Some(id) if !config.channels.contains_key(id) => {
            return Err(CliError::UnknownChannel {
                channel: id.clone(),
                available: available(&config),
            });
        }
        Some(id) => Some(ChannelId::new(id.clone())),
        None => config.default_channel_id(),
    };

    let mut builder = ChannelRegistry::builder(timing);
    for channel in config.channel_configs()? {
        builder = builder.channel(channel);
    }
    if let Some(id) = active {
        builder = builder.active(id);
    }
    Ok(builder.build())
}

fn available(config: &Config) -> String {
    config.channels.keys().cloned().collect::<Vec<_>>().join(", ")
}
