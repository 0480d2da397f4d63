//! `channels`: configured channels and their links.

use relaylink_core::ChannelId;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

/// One configured channel as shown to the user.
#[derive(Serialize)]
struct ChannelView {
    id: String,
    kind: String,
    port: String,
    baud: u32,
    pins: Option<String>,
    default: bool,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Channel")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Baud")]
    baud: u32,
    #[tabled(rename = "Pins (tx/rx)")]
    pins: String,
}

impl From<&ChannelView> for ChannelRow {
    fn from(c: &ChannelView) -> Self {
        Self {
            marker: if c.default { "*" } else { "" },
            id: c.id.clone(),
            kind: c.kind.clone(),
            port: c.port.clone(),
            baud: c.baud,
            pins: c.pins.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let default = global.channel.as_deref().map(ChannelId::from).or_else(|| cfg.default_channel_id());

    let views: Vec<ChannelView> = cfg
        .channel_configs()?
        .into_iter()
        .map(|c| ChannelView {
            default: default.as_ref() == Some(&c.id),
            id: c.id.to_string(),
            kind: c.kind.to_string(),
            port: c.serial.path,
            baud: c.serial.baud_rate,
            pins: c.pins.map(|p| format!("{}/{}", p.tx, p.rx)),
        })
        .collect();

    if views.is_empty() {
        output::note(global, &format!("No channels configured in {}", config::display_path(global)));
        return Ok(());
    }

    let out = output::render_list(&global.output, &views, |c| ChannelRow::from(c), |c| c.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
