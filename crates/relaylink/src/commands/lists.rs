//! `probes` and `hosts`: one-shot listings that leave the network table alone.

use relaylink_core::{HostEntry, ProbeEntry, Session};
use tabled::Tabled;

use super::scan::warn_if_incomplete;
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "#")]
    index: u32,
    #[tabled(rename = "SSID")]
    ssid: String,
}

impl From<&ProbeEntry> for ProbeRow {
    fn from(p: &ProbeEntry) -> Self {
        Self {
            index: p.index,
            ssid: p.ssid.clone(),
        }
    }
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

impl From<&HostEntry> for HostRow {
    fn from(h: &HostEntry) -> Self {
        Self {
            ip: h.ip.to_string(),
            mac: h.mac.to_string(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn probes(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let result = session.list_probes().await?;
    warn_if_incomplete(&result.report, global);

    let out = output::render_list(&global.output, &result.items, |p| ProbeRow::from(p), |p| p.ssid.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn hosts(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let result = session.list_hosts().await?;
    warn_if_incomplete(&result.report, global);

    let out = output::render_list(&global.output, &result.items, |h| HostRow::from(h), |h| h.ip.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
