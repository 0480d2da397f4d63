//! `ports`: serial ports visible on this machine.

use relaylink_api::{SerialPortInfo, available_ports};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    name: String,
    #[tabled(rename = "Type")]
    port_type: String,
    #[tabled(rename = "VID:PID")]
    ids: String,
    #[tabled(rename = "Product")]
    product: String,
}

impl From<&SerialPortInfo> for PortRow {
    fn from(p: &SerialPortInfo) -> Self {
        let ids = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
            _ => String::new(),
        };
        Self {
            name: p.port_name.clone(),
            port_type: p.port_type.clone(),
            ids,
            product: p.product.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let ports = available_ports().map_err(|e| CliError::ChannelOffline { reason: e.to_string() })?;
    let out = output::render_list(&global.output, &ports, |p| PortRow::from(p), |p| p.port_name.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
