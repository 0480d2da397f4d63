//! `scan`: one-shot network list.

use relaylink_api::{ExchangeReport, NetworkRecord};
use relaylink_core::Session;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "#")]
    index: u32,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "CH")]
    channel: u8,
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "RSSI")]
    rssi: i16,
    #[tabled(rename = "Band")]
    band: String,
}

impl From<&NetworkRecord> for NetworkRow {
    fn from(n: &NetworkRecord) -> Self {
        Self {
            index: n.index,
            ssid: display_ssid(&n.ssid),
            bssid: n.bssid.to_string(),
            channel: n.channel,
            security: n.security.clone(),
            rssi: n.rssi,
            band: n.band.to_string(),
        }
    }
}

/// Hidden networks print as `<hidden>` in tables.
pub fn display_ssid(ssid: &str) -> String {
    if ssid.is_empty() {
        "<hidden>".into()
    } else {
        ssid.to_owned()
    }
}

/// Tell the user when a listing ended on its deadline instead of the
/// module's end marker.
pub fn warn_if_incomplete(report: &ExchangeReport, global: &GlobalOpts) {
    if report.may_be_incomplete() {
        output::warn(
            global,
            &format!(
                "{} hit its {:.0?} deadline before the module finished; results may be incomplete",
                report.command, report.elapsed
            ),
        );
    }
    if report.lines_dropped > 0 {
        output::warn(
            global,
            &format!("{} overlong line(s) from the module were dropped", report.lines_dropped),
        );
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    output::note(global, &format!("Scanning on {} ({})...", session.channel(), session.endpoint()));
    let result = session.list_networks().await?;
    warn_if_incomplete(&result.report, global);

    let out = output::render_list(&global.output, &result.items, |n| NetworkRow::from(n), |n| {
        n.bssid.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
