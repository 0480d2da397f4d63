//! `observe`: scan, then sniff and reprint the table after every poll.

use std::sync::Arc;

use relaylink_core::{EntityKey, NetworkEntity, PollOutcome, Session, SessionStatus};
use tabled::Tabled;
use tokio::time::Instant;

use super::scan::{display_ssid, warn_if_incomplete};
use crate::cli::{GlobalOpts, ObserveArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "#")]
    index: u32,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "CH")]
    channel: String,
    #[tabled(rename = "RSSI")]
    rssi: i16,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Clients")]
    clients: usize,
}

impl From<&Arc<NetworkEntity>> for EntityRow {
    fn from(e: &Arc<NetworkEntity>) -> Self {
        Self {
            index: e.display_index(),
            ssid: display_ssid(&e.ssid),
            bssid: e.bssid.to_string(),
            channel: e.channel.map(|c| c.to_string()).unwrap_or_default(),
            rssi: e.rssi,
            band: e.band.to_string(),
            clients: e.client_count(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: &ObserveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    output::note(global, &format!("Observing on {} ({})...", session.channel(), session.endpoint()));
    let report = session.start_observing().await?;
    warn_if_incomplete(&report, global);

    let result = watch(session, args, global).await;
    // Leave the module idle whichever way observation ended.
    let stopped = session.stop().await;
    result?;
    stopped?;
    Ok(())
}

async fn watch(session: &Session, args: &ObserveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(index) = args.focus {
        session.focus(EntityKey(index)).await?;
        output::note(global, &format!("Focused on network {index}"));
    }
    print_table(session, global)?;
    follow(session, args, global).await
}

/// Reprint after each completed poll until Ctrl-C or `--duration`.
async fn follow(session: &Session, args: &ObserveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut status = session.watch_status();
    let mut polls = status.borrow_and_update().polls;
    let until = args.duration.map(|d| Instant::now() + d);

    let expired = async {
        match until {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(expired);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => break,
            () = &mut expired => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.polls != polls {
                    polls = current.polls;
                    report_poll(&current, global);
                    print_table(session, global)?;
                }
            }
        }
    }
    Ok(())
}

fn report_poll(status: &SessionStatus, global: &GlobalOpts) {
    match &status.last_poll {
        Some(PollOutcome::Failed { reason }) => output::warn(global, &format!("poll {} failed: {reason}", status.polls)),
        Some(PollOutcome::Complete) | None => {}
    }
    if status.correlation_misses > 0 {
        output::note(
            global,
            &format!("{} station(s) could not be matched to a network so far", status.correlation_misses),
        );
    }
}

fn print_table(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = session.snapshot();
    let out = output::render_list(&global.output, &snap, |e| EntityRow::from(e), |e| e.bssid.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use relaylink_api::MemoryTransport;
    use relaylink_core::{ChannelId, SessionState, SessionTiming};

    use super::*;
    use crate::cli::{Cli, Command};

    const SCAN: &[&str] = &[
        r#""1","Cafe","","aa:bb:cc:00:00:01","","WPA2","-42","2.4GHz""#,
        r#""2","Office","","aa:bb:cc:00:00:02","","WPA3","-60","5GHz""#,
        "Scan results printed",
    ];

    #[tokio::test(start_paused = true)]
    async fn failed_focus_still_stops_the_module() {
        let (transport, peer) = MemoryTransport::pair();
        peer.respond_always("scan_networks", SCAN.iter().copied());
        let session = Session::spawn(ChannelId::from("usb"), Arc::new(transport), SessionTiming::default());
        let cli = Cli::try_parse_from(["relaylink", "--quiet", "observe", "--focus", "99"]).unwrap();
        let Command::Observe(args) = cli.command else {
            panic!("expected the observe subcommand");
        };

        let err = handle(&session, &args, &cli.global).await.unwrap_err();

        assert!(matches!(err, CliError::NotFound { .. }), "{err}");
        assert_eq!(peer.written(), vec!["scan_networks", "start_sniffer_noscan", "stop"]);
        assert_eq!(session.status().state, SessionState::Idle);
    }
}
