#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use relaylink_api::{Command, ExchangeOutcome, MacAddress, MemoryPeer, MemoryTransport};

use super::*;

// ── Fixtures ────────────────────────────────────────────────────────

const SCAN: &[&str] = &[
    r#""1","Cafe","","aa:bb:cc:00:00:01","","WPA2","-42","2.4GHz""#,
    r#""2","Office","","aa:bb:cc:00:00:02","","WPA3","-60","5GHz""#,
    r#""3","","","aa:bb:cc:00:00:03","","OPEN","-80","2.4GHz""#,
    "Scan results printed",
];

const SNIFF: &[&str] = &["Cafe, CH6: 2", "  aa:00:00:00:00:01", "  aa:00:00:00:00:02"];

fn spawn(timing: SessionTiming) -> (Session, MemoryPeer) {
    let (transport, peer) = MemoryTransport::pair();
    peer.respond_always("scan_networks", SCAN.iter().copied());
    peer.respond_always("show_sniffer_results", SNIFF.iter().copied());
    let session = Session::spawn(ChannelId::from("uart-a"), Arc::new(transport), timing);
    (session, peer)
}

fn session() -> (Session, MemoryPeer) {
    spawn(SessionTiming::default())
}

fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap()
}

fn clients(session: &Session, index: u32) -> Vec<MacAddress> {
    session.entity(EntityKey(index)).unwrap().clients.iter().cloned().collect()
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// ── Observe cycle ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_observing_scans_then_sniffs() {
    let (session, peer) = session();

    let report = session.start_observing().await.unwrap();

    assert_eq!(report.outcome, ExchangeOutcome::Complete);
    assert_eq!(peer.written(), vec!["scan_networks", "start_sniffer_noscan"]);
    let status = session.status();
    assert_eq!(status.state, SessionState::SnifferActive);
    assert_eq!(status.poll_interval, Some(Duration::from_secs(20)));
    assert!(status.is_online());
    assert!(!status.scan_incomplete);

    let keys: Vec<u32> = session.snapshot().iter().map(|e| e.key.index()).collect();
    assert_eq!(keys, vec![1, 2, 3]);
    assert!(session.entity(EntityKey(3)).unwrap().is_hidden());
}

#[tokio::test(start_paused = true)]
async fn poll_merges_sniffer_clients() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();

    // First poll fires at 20s and reads for the 5s sniffer deadline.
    sleep_secs(26).await;

    assert_eq!(peer.count("show_sniffer_results"), 1);
    assert_eq!(clients(&session, 1), vec![mac("aa:00:00:00:00:01"), mac("aa:00:00:00:00:02")]);
    assert!(clients(&session, 2).is_empty());
    assert_eq!(session.entity(EntityKey(1)).unwrap().channel, Some(6));

    let status = session.status();
    assert_eq!(status.polls, 1);
    assert_eq!(status.last_poll, Some(PollOutcome::Complete));
    assert!(status.last_poll_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn client_sets_only_grow_between_polls() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    sleep_secs(26).await;

    peer.respond_to("show_sniffer_results", ["Cafe, CH6: 1", "  aa:00:00:00:00:03"]);
    sleep_secs(20).await;

    assert_eq!(session.status().polls, 2);
    assert_eq!(
        clients(&session, 1),
        vec![
            mac("aa:00:00:00:00:01"),
            mac("aa:00:00:00:00:02"),
            mac("aa:00:00:00:00:03"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn orphan_stations_count_as_misses() {
    let (session, peer) = session();
    peer.respond_always("show_sniffer_results", ["Elsewhere, CH1: 1", "  aa:00:00:00:00:09"]);
    session.start_observing().await.unwrap();
    sleep_secs(26).await;

    assert_eq!(session.status().correlation_misses, 1);
    assert!(session.snapshot().iter().all(|e| e.clients.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn only_one_poll_in_flight() {
    let timing = SessionTiming {
        poll_interval: Duration::from_secs(1),
        ..SessionTiming::default()
    };
    let (session, peer) = spawn(timing);
    session.start_observing().await.unwrap();

    // Ticks at 2s..5s land while the first 5s dump is still being read.
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    assert_eq!(peer.count("show_sniffer_results"), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_clears_table_and_stops_first() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    sleep_secs(26).await;
    assert_eq!(clients(&session, 1).len(), 2);

    session.start_observing().await.unwrap();

    let written = peer.written();
    assert_eq!(
        &written[written.len() - 3..],
        &["stop", "scan_networks", "start_sniffer_noscan"]
    );
    assert!(clients(&session, 1).is_empty());
    assert_eq!(session.status().state, SessionState::SnifferActive);
}

#[tokio::test(start_paused = true)]
async fn scan_timeout_keeps_partial_table() {
    let timing = SessionTiming {
        scan_deadline: Duration::from_secs(2),
        ..SessionTiming::default()
    };
    let (session, peer) = spawn(timing);
    peer.respond_always(
        "scan_networks",
        [r#""1","Cafe","","aa:bb:cc:00:00:01","","WPA2","-42","2.4GHz""#],
    );

    let report = session.start_observing().await.unwrap();

    assert_eq!(report.outcome, ExchangeOutcome::TimedOut);
    assert!(session.status().scan_incomplete);
    assert_eq!(session.snapshot().len(), 1);
    assert_eq!(session.status().state, SessionState::SnifferActive);
}

// ── Focus ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn focus_and_unfocus_round_trip() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    sleep_secs(26).await;

    session.focus(EntityKey(1)).await.unwrap();

    let status = session.status();
    assert_eq!(status.state, SessionState::Focused);
    assert_eq!(status.focused, Some(EntityKey(1)));
    assert_eq!(status.poll_interval, Some(Duration::from_secs(10)));

    session.unfocus().await.unwrap();

    let status = session.status();
    assert_eq!(status.state, SessionState::SnifferActive);
    assert_eq!(status.focused, None);
    assert_eq!(status.poll_interval, Some(Duration::from_secs(20)));

    let written = peer.written();
    assert_eq!(
        &written[written.len() - 5..],
        &[
            "stop",
            "select_networks 1",
            "start_sniffer_noscan",
            "unselect_networks",
            "start_sniffer_noscan",
        ]
    );
    // Clients collected before focusing survive the round trip.
    assert_eq!(clients(&session, 1).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn clients_seen_while_focused_survive_unfocus() {
    let (session, peer) = session();
    peer.respond_always(
        "show_sniffer_results",
        ["Cafe, CH6: 2", "  aa:00:00:00:00:01", "  aa:00:00:00:00:02", "Office, CH1: 1", "  aa:00:00:00:00:05"],
    );
    session.start_observing().await.unwrap();
    sleep_secs(26).await;

    peer.respond_always("show_sniffer_results", ["Cafe, CH6: 1", "  aa:00:00:00:00:03"]);
    session.focus(EntityKey(1)).await.unwrap();
    // Focused poll fires 10s later and reads for 5s.
    sleep_secs(16).await;
    assert_eq!(session.status().polls, 2);

    session.unfocus().await.unwrap();

    assert_eq!(
        clients(&session, 1),
        vec![
            mac("aa:00:00:00:00:01"),
            mac("aa:00:00:00:00:02"),
            mac("aa:00:00:00:00:03"),
        ]
    );
    assert_eq!(clients(&session, 2), vec![mac("aa:00:00:00:00:05")]);
}

/// Drop the link and detach the device `ms` milliseconds from now.
fn drop_link_after(peer: &MemoryPeer, ms: u64) {
    let peer = peer.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        peer.disconnect();
        peer.set_attached(false);
    });
}

#[tokio::test(start_paused = true)]
async fn focus_failing_midway_leaves_session_idle() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();

    // `stop` lands, then the link dies while `select_networks` settles.
    drop_link_after(&peer, 200);
    let err = session.focus(EntityKey(1)).await.unwrap_err();

    assert!(err.is_offline());
    let written = peer.written();
    assert_eq!(&written[written.len() - 2..], &["stop", "select_networks 1"]);
    let status = session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.focused, None);
    assert_eq!(status.poll_interval, None);

    peer.set_attached(true);
    sleep_secs(60).await;
    assert_eq!(peer.count("show_sniffer_results"), 0);
}

#[tokio::test(start_paused = true)]
async fn unfocus_failing_midway_leaves_session_idle() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    session.focus(EntityKey(1)).await.unwrap();

    drop_link_after(&peer, 200);
    let err = session.unfocus().await.unwrap_err();

    assert!(err.is_offline());
    let written = peer.written();
    assert_eq!(&written[written.len() - 2..], &["unselect_networks", "start_sniffer_noscan"]);
    let status = session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.focused, None);
    assert_eq!(status.poll_interval, None);
}

#[tokio::test(start_paused = true)]
async fn focused_session_polls_faster() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    session.focus(EntityKey(2)).await.unwrap();

    sleep_secs(16).await;

    assert_eq!(peer.count("show_sniffer_results"), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_transitions_leave_state_alone() {
    let (session, peer) = session();

    let err = session.focus(EntityKey(1)).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            from: SessionState::Idle,
            operation: "focus"
        }
    ));
    assert!(matches!(session.unfocus().await, Err(CoreError::InvalidTransition { .. })));

    session.start_observing().await.unwrap();
    assert!(matches!(
        session.unfocus().await,
        Err(CoreError::InvalidTransition {
            from: SessionState::SnifferActive,
            ..
        })
    ));
    assert!(matches!(
        session.focus(EntityKey(99)).await,
        Err(CoreError::EntityNotFound { key: EntityKey(99) })
    ));
    assert!(matches!(session.list_networks().await, Err(CoreError::InvalidTransition { .. })));

    assert_eq!(session.status().state, SessionState::SnifferActive);
    assert_eq!(peer.written(), vec!["scan_networks", "start_sniffer_noscan"]);
}

// ── Stop ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_halts_polling_and_keeps_table() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();
    sleep_secs(26).await;

    session.stop().await.unwrap();
    sleep_secs(120).await;

    let status = session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.poll_interval, None);
    assert_eq!(peer.count("show_sniffer_results"), 1);
    assert_eq!(peer.written().last().map(String::as_str), Some("stop"));
    assert_eq!(session.snapshot().len(), 3);
    assert_eq!(clients(&session, 1).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_from_focus_goes_idle() {
    let (session, _peer) = session();
    session.start_observing().await.unwrap();
    session.focus(EntityKey(1)).await.unwrap();

    session.stop().await.unwrap();

    let status = session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.focused, None);
}

// ── One-shot exchanges ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn list_networks_leaves_table_alone() {
    let (session, peer) = session();
    peer.respond_to(
        "scan_networks",
        [
            r#""4","Lab","","aa:bb:cc:00:00:04","11","WPA2","-50","2.4GHz""#,
            "Scan results printed",
        ],
    );

    let result = session.list_networks().await.unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].channel, 11);
    assert!(session.snapshot().is_empty());
    assert_eq!(session.status().state, SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn probes_and_hosts_do_not_touch_table() {
    let (session, peer) = session();
    peer.respond_always("list_probes", ["0 HomeNet", "1 Airport"]);
    peer.respond_always("list_hosts", ["192.168.4.2 -> aa:bb:cc:dd:ee:01"]);
    session.start_observing().await.unwrap();
    let before = session.snapshot();

    let probes = session.list_probes().await.unwrap();
    let hosts = session.list_hosts().await.unwrap();

    assert_eq!(probes.items.len(), 2);
    assert_eq!(hosts.items[0].mac, mac("aa:bb:cc:dd:ee:01"));
    assert!(Arc::ptr_eq(&before, &session.snapshot()));
    assert_eq!(session.status().state, SessionState::SnifferActive);
}

#[tokio::test(start_paused = true)]
async fn raw_commands_pass_through() {
    let (session, peer) = session();

    session.select_stations(mac("aa:00:00:00:00:01")).await.unwrap();
    session.send(Command::raw("attack -t deauth").unwrap()).await.unwrap();

    assert_eq!(
        peer.written(),
        vec!["select_stations aa:00:00:00:00:01", "attack -t deauth"]
    );
    assert_eq!(session.status().state, SessionState::Idle);
}

// ── Link failures ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn absent_device_reports_busy() {
    let (session, peer) = session();
    peer.set_attached(false);

    let err = session.start_observing().await.unwrap_err();

    assert!(matches!(err, CoreError::ChannelBusy { .. }));
    let status = session.status();
    assert_eq!(status.state, SessionState::Idle);
    assert!(matches!(status.health, ChannelHealth::Offline { .. }));

    peer.set_attached(true);
    session.start_observing().await.unwrap();
    assert!(session.status().is_online());
    assert_eq!(peer.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_link_reopens_on_next_request() {
    let (session, peer) = session();
    peer.respond_always("list_probes", ["0 HomeNet"]);
    session.list_probes().await.unwrap();

    peer.disconnect();
    let err = session.list_probes().await.unwrap_err();
    assert!(err.is_offline());
    assert!(!session.status().is_online());

    let probes = session.list_probes().await.unwrap();
    assert_eq!(probes.items.len(), 1);
    assert_eq!(peer.connects(), 2);
    assert!(session.status().is_online());
}

#[tokio::test(start_paused = true)]
async fn failed_poll_is_reported_not_fatal() {
    let (session, peer) = session();
    session.start_observing().await.unwrap();

    peer.disconnect();
    peer.set_attached(false);
    sleep_secs(21).await;

    let status = session.status();
    assert!(matches!(status.last_poll, Some(PollOutcome::Failed { .. })));
    assert_eq!(status.state, SessionState::SnifferActive);

    // The next poll reconnects once the device is back.
    peer.set_attached(true);
    sleep_secs(25).await;
    assert_eq!(session.status().last_poll, Some(PollOutcome::Complete));
    assert_eq!(clients(&session, 1).len(), 2);
}

// ── Observation ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn entity_stream_sees_scan_and_poll() {
    let (session, _peer) = session();
    let mut stream = session.entities();
    assert!(stream.current().is_empty());

    session.start_observing().await.unwrap();
    let snap = stream.changed().await.unwrap();
    assert!(!snap.is_empty());

    sleep_secs(26).await;
    let latest = stream.latest();
    assert_eq!(latest[0].client_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn entity_watch_stream_yields_current_then_changes() {
    use futures_util::StreamExt;

    let (session, _peer) = session();
    let mut stream = session.entities().into_stream();

    let first = stream.next().await.unwrap();
    assert!(first.is_empty());

    session.start_observing().await.unwrap();
    let scanned = stream.next().await.unwrap();
    assert_eq!(scanned.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_session() {
    let (session, _peer) = session();
    session.start_observing().await.unwrap();

    session.shutdown().await;

    assert!(matches!(session.stop().await, Err(CoreError::SessionClosed { .. })));
}
