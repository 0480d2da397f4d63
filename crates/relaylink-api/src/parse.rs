// ── Response grammars ──
//
// Every parser takes one assembled line and either returns a fully
// validated value or `None`. Unmatched lines are normal: the remote
// module prints free-form diagnostics between records.

use std::net::Ipv4Addr;

use serde::Serialize;
use strum::{Display, EnumString};

use crate::types::{Band, MacAddress, is_mac_shaped};

/// Literal the module prints once a network scan has been dumped.
pub const SCAN_COMPLETE_MARKER: &str = "Scan results printed";

/// Longest SSID allowed by 802.11.
pub const MAX_SSID_LEN: usize = 32;

// ── Result types ────────────────────────────────────────────────────

/// End-of-response signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Completion {
    ScanResults,
}

/// One row of the network-list scan CSV.
///
/// `"<index>","<ssid>","","<bssid>","<channel>","<security>","<rssi>","<band>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkRecord {
    pub index: u32,
    pub ssid: String,
    pub bssid: MacAddress,
    pub channel: u8,
    pub security: String,
    pub rssi: i16,
    pub band: Band,
}

/// One row of the observer scan CSV. Same eight fields as
/// [`NetworkRecord`], but the fifth is a placeholder and carries no
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedNetwork {
    pub index: u32,
    pub ssid: String,
    pub bssid: MacAddress,
    pub security: String,
    pub rssi: i16,
    pub band: Band,
}

/// `<ssid>, CH<channel>: <client_count>` opening a sniffer block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnifferHeader {
    pub ssid: String,
    pub channel: u8,
    pub client_count: u32,
}

/// A probed SSID from `list_probes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeEntry {
    pub index: u32,
    pub ssid: String,
}

/// An IP/MAC pair from `list_hosts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

/// Which scan CSV variant the current exchange expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum CsvGrammar {
    NetworkList,
    ObserverScan,
}

/// A line matched against the known grammars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Completion(Completion),
    Network(NetworkRecord),
    Observed(ObservedNetwork),
    SnifferHeader(SnifferHeader),
    SnifferClient(MacAddress),
    Probe(ProbeEntry),
    Host(HostEntry),
}

/// Try each grammar in turn, most specific first.
pub fn classify(line: &str, grammar: CsvGrammar) -> Option<Classified> {
    if let Some(done) = parse_completion(line) {
        return Some(Classified::Completion(done));
    }
    if line.starts_with('"') {
        let csv = match grammar {
            CsvGrammar::NetworkList => parse_network_record(line).map(Classified::Network),
            CsvGrammar::ObserverScan => parse_observed_network(line).map(Classified::Observed),
        };
        if csv.is_some() {
            return csv;
        }
    }
    if let Some(header) = parse_sniffer_header(line) {
        return Some(Classified::SnifferHeader(header));
    }
    if let Some(mac) = parse_sniffer_client(line) {
        return Some(Classified::SnifferClient(mac));
    }
    if let Some(probe) = parse_probe_entry(line) {
        return Some(Classified::Probe(probe));
    }
    parse_host_entry(line).map(Classified::Host)
}

// ── Individual grammars ─────────────────────────────────────────────

/// The completion literal, anywhere in a line. Quoted CSV rows never
/// count, since an SSID may carry the same words.
pub fn parse_completion(line: &str) -> Option<Completion> {
    if line.trim_start().starts_with('"') {
        return None;
    }
    line.to_ascii_lowercase()
        .contains(&SCAN_COMPLETE_MARKER.to_ascii_lowercase())
        .then_some(Completion::ScanResults)
}

pub fn parse_network_record(line: &str) -> Option<NetworkRecord> {
    let [index, ssid, _, bssid, channel, security, rssi, band] = quoted_fields(line)?;
    Some(NetworkRecord {
        index: parse_index(index)?,
        ssid: parse_ssid(ssid)?,
        bssid: MacAddress::parse(bssid)?,
        channel: parse_channel(channel)?,
        security: security.to_owned(),
        rssi: rssi.trim().parse().ok()?,
        band: parse_band(band)?,
    })
}

pub fn parse_observed_network(line: &str) -> Option<ObservedNetwork> {
    let [index, ssid, _, bssid, _, security, rssi, band] = quoted_fields(line)?;
    Some(ObservedNetwork {
        index: parse_index(index)?,
        ssid: parse_ssid(ssid)?,
        bssid: MacAddress::parse(bssid)?,
        security: security.to_owned(),
        rssi: rssi.trim().parse().ok()?,
        band: parse_band(band)?,
    })
}

/// Accepts `Cafe, CH6: 2`, `"Cafe", CH6: 2` and `"Cafe, CH6: 2"`.
pub fn parse_sniffer_header(line: &str) -> Option<SnifferHeader> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let line = line.trim_end();
    let (left, right) = line.rsplit_once(", CH")?;
    let (channel, count) = right.trim_end_matches('"').split_once(':')?;

    let ssid = left.strip_prefix('"').unwrap_or(left);
    let ssid = ssid.strip_suffix('"').unwrap_or(ssid);

    Some(SnifferHeader {
        ssid: parse_ssid(ssid)?,
        channel: parse_channel(channel)?,
        client_count: digits(count.trim())?.parse().ok()?,
    })
}

pub fn parse_sniffer_client(line: &str) -> Option<MacAddress> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let mac = line.trim();
    // Cheap positional check first; most non-client lines fail here.
    let bytes = mac.as_bytes();
    if bytes.len() != MacAddress::TEXT_LEN || bytes.get(2) != Some(&b':') || bytes.get(5) != Some(&b':') {
        return None;
    }
    MacAddress::parse(mac)
}

pub fn parse_probe_entry(line: &str) -> Option<ProbeEntry> {
    let split = line.find(|c: char| !c.is_ascii_digit())?;
    let (index, rest) = line.split_at(split);
    if index.is_empty() || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let ssid = rest.trim();
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return None;
    }
    Some(ProbeEntry {
        index: index.parse().ok()?,
        ssid: ssid.to_owned(),
    })
}

pub fn parse_host_entry(line: &str) -> Option<HostEntry> {
    let (ip, mac) = line.split_once("->")?;
    let ip = ip.trim();
    let mac = mac.trim();
    if !is_dotted_quad(ip) || !is_mac_shaped(mac) {
        return None;
    }
    Some(HostEntry {
        ip: ip.parse().ok()?,
        mac: MacAddress::parse(mac)?,
    })
}

// ── Field helpers ───────────────────────────────────────────────────

/// Split `"a","b",...` into exactly eight unescaped fields.
fn quoted_fields(line: &str) -> Option<[&str; 8]> {
    let mut rest = line.trim();
    let mut fields = Vec::with_capacity(8);
    loop {
        rest = rest.strip_prefix('"')?;
        let (field, tail) = rest.split_once('"')?;
        fields.push(field);
        let tail = tail.trim_start();
        if tail.is_empty() {
            break;
        }
        rest = tail.strip_prefix(',')?.trim_start();
    }
    fields.try_into().ok()
}

fn digits(s: &str) -> Option<&str> {
    (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())).then_some(s)
}

fn parse_index(s: &str) -> Option<u32> {
    digits(s.trim())?.parse().ok().filter(|i| *i > 0)
}

fn parse_channel(s: &str) -> Option<u8> {
    digits(s.trim())?.parse().ok().filter(|c| *c > 0)
}

fn parse_ssid(s: &str) -> Option<String> {
    (s.len() <= MAX_SSID_LEN).then(|| s.to_owned())
}

fn parse_band(s: &str) -> Option<Band> {
    let s = s.trim();
    (!s.is_empty()).then(|| Band::from_tag(s))
}

fn is_dotted_quad(s: &str) -> bool {
    let mut octets = 0;
    for part in s.split('.') {
        octets += 1;
        if part.len() > 3 || digits(part).is_none() || part.parse::<u8>().is_err() {
            return false;
        }
    }
    octets == 4
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn mac(s: &str) -> MacAddress {
        MacAddress::parse(s).unwrap()
    }

    const LIST_LINE: &str = r#""3","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","-61","2.4GHz""#;
    const OBSERVED_LINE: &str = r#""3","Cafe","","AA:BB:CC:DD:EE:01","","WPA2","-61","2.4GHz""#;

    #[test]
    fn network_list_row() {
        let rec = parse_network_record(LIST_LINE).unwrap();
        assert_eq!(
            rec,
            NetworkRecord {
                index: 3,
                ssid: "Cafe".into(),
                bssid: mac("aa:bb:cc:dd:ee:01"),
                channel: 6,
                security: "WPA2".into(),
                rssi: -61,
                band: Band::Ghz2_4,
            }
        );
    }

    #[test]
    fn observer_row_ignores_placeholder_field() {
        let obs = parse_observed_network(OBSERVED_LINE).unwrap();
        assert_eq!(obs.index, 3);
        assert_eq!(obs.rssi, -61);
        // Same row through the list grammar has no channel and fails.
        assert!(parse_network_record(OBSERVED_LINE).is_none());
        // And a list row still parses as an observation.
        assert!(parse_observed_network(LIST_LINE).is_some());
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse_network_record(LIST_LINE), parse_network_record(LIST_LINE));
        assert_eq!(
            classify(LIST_LINE, CsvGrammar::NetworkList),
            classify(LIST_LINE, CsvGrammar::NetworkList)
        );
    }

    #[test]
    fn hidden_network_keeps_empty_ssid() {
        let line = r#""1","","","aa:bb:cc:dd:ee:02","11","OPEN","-80","5GHz""#;
        let rec = parse_network_record(line).unwrap();
        assert_eq!(rec.ssid, "");
        assert_eq!(rec.band, Band::Ghz5);
    }

    #[test]
    fn malformed_csv_is_unmatched() {
        for line in [
            r#""3","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","-61""#,
            r#""3","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","-61","2.4GHz","x""#,
            r#""0","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","-61","2.4GHz""#,
            r#""3","Cafe","","not-a-mac","6","WPA2","-61","2.4GHz""#,
            r#""3","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","loud","2.4GHz""#,
            r#""3","Cafe","","AA:BB:CC:DD:EE:01","6","WPA2","-61","""#,
            r#""3","Ca"fe","","AA:BB:CC:DD:EE:01","6","WPA2","-61","2.4GHz""#,
            r#""3","this ssid is far too long to be legal","","AA:BB:CC:DD:EE:01","6","WPA2","-61","2.4GHz""#,
        ] {
            assert!(parse_network_record(line).is_none(), "{line}");
        }
    }

    #[test]
    fn sniffer_header_shapes() {
        let expected = SnifferHeader {
            ssid: "Cafe".into(),
            channel: 6,
            client_count: 2,
        };
        assert_eq!(parse_sniffer_header("Cafe, CH6: 2").unwrap(), expected);
        assert_eq!(parse_sniffer_header("\"Cafe\", CH6: 2").unwrap(), expected);
        assert_eq!(parse_sniffer_header("\"Cafe, CH6: 2\"").unwrap(), expected);
    }

    #[test]
    fn sniffer_header_ssid_may_contain_commas() {
        let h = parse_sniffer_header("Bob, Alice, CH11: 0").unwrap();
        assert_eq!(h.ssid, "Bob, Alice");
        assert_eq!(h.channel, 11);
    }

    #[test]
    fn sniffer_header_rejects_indented_and_malformed() {
        assert!(parse_sniffer_header("  Cafe, CH6: 2").is_none());
        assert!(parse_sniffer_header("Cafe, CHx: 2").is_none());
        assert!(parse_sniffer_header("Cafe, CH6 2").is_none());
        assert!(parse_sniffer_header("Cafe CH6: 2").is_none());
    }

    #[test]
    fn sniffer_client_requires_indent() {
        assert_eq!(parse_sniffer_client("   AA:BB:CC:DD:EE:FF"), Some(mac("aa:bb:cc:dd:ee:ff")));
        assert_eq!(parse_sniffer_client("\taa:bb:cc:dd:ee:ff  "), Some(mac("aa:bb:cc:dd:ee:ff")));
        assert_eq!(parse_sniffer_client("aa:bb:cc:dd:ee:ff"), None);
        assert_eq!(parse_sniffer_client("  aa:bb:cc:dd:ee"), None);
    }

    #[test]
    fn probe_entries() {
        assert_eq!(
            parse_probe_entry("12  HomeNet  ").unwrap(),
            ProbeEntry {
                index: 12,
                ssid: "HomeNet".into()
            }
        );
        assert!(parse_probe_entry("12").is_none());
        assert!(parse_probe_entry("12   ").is_none());
        assert!(parse_probe_entry("12abc").is_none());
        assert!(parse_probe_entry("abc 12").is_none());
    }

    #[test]
    fn host_entries_validate_both_sides() {
        let host = parse_host_entry("192.168.4.2 -> AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(host.ip, Ipv4Addr::new(192, 168, 4, 2));
        assert_eq!(host.mac, mac("aa:bb:cc:dd:ee:ff"));

        assert!(parse_host_entry("192.168.4 -> aa:bb:cc:dd:ee:ff").is_none());
        assert!(parse_host_entry("192.168.4.256 -> aa:bb:cc:dd:ee:ff").is_none());
        assert!(parse_host_entry("192.168.4.2 -> aa:bb:cc").is_none());
        assert!(parse_host_entry("gateway -> aa:bb:cc:dd:ee:ff").is_none());
    }

    #[test]
    fn completion_marker_anywhere_in_line() {
        assert_eq!(parse_completion("> Scan results printed"), Some(Completion::ScanResults));
        assert_eq!(parse_completion("scan results printed."), Some(Completion::ScanResults));
        assert_eq!(parse_completion("Scanning..."), None);
    }

    #[test]
    fn ssid_naming_the_marker_is_still_a_row() {
        let line = r#""2","Scan results printed","","aa:bb:cc:00:00:02","","WPA2","-60","5GHz""#;
        assert_eq!(parse_completion(line), None);
        assert!(matches!(
            classify(line, CsvGrammar::ObserverScan),
            Some(Classified::Observed(ObservedNetwork { index: 2, .. }))
        ));
    }

    #[test]
    fn classify_order() {
        assert_eq!(
            classify("Scan results printed", CsvGrammar::NetworkList),
            Some(Classified::Completion(Completion::ScanResults))
        );
        assert!(matches!(
            classify(OBSERVED_LINE, CsvGrammar::ObserverScan),
            Some(Classified::Observed(_))
        ));
        assert!(matches!(
            classify("\"Cafe, CH6: 2\"", CsvGrammar::ObserverScan),
            Some(Classified::SnifferHeader(_))
        ));
        assert!(matches!(
            classify("  aa:bb:cc:dd:ee:ff", CsvGrammar::ObserverScan),
            Some(Classified::SnifferClient(_))
        ));
        assert!(matches!(classify("1 Cafe", CsvGrammar::ObserverScan), Some(Classified::Probe(_))));
        assert!(matches!(
            classify("10.0.0.9 -> aa:bb:cc:dd:ee:ff", CsvGrammar::ObserverScan),
            Some(Classified::Host(_))
        ));
        assert_eq!(classify("Starting sniffer...", CsvGrammar::ObserverScan), None);
    }

    #[test]
    fn grammar_names() {
        assert_eq!(CsvGrammar::ObserverScan.to_string(), "observer-scan");
        assert_eq!("network-list".parse::<CsvGrammar>().unwrap(), CsvGrammar::NetworkList);
    }
}
