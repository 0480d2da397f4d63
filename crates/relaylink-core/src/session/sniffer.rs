// ── Sniffer result correlation ──
//
// `show_sniffer_results` prints blocks of one header line followed by
// indented station MACs. Headers name networks by SSID only, so each
// header is matched back to a scanned entity and the following stations
// are merged into that entity's client set.

use relaylink_api::Classified;
use tracing::debug;

use crate::model::EntityKey;
use crate::store::EntityTable;

/// Folds one sniffer dump into the entity table.
pub(crate) struct SnifferAccumulator<'a> {
    table: &'a mut EntityTable,
    current: Option<EntityKey>,
    pub(crate) headers: usize,
    pub(crate) clients_added: usize,
    /// Station lines that had no entity to belong to.
    pub(crate) misses: u64,
}

impl<'a> SnifferAccumulator<'a> {
    pub(crate) fn new(table: &'a mut EntityTable) -> Self {
        Self {
            table,
            current: None,
            headers: 0,
            clients_added: 0,
            misses: 0,
        }
    }

    /// Exchange callback. Returns whether the item was used.
    pub(crate) fn accept(&mut self, item: Classified) -> bool {
        match item {
            Classified::SnifferHeader(header) => {
                self.headers += 1;
                self.current = self.table.find_for_header(&header.ssid, header.channel);
                match self.current {
                    Some(key) => self.table.note_channel(key, header.channel),
                    None => debug!(ssid = %header.ssid, channel = header.channel, "sniffer header matches no scanned network"),
                }
                self.current.is_some()
            }
            Classified::SnifferClient(mac) => {
                let Some(key) = self.current else {
                    self.misses += 1;
                    return false;
                };
                if self.table.add_client(key, mac) {
                    self.clients_added += 1;
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use indexmap::IndexSet;
    use pretty_assertions::assert_eq;
    use relaylink_api::parse::{CsvGrammar, classify};
    use relaylink_api::{Band, MacAddress};

    use super::*;
    use crate::model::NetworkEntity;

    fn table_with(networks: &[(u32, &str)]) -> EntityTable {
        let mut table = EntityTable::new();
        for (index, ssid) in networks {
            table.upsert_silent(NetworkEntity {
                key: EntityKey(*index),
                ssid: (*ssid).into(),
                bssid: MacAddress::parse(&format!("aa:bb:cc:00:00:{index:02x}")).unwrap(),
                channel: None,
                security: "WPA2".into(),
                rssi: -40,
                band: Band::Ghz2_4,
                clients: IndexSet::new(),
                discovered_at: Utc::now(),
            });
        }
        table.flush();
        table
    }

    fn feed(table: &mut EntityTable, lines: &[&str]) -> (usize, u64) {
        let mut acc = SnifferAccumulator::new(table);
        for line in lines {
            if let Some(item) = classify(line, CsvGrammar::ObserverScan) {
                acc.accept(item);
            }
        }
        (acc.clients_added, acc.misses)
    }

    fn clients(table: &EntityTable, index: u32) -> Vec<String> {
        table
            .get(EntityKey(index))
            .unwrap()
            .clients
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn header_then_clients_land_on_entity() {
        let mut table = table_with(&[(1, "Cafe")]);
        let (added, misses) = feed(&mut table, &["Cafe, CH6: 0", "  AA:00:00:00:00:01", "  aa:00:00:00:00:02"]);

        assert_eq!(added, 2);
        assert_eq!(misses, 0);
        assert_eq!(clients(&table, 1), vec!["aa:00:00:00:00:01", "aa:00:00:00:00:02"]);
        assert_eq!(table.get(EntityKey(1)).unwrap().channel, Some(6));
    }

    #[test]
    fn unknown_header_drops_following_clients() {
        let mut table = table_with(&[(1, "Cafe")]);
        let (added, misses) = feed(
            &mut table,
            &["Stranger, CH1: 1", "  aa:00:00:00:00:09", "Cafe, CH6: 1", "  aa:00:00:00:00:01"],
        );

        assert_eq!(added, 1);
        assert_eq!(misses, 1);
        assert_eq!(clients(&table, 1), vec!["aa:00:00:00:00:01"]);
    }

    #[test]
    fn clients_before_any_header_are_misses() {
        let mut table = table_with(&[(1, "Cafe")]);
        let (added, misses) = feed(&mut table, &["  aa:00:00:00:00:01"]);
        assert_eq!((added, misses), (0, 1));
    }

    #[test]
    fn repeated_dumps_are_idempotent() {
        let mut table = table_with(&[(1, "Cafe")]);
        let dump = ["Cafe, CH6: 1", "  aa:00:00:00:00:01"];
        feed(&mut table, &dump);
        let (added, _) = feed(&mut table, &dump);
        assert_eq!(added, 0);
        assert_eq!(clients(&table, 1).len(), 1);
    }
}
