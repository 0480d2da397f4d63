// ── Protocol record → domain conversions ──
//
// Scan rows become entity-table entries. Client sets always start empty;
// only the sniffer fills them.

use chrono::Utc;
use indexmap::IndexSet;
use relaylink_api::{NetworkRecord, ObservedNetwork};

use crate::model::{EntityKey, NetworkEntity};

impl From<ObservedNetwork> for NetworkEntity {
    fn from(o: ObservedNetwork) -> Self {
        Self {
            key: EntityKey(o.index),
            ssid: o.ssid,
            bssid: o.bssid,
            channel: None,
            security: o.security,
            rssi: o.rssi,
            band: o.band,
            clients: IndexSet::new(),
            discovered_at: Utc::now(),
        }
    }
}

impl From<NetworkRecord> for NetworkEntity {
    fn from(r: NetworkRecord) -> Self {
        Self {
            key: EntityKey(r.index),
            ssid: r.ssid,
            bssid: r.bssid,
            channel: Some(r.channel),
            security: r.security,
            rssi: r.rssi,
            band: r.band,
            clients: IndexSet::new(),
            discovered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use relaylink_api::parse::{parse_network_record, parse_observed_network};

    use super::*;

    #[test]
    fn observed_row_has_no_channel() {
        let obs = parse_observed_network(r#""4","Cafe","","aa:bb:cc:dd:ee:04","","WPA2","-48","2.4GHz""#).unwrap();
        let entity = NetworkEntity::from(obs);
        assert_eq!(entity.key, EntityKey(4));
        assert_eq!(entity.channel, None);
        assert!(entity.clients.is_empty());
    }

    #[test]
    fn list_row_keeps_channel_and_index() {
        let rec = parse_network_record(r#""9","","","aa:bb:cc:dd:ee:09","149","OPEN","-70","5GHz""#).unwrap();
        let entity = NetworkEntity::from(rec);
        assert_eq!(entity.display_index(), 9);
        assert_eq!(entity.channel, Some(149));
        assert!(entity.is_hidden());
    }
}
