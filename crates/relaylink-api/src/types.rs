// ── Wire-level value types ──
//
// MacAddress and Band appear in several response grammars. Both are
// validated on construction so parsers never hand out half-filled data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address in canonical lowercase colon-hex form (`aa:bb:cc:dd:ee:ff`).
///
/// Unlike a free-form string, a `MacAddress` can only be built from text
/// that has exactly the `XX:XX:XX:XX:XX:XX` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Length of the textual form.
    pub const TEXT_LEN: usize = 17;

    /// Validate and normalize. Returns `None` for anything that is not
    /// six colon-separated hex octets.
    pub fn parse(raw: &str) -> Option<Self> {
        if !is_mac_shaped(raw) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Positional shape check: colons at offsets 2, 5, 8, 11, 14 and hex
/// digits everywhere else. No allocation.
pub fn is_mac_shaped(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    if bytes.len() != MacAddress::TEXT_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| {
        if i % 3 == 2 {
            *b == b':'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidMac(s.to_owned()))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMac;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// Rejected MAC address text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a MAC address: {0:?}")]
pub struct InvalidMac(pub String);

// ── Band ────────────────────────────────────────────────────────────

/// Radio band tag as printed by the remote module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Ghz2_4,
    Ghz5,
    Ghz6,
    /// Unrecognized tag, preserved verbatim.
    Other(String),
}

impl Band {
    pub fn from_tag(tag: &str) -> Self {
        let t = tag.trim();
        let lower = t.to_ascii_lowercase();
        let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "2.4" | "2.4g" | "2.4ghz" | "2g" | "2ghz" => Self::Ghz2_4,
            "5" | "5g" | "5ghz" => Self::Ghz5,
            "6" | "6g" | "6ghz" => Self::Ghz6,
            _ => Self::Other(t.to_owned()),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghz2_4 => f.write_str("2.4GHz"),
            Self::Ghz5 => f.write_str("5GHz"),
            Self::Ghz6 => f.write_str("6GHz"),
            Self::Other(s) => f.write_str(s),
        }
    }
}
