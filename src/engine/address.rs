//! Destination address classification.
//!
//! Maps a Bitcoin address to its script type by prefix and from there to
//! the network label the exchange expects. Classification is total: any
//! string, valid or not, yields a non-empty label. Address validation is
//! left to the exchange, which rejects bad addresses at withdrawal time.

use std::fmt;

/// Binance network label for Bitcoin mainnet. Every mainnet script type
/// withdraws over this network.
pub const BTC_NETWORK: &str = "BTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Legacy pay-to-pubkey-hash, `1...`.
    P2pkh,
    /// Pay-to-script-hash, `3...`.
    P2sh,
    /// Native segwit v0, `bc1q...`.
    Segwit,
    /// Taproot (segwit v1), `bc1p...`.
    Taproot,
    Unknown,
}

impl AddressKind {
    pub fn network_label(self) -> &'static str {
        match self {
            AddressKind::P2pkh
            | AddressKind::P2sh
            | AddressKind::Segwit
            | AddressKind::Taproot
            | AddressKind::Unknown => BTC_NETWORK,
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressKind::P2pkh => "p2pkh",
            AddressKind::P2sh => "p2sh",
            AddressKind::Segwit => "segwit",
            AddressKind::Taproot => "taproot",
            AddressKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classify an address by prefix. Bech32 is case-insensitive.
pub fn classify_address(address: &str) -> AddressKind {
    let address = address.trim();
    let lower = address.to_ascii_lowercase();

    if lower.starts_with("bc1p") {
        AddressKind::Taproot
    } else if lower.starts_with("bc1") {
        AddressKind::Segwit
    } else if address.starts_with('3') {
        AddressKind::P2sh
    } else if address.starts_with('1') {
        AddressKind::P2pkh
    } else {
        AddressKind::Unknown
    }
}

/// Network label for a withdrawal to `address`. A non-blank `override_label`
/// takes precedence over the derived one.
pub fn resolve_network(address: &str, override_label: Option<&str>) -> String {
    match override_label.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => classify_address(address).network_label().to_string(),
    }
}
