//! Domain primitives: Address, MarketIdx, Market, PositionType.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of hex digits in a canonical address.
const ADDRESS_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address is empty")]
    Empty,
    #[error("address has more than 64 hex digits")]
    TooLong,
    #[error("address contains non-hex characters")]
    InvalidHex,
}

/// Account or contract address in canonical form: `0x` followed by 64 lowercase hex digits.
///
/// Shorter inputs are left-padded with zeros, so the same field element always
/// compares equal regardless of how the collaborator rendered it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(AddressParseError::Empty);
        }
        if digits.len() > ADDRESS_HEX_LEN {
            return Err(AddressParseError::TooLong);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError::InvalidHex);
        }
        Ok(Address(format!(
            "0x{:0>width$}",
            digits.to_ascii_lowercase(),
            width = ADDRESS_HEX_LEN
        )))
    }

    /// Address of a field element given as an integer.
    pub fn from_field(value: u128) -> Self {
        Address(format!("0x{:0>width$x}", value, width = ADDRESS_HEX_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Market index as the vault contract numbers markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketIdx(pub u32);

impl fmt::Display for MarketIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Markets the terminal can trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Btc,
    Eth,
    Bnb,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Btc, Market::Eth, Market::Bnb];

    pub fn from_idx(idx: MarketIdx) -> Option<Self> {
        match idx.0 {
            1 => Some(Market::Btc),
            2 => Some(Market::Eth),
            3 => Some(Market::Bnb),
            _ => None,
        }
    }

    pub fn idx(&self) -> MarketIdx {
        match self {
            Market::Btc => MarketIdx(1),
            Market::Eth => MarketIdx(2),
            Market::Bnb => MarketIdx(3),
        }
    }

    pub fn ticker(&self) -> &'static str {
        match self {
            Market::Btc => "BTC",
            Market::Eth => "ETH",
            Market::Bnb => "BNB",
        }
    }

    /// Symbol understood by the spot price feed.
    pub fn feed_symbol(&self) -> &'static str {
        match self {
            Market::Btc => "BTCUSDT",
            Market::Eth => "ETHUSDT",
            Market::Bnb => "BNBUSDT",
        }
    }

    /// Symbol used by the charting widget.
    pub fn chart_symbol(&self) -> &'static str {
        match self {
            Market::Btc => "BITSTAMP:BTCUSD",
            Market::Eth => "BITFINEX:ETHUSD",
            Market::Bnb => "CRYPTOCAP:BNB",
        }
    }
}

/// Position direction. Encoded on chain as 0 (long) / 1 (short).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    #[default]
    Long,
    Short,
}

impl PositionType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PositionType::Long),
            1 => Some(PositionType::Short),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            PositionType::Long => 0,
            PositionType::Short => 1,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, PositionType::Long)
    }
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionType::Long => write!(f, "Long"),
            PositionType::Short => write!(f, "Short"),
        }
    }
}
