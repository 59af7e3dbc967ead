//! Unique identifier types for venue entities
//!
//! Orders, trades, and clients use UUID v7 so identifiers sort by creation
//! time, which keeps chronological scans cheap. Instruments are validated
//! `BASE/QUOTE` symbol strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an order.
///
/// Client-assigned ids are accepted on submission; server-assigned ids use
/// UUID v7 so that id order follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Create a new OrderId with the current timestamp.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID (client-assigned ids).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a client account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument identifier (trading pair).
///
/// Format: "BASE/QUOTE" (e.g., "BTC/USD", "ETH/USDC")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Create a new InstrumentId from a string.
    ///
    /// # Panics
    /// Panics if the format is invalid (must contain '/')
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(s.contains('/'), "InstrumentId must be in BASE/QUOTE format");
        Self(s)
    }

    /// Try to create an InstrumentId, returning None if invalid.
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.contains('/') {
            Some(Self(s))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets.
    pub fn split(&self) -> (&str, &str) {
        let mut parts = self.0.splitn(2, '/');
        (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_uniqueness() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_order_id_serialization() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_trade_id_uniqueness() {
        assert_ne!(TradeId::new(), TradeId::new());
    }

    #[test]
    fn test_client_id_uniqueness() {
        assert_ne!(ClientId::new(), ClientId::new());
    }

    #[test]
    fn test_instrument_id_creation() {
        let instrument = InstrumentId::new("BTC/USD");
        assert_eq!(instrument.as_str(), "BTC/USD");

        let (base, quote) = instrument.split();
        assert_eq!(base, "BTC");
        assert_eq!(quote, "USD");
    }

    #[test]
    fn test_instrument_id_try_new() {
        assert!(InstrumentId::try_new("BTC/USD").is_some());
        assert!(InstrumentId::try_new("INVALID").is_none());
    }

    #[test]
    #[should_panic(expected = "InstrumentId must be in BASE/QUOTE format")]
    fn test_instrument_id_invalid_format() {
        InstrumentId::new("INVALID");
    }

    #[test]
    fn test_instrument_id_serialization() {
        let instrument = InstrumentId::new("ETH/USDC");
        let json = serde_json::to_string(&instrument).unwrap();
        assert_eq!(json, "\"ETH/USDC\"");

        let deserialized: InstrumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(instrument, deserialized);
    }
}
