//! Currency types for Cageledger
//!
//! The store runs two independent stored-value currencies. They never convert
//! into each other; each (player, currency) pair has its own lot ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored-value currency tracked by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Online balance, convertible to cash at settlement
    WebCoin,
    /// Physical chip balance held at the store
    InStoreChip,
}

impl Currency {
    /// Stable code used for persistence
    pub fn code(&self) -> &'static str {
        match self {
            Self::WebCoin => "WEB_COIN",
            Self::InStoreChip => "IN_STORE_CHIP",
        }
    }

    /// Parse a persisted currency code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "WEB_COIN" => Some(Self::WebCoin),
            "IN_STORE_CHIP" => Some(Self::InStoreChip),
            _ => None,
        }
    }

    /// All currencies, in a stable order
    pub fn all() -> [Currency; 2] {
        [Self::WebCoin, Self::InStoreChip]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for currency in Currency::all() {
            assert_eq!(Currency::from_code(currency.code()), Some(currency));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(Currency::from_code("GOLD"), None);
    }
}
