//! Pricing tables consumed at settlement time
//!
//! These are produced externally (store configuration) and passed in as a
//! snapshot; the ledger never mutates them.

use crate::Amount;
use serde::{Deserialize, Serialize};

/// A priced in-store buy-in option: a chip amount sold at a charge amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyInOption {
    pub chip_amount: Amount,
    pub charge_amount: Amount,
}

/// Pricing snapshot used by settlement aggregation and tax computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fixed web chip -> currency conversion constant
    pub chip_conversion_rate: i64,
    /// Consumption tax rate in basis points (1000 = 10%)
    pub tax_rate_bps: u32,
    /// Priced in-store buy-in options, matched by exact chip amount
    pub buy_in_options: Vec<BuyInOption>,
    /// Flat fee applied once per visit if any in-store withdraw occurred
    pub chip_withdraw_fee: Amount,
}

impl PricingConfig {
    /// Look up the charge for an in-store buy-in by exact chip amount
    pub fn buy_in_charge(&self, chip_amount: Amount) -> Option<Amount> {
        self.buy_in_options
            .iter()
            .find(|o| o.chip_amount == chip_amount)
            .map(|o| o.charge_amount)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            chip_conversion_rate: 1,
            tax_rate_bps: 1000,
            buy_in_options: Vec::new(),
            chip_withdraw_fee: Amount::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_in_charge_exact_match() {
        let pricing = PricingConfig {
            buy_in_options: vec![
                BuyInOption {
                    chip_amount: Amount::new(10_000),
                    charge_amount: Amount::new(1_000),
                },
                BuyInOption {
                    chip_amount: Amount::new(30_000),
                    charge_amount: Amount::new(2_500),
                },
            ],
            ..Default::default()
        };

        assert_eq!(
            pricing.buy_in_charge(Amount::new(30_000)),
            Some(Amount::new(2_500))
        );
        assert_eq!(pricing.buy_in_charge(Amount::new(20_000)), None);
    }
}
