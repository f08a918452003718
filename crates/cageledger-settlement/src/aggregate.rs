//! Settlement aggregation
//!
//! Derives a visit's income and expense totals purely from its event
//! snapshot and the pricing tables. No mutation, deterministic, safe to call
//! repeatedly as a preview before commit.

use serde::{Deserialize, Serialize};
use tracing::warn;

use cageledger_types::{Amount, ChipEventKind, PricingConfig, Result, Visit};

/// Tournament totals across all of the visit's tournament entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentTotals {
    /// Sum of charge amounts across all chip events
    pub charge_total: Amount,
    /// Rank prizes plus bounty credits
    pub prize_total: Amount,
}

/// Web-coin ring-game totals, converted into currency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebRingTotals {
    pub total_buy_in: Amount,
    pub total_cash_out: Amount,
}

/// In-store ring-game fee totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InStoreTotals {
    /// Charges of priced buy-in options, matched by exact chip amount
    pub total_buy_in_fee: Amount,
    /// Flat fee, applied once if any withdraw event occurred
    pub withdraw_fee: Amount,
}

/// The full projection consumed by tax and net computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDetails {
    pub tournament: TournamentTotals,
    pub web_ring: WebRingTotals,
    pub in_store: InStoreTotals,
}

/// Project a visit's activity into settlement totals
pub fn compute_settlement_details(visit: &Visit, pricing: &PricingConfig) -> Result<SettlementDetails> {
    Ok(SettlementDetails {
        tournament: tournament_totals(visit)?,
        web_ring: web_ring_totals(visit, pricing)?,
        in_store: in_store_totals(visit, pricing)?,
    })
}

fn tournament_totals(visit: &Visit) -> Result<TournamentTotals> {
    let mut charge_total = Amount::ZERO;
    let mut prize_total = Amount::ZERO;

    for entry in &visit.tournament_entries {
        for event in &entry.events {
            charge_total = charge_total.checked_add(event.charge_amount)?;
        }

        prize_total = prize_total.checked_add(entry.rank_prize())?;

        if let Some(pool) = &entry.bounty_pool {
            if pool.ticket_count == 0 {
                warn!(tournament = %entry.tournament, "bounty pool with zero tickets; no bounty credited");
            } else {
                let bounty = pool.per_kill().checked_mul(entry.kills as i64)?;
                prize_total = prize_total.checked_add(bounty)?;
            }
        }
    }

    Ok(TournamentTotals {
        charge_total,
        prize_total,
    })
}

fn web_ring_totals(visit: &Visit, pricing: &PricingConfig) -> Result<WebRingTotals> {
    let mut total_buy_in = Amount::ZERO;
    let mut total_cash_out = Amount::ZERO;

    for entry in &visit.web_ring_entries {
        for event in &entry.events {
            let converted = event.chip_amount.checked_mul(pricing.chip_conversion_rate)?;
            match event.kind {
                ChipEventKind::BuyIn => total_buy_in = total_buy_in.checked_add(converted)?,
                ChipEventKind::CashOut => total_cash_out = total_cash_out.checked_add(converted)?,
                ChipEventKind::Withdraw => {}
            }
        }
    }

    Ok(WebRingTotals {
        total_buy_in,
        total_cash_out,
    })
}

fn in_store_totals(visit: &Visit, pricing: &PricingConfig) -> Result<InStoreTotals> {
    let mut total_buy_in_fee = Amount::ZERO;
    let mut saw_withdraw = false;

    if let Some(entry) = &visit.in_store_entry {
        for event in &entry.events {
            match event.kind {
                ChipEventKind::BuyIn => match pricing.buy_in_charge(event.chip_amount) {
                    Some(charge) => {
                        total_buy_in_fee = total_buy_in_fee.checked_add(charge)?;
                    }
                    None => {
                        // Unmatched amounts contribute zero by decision; the
                        // warn keeps them visible for reconciliation.
                        warn!(
                            visit = %visit.id,
                            chip_amount = %event.chip_amount,
                            "in-store buy-in has no priced option; contributing zero fee"
                        );
                    }
                },
                ChipEventKind::Withdraw => saw_withdraw = true,
                ChipEventKind::CashOut => {}
            }
        }
    }

    Ok(InStoreTotals {
        total_buy_in_fee,
        withdraw_fee: if saw_withdraw {
            pricing.chip_withdraw_fee
        } else {
            Amount::ZERO
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cageledger_types::{
        BountyPool, BuyInOption, ChipEvent, PlayerId, PrizeTier, RingEntry, TournamentEntry,
        TournamentId,
    };

    fn tournament_entry(events: Vec<ChipEvent>) -> TournamentEntry {
        TournamentEntry {
            tournament: TournamentId::new(),
            events,
            final_rank: None,
            kills: 0,
            prize_table: vec![],
            bounty_pool: None,
        }
    }

    #[test]
    fn test_tournament_charges_and_prizes() {
        let mut visit = Visit::empty(PlayerId::new());
        visit.tournament_entries = vec![
            TournamentEntry {
                final_rank: Some(1),
                kills: 3,
                prize_table: vec![PrizeTier { rank: 1, amount: Amount::new(30_000) }],
                bounty_pool: Some(BountyPool {
                    total_amount: Amount::new(10_000),
                    ticket_count: 10,
                }),
                ..tournament_entry(vec![ChipEvent::new(
                    ChipEventKind::BuyIn,
                    Amount::new(10_000),
                    Amount::new(3_000),
                )])
            },
            tournament_entry(vec![ChipEvent::new(
                ChipEventKind::BuyIn,
                Amount::new(10_000),
                Amount::new(2_000),
            )]),
        ];

        let details = compute_settlement_details(&visit, &PricingConfig::default()).unwrap();
        assert_eq!(details.tournament.charge_total, Amount::new(5_000));
        // 30000 rank prize + 3 kills * (10000 / 10)
        assert_eq!(details.tournament.prize_total, Amount::new(33_000));
    }

    #[test]
    fn test_no_bounty_without_pool() {
        let mut visit = Visit::empty(PlayerId::new());
        visit.tournament_entries = vec![TournamentEntry {
            kills: 5,
            ..tournament_entry(vec![])
        }];

        let details = compute_settlement_details(&visit, &PricingConfig::default()).unwrap();
        assert_eq!(details.tournament.prize_total, Amount::ZERO);
    }

    #[test]
    fn test_web_ring_conversion() {
        let mut visit = Visit::empty(PlayerId::new());
        visit.web_ring_entries = vec![RingEntry {
            events: vec![
                ChipEvent::new(ChipEventKind::BuyIn, Amount::new(5_000), Amount::ZERO),
                ChipEvent::new(ChipEventKind::CashOut, Amount::new(7_500), Amount::ZERO),
            ],
        }];

        let pricing = PricingConfig {
            chip_conversion_rate: 100,
            ..Default::default()
        };
        let details = compute_settlement_details(&visit, &pricing).unwrap();
        assert_eq!(details.web_ring.total_buy_in, Amount::new(500_000));
        assert_eq!(details.web_ring.total_cash_out, Amount::new(750_000));
    }

    #[test]
    fn test_in_store_fee_matching() {
        let mut visit = Visit::empty(PlayerId::new());
        visit.in_store_entry = Some(RingEntry {
            events: vec![
                ChipEvent::new(ChipEventKind::BuyIn, Amount::new(10_000), Amount::ZERO),
                // No priced option for this amount: contributes zero.
                ChipEvent::new(ChipEventKind::BuyIn, Amount::new(12_345), Amount::ZERO),
                ChipEvent::new(ChipEventKind::Withdraw, Amount::new(4_000), Amount::ZERO),
            ],
        });

        let pricing = PricingConfig {
            buy_in_options: vec![BuyInOption {
                chip_amount: Amount::new(10_000),
                charge_amount: Amount::new(1_000),
            }],
            chip_withdraw_fee: Amount::new(300),
            ..Default::default()
        };
        let details = compute_settlement_details(&visit, &pricing).unwrap();
        assert_eq!(details.in_store.total_buy_in_fee, Amount::new(1_000));
        assert_eq!(details.in_store.withdraw_fee, Amount::new(300));
    }

    #[test]
    fn test_withdraw_fee_absent_without_withdraw() {
        let mut visit = Visit::empty(PlayerId::new());
        visit.in_store_entry = Some(RingEntry {
            events: vec![ChipEvent::new(
                ChipEventKind::BuyIn,
                Amount::new(10_000),
                Amount::ZERO,
            )],
        });

        let pricing = PricingConfig {
            chip_withdraw_fee: Amount::new(300),
            ..Default::default()
        };
        let details = compute_settlement_details(&visit, &pricing).unwrap();
        assert_eq!(details.in_store.withdraw_fee, Amount::ZERO);
    }

    #[test]
    fn test_empty_visit_is_all_zero() {
        let visit = Visit::empty(PlayerId::new());
        let details = compute_settlement_details(&visit, &PricingConfig::default()).unwrap();
        assert_eq!(details, SettlementDetails::default());
    }
}
