//! Atomic settlement commit
//!
//! `settle` is the only write path of this crate. Everything it does - the
//! already-settled check, the optional web-coin withdrawal, the settlement
//! row with its line items, and the re-deposits - happens in one transaction;
//! the UNIQUE constraint on visit_id closes the remaining double-settle race
//! at insert time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use cageledger_db::{
    Database, DbError, DbSettlement, DbSettlementLineItem, SettlementRepo,
};
use cageledger_ledger::LotLedger;
use cageledger_types::{
    Amount, Currency, LedgerError, PlayerId, PricingConfig, Result, SettlementId, Visit, VisitId,
    WithdrawalId,
};

use crate::aggregate::{compute_settlement_details, SettlementDetails};
use crate::tax::{calc_consumption_tax, calc_final_net_amount};

/// Category of one settlement line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementCategory {
    TournamentCharge,
    TournamentPrize,
    WebRingBuyIn,
    WebRingCashOut,
    InStoreBuyInFee,
    InStoreWithdrawFee,
    ConsumptionTax,
}

impl SettlementCategory {
    /// Stable storage code
    pub fn code(&self) -> &'static str {
        match self {
            Self::TournamentCharge => "TOURNAMENT_CHARGE",
            Self::TournamentPrize => "TOURNAMENT_PRIZE",
            Self::WebRingBuyIn => "WEB_RING_BUY_IN",
            Self::WebRingCashOut => "WEB_RING_CASH_OUT",
            Self::InStoreBuyInFee => "IN_STORE_BUY_IN_FEE",
            Self::InStoreWithdrawFee => "IN_STORE_WITHDRAW_FEE",
            Self::ConsumptionTax => "CONSUMPTION_TAX",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.code() == code)
    }

    /// Every category, in the order line items are written
    pub fn all() -> &'static [SettlementCategory] {
        &[
            Self::TournamentCharge,
            Self::TournamentPrize,
            Self::WebRingBuyIn,
            Self::WebRingCashOut,
            Self::InStoreBuyInFee,
            Self::InStoreWithdrawFee,
            Self::ConsumptionTax,
        ]
    }
}

/// A committed settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub visit: VisitId,
    pub player: PlayerId,
    /// Final amount; positive pays the player, negative pays the house
    pub net_amount: Amount,
    pub consumption_tax: Amount,
    /// The web-coin withdrawal executed as part of this settlement, if any
    pub withdrawal: Option<WithdrawalId>,
    pub created_at: DateTime<Utc>,
}

/// One categorized figure of a settlement, recorded even when zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLineItem {
    pub settlement: SettlementId,
    pub category: SettlementCategory,
    pub amount: Amount,
}

/// Pre-commit view of what a settlement would record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPreview {
    pub details: SettlementDetails,
    pub consumption_tax: Amount,
    pub net_amount: Amount,
}

fn storage_err(e: DbError) -> LedgerError {
    LedgerError::storage(e.to_string())
}

fn settlement_from_db(row: DbSettlement) -> Settlement {
    Settlement {
        id: SettlementId::from_uuid(row.id),
        visit: VisitId::from_uuid(row.visit_id),
        player: PlayerId::from_uuid(row.player_id),
        net_amount: Amount::new(row.net_amount),
        consumption_tax: Amount::new(row.consumption_tax),
        withdrawal: row.withdrawal_id.map(WithdrawalId::from_uuid),
        created_at: row.created_at,
    }
}

fn line_item_from_db(row: DbSettlementLineItem) -> Result<SettlementLineItem> {
    let category = SettlementCategory::from_code(&row.category)
        .ok_or_else(|| LedgerError::storage(format!("unknown line item category {}", row.category)))?;
    Ok(SettlementLineItem {
        settlement: SettlementId::from_uuid(row.settlement_id),
        category,
        amount: Amount::new(row.amount),
    })
}

/// The settlement service
///
/// Holds the pricing tables alongside the database handle; cloneable and
/// safe to share.
#[derive(Clone)]
pub struct SettlementEngine {
    db: Database,
    pricing: PricingConfig,
}

impl SettlementEngine {
    pub fn new(db: Database, pricing: PricingConfig) -> Self {
        Self { db, pricing }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Compute what settling would record, without touching the database.
    ///
    /// Previews the figures only; balance and settled-once checks happen at
    /// commit, so a clean preview does not guarantee `settle` will succeed.
    pub fn preview(&self, visit: &Visit, web_coin_withdraw: Amount) -> Result<SettlementPreview> {
        if web_coin_withdraw.is_negative() {
            return Err(LedgerError::validation(
                "web_coin_withdraw",
                "withdrawal amount must not be negative",
            ));
        }
        let details = compute_settlement_details(visit, &self.pricing)?;
        let consumption_tax =
            calc_consumption_tax(&details, web_coin_withdraw, self.pricing.tax_rate_bps)?;
        let net_amount = calc_final_net_amount(&details, web_coin_withdraw, consumption_tax)?;
        Ok(SettlementPreview {
            details,
            consumption_tax,
            net_amount,
        })
    }

    /// Settle a visit: withdraw, record, and re-deposit atomically.
    ///
    /// `web_coin_withdraw` is taken from the player's web-coin savings as part
    /// of the checkout. With `deposit_net_to_savings`, a positive net is
    /// banked back as a new web-coin lot instead of being paid out. Chips
    /// accrued during the visit are always banked to the in-store ledger.
    ///
    /// Fails with AlreadySettled if the visit has a settlement, leaving the
    /// first one untouched. Any failure rolls the whole transaction back.
    pub async fn settle(
        &self,
        visit: &Visit,
        deposit_net_to_savings: bool,
        web_coin_withdraw: Amount,
    ) -> Result<Settlement> {
        let preview = self.preview(visit, web_coin_withdraw)?;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| LedgerError::storage(e.to_string()))?;

        match self
            .settle_in(&mut tx, visit, deposit_net_to_savings, web_coin_withdraw, &preview)
            .await
        {
            Ok(settlement) => {
                tx.commit()
                    .await
                    .map_err(|e| LedgerError::storage(e.to_string()))?;
                info!(
                    visit = %visit.id,
                    player = %visit.player,
                    settlement = %settlement.id,
                    net = %settlement.net_amount,
                    tax = %settlement.consumption_tax,
                    "visit settled"
                );
                Ok(settlement)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                warn!(
                    visit = %visit.id,
                    player = %visit.player,
                    error = %e,
                    "settlement rolled back"
                );
                Err(e)
            }
        }
    }

    async fn settle_in(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        visit: &Visit,
        deposit_net_to_savings: bool,
        web_coin_withdraw: Amount,
        preview: &SettlementPreview,
    ) -> Result<Settlement> {
        if SettlementRepo::find_by_visit_in(tx, visit.id.0)
            .await
            .map_err(storage_err)?
            .is_some()
        {
            return Err(LedgerError::AlreadySettled {
                visit: visit.id.to_string(),
            });
        }

        let withdrawal = if web_coin_withdraw.is_positive() {
            let record = LotLedger::withdraw_in(
                tx,
                visit.player,
                Currency::WebCoin,
                web_coin_withdraw,
                Some(visit.id.0),
            )
            .await?;
            Some(record.id)
        } else {
            None
        };

        let row = match SettlementRepo::insert(
            tx,
            Uuid::new_v4(),
            visit.id.0,
            visit.player.0,
            preview.net_amount.value(),
            preview.consumption_tax.value(),
            withdrawal.map(|w| w.0),
            Utc::now(),
        )
        .await
        {
            Ok(row) => row,
            Err(DbError::Duplicate(_)) => {
                return Err(LedgerError::AlreadySettled {
                    visit: visit.id.to_string(),
                })
            }
            Err(e) => return Err(storage_err(e)),
        };

        for (category, amount) in line_item_figures(preview) {
            SettlementRepo::insert_line_item(tx, row.id, category.code(), amount.value())
                .await
                .map_err(storage_err)?;
        }

        if deposit_net_to_savings && preview.net_amount.is_positive() {
            LotLedger::deposit_in(
                tx,
                visit.player,
                Currency::WebCoin,
                preview.net_amount,
                Some(visit.id),
            )
            .await?;
        }

        if visit.accrued_chip_deposit.is_positive() {
            LotLedger::deposit_in(
                tx,
                visit.player,
                Currency::InStoreChip,
                visit.accrued_chip_deposit,
                Some(visit.id),
            )
            .await?;
        }

        Ok(settlement_from_db(row))
    }

    /// The settlement of a visit, if one exists
    pub async fn settlement_for_visit(&self, visit: VisitId) -> Result<Option<Settlement>> {
        let row = self
            .db
            .settlement_repo()
            .find_by_visit(visit.0)
            .await
            .map_err(storage_err)?;
        Ok(row.map(settlement_from_db))
    }

    /// Line items of a committed settlement
    pub async fn line_items(&self, settlement: SettlementId) -> Result<Vec<SettlementLineItem>> {
        let rows = self
            .db
            .settlement_repo()
            .line_items(settlement.0)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(line_item_from_db).collect()
    }
}

fn line_item_figures(preview: &SettlementPreview) -> [(SettlementCategory, Amount); 7] {
    let d = &preview.details;
    [
        (SettlementCategory::TournamentCharge, d.tournament.charge_total),
        (SettlementCategory::TournamentPrize, d.tournament.prize_total),
        (SettlementCategory::WebRingBuyIn, d.web_ring.total_buy_in),
        (SettlementCategory::WebRingCashOut, d.web_ring.total_cash_out),
        (SettlementCategory::InStoreBuyInFee, d.in_store.total_buy_in_fee),
        (SettlementCategory::InStoreWithdrawFee, d.in_store.withdraw_fee),
        (SettlementCategory::ConsumptionTax, preview.consumption_tax),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cageledger_types::{ChipEvent, ChipEventKind, RingEntry};

    async fn engine(pricing: PricingConfig) -> SettlementEngine {
        SettlementEngine::new(Database::connect_in_memory().await.unwrap(), pricing)
    }

    fn pricing_10pct() -> PricingConfig {
        PricingConfig {
            chip_conversion_rate: 1,
            tax_rate_bps: 1000,
            ..Default::default()
        }
    }

    fn web_ring_visit(buy_in: i64, cash_out: i64) -> Visit {
        let mut visit = Visit::empty(PlayerId::new());
        visit.web_ring_entries = vec![RingEntry {
            events: vec![
                ChipEvent::new(ChipEventKind::BuyIn, Amount::new(buy_in), Amount::ZERO),
                ChipEvent::new(ChipEventKind::CashOut, Amount::new(cash_out), Amount::ZERO),
            ],
        }];
        visit
    }

    #[tokio::test]
    async fn test_settle_records_all_line_items() {
        let engine = engine(pricing_10pct()).await;
        let visit = Visit::empty(PlayerId::new());

        let settlement = engine.settle(&visit, false, Amount::ZERO).await.unwrap();
        assert_eq!(settlement.net_amount, Amount::ZERO);
        assert_eq!(settlement.consumption_tax, Amount::ZERO);
        assert!(settlement.withdrawal.is_none());

        // All seven categories appear, zero figures included.
        let items = engine.line_items(settlement.id).await.unwrap();
        assert_eq!(items.len(), SettlementCategory::all().len());
        for category in SettlementCategory::all() {
            assert!(items.iter().any(|i| i.category == *category));
        }
    }

    #[tokio::test]
    async fn test_settle_exactly_once() {
        let engine = engine(pricing_10pct()).await;
        let visit = web_ring_visit(1000, 1500);

        let first = engine.settle(&visit, false, Amount::ZERO).await.unwrap();

        let second = engine.settle(&visit, false, Amount::ZERO).await;
        assert!(matches!(second, Err(LedgerError::AlreadySettled { .. })));

        // The first settlement is untouched.
        let stored = engine
            .settlement_for_visit(visit.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_settle_with_withdrawal() {
        let engine = engine(pricing_10pct()).await;
        let visit = Visit::empty(PlayerId::new());

        let ledger = LotLedger::new(engine.db.clone());
        ledger
            .deposit(visit.player, Currency::WebCoin, Amount::new(5_000), None)
            .await
            .unwrap();

        let settlement = engine
            .settle(&visit, false, Amount::new(2_000))
            .await
            .unwrap();

        // Withdrawal executed and linked to the settlement.
        let wd_id = settlement.withdrawal.unwrap();
        let withdrawals = ledger
            .withdrawals(visit.player, Currency::WebCoin)
            .await
            .unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].id, wd_id);
        assert_eq!(withdrawals[0].reference, Some(visit.id.0));

        assert_eq!(
            ledger
                .cached_balance(visit.player, Currency::WebCoin)
                .await
                .unwrap(),
            Amount::new(3_000)
        );

        // Withdrawn savings count as income with no table activity: net is
        // the withdrawal itself.
        assert_eq!(settlement.net_amount, Amount::new(2_000));
        assert_eq!(settlement.consumption_tax, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_settle_withdrawal_exceeding_balance_persists_nothing() {
        let engine = engine(pricing_10pct()).await;
        let visit = Visit::empty(PlayerId::new());

        let ledger = LotLedger::new(engine.db.clone());
        ledger
            .deposit(visit.player, Currency::WebCoin, Amount::new(100), None)
            .await
            .unwrap();

        let result = engine.settle(&visit, false, Amount::new(500)).await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));

        assert!(engine
            .settlement_for_visit(visit.id)
            .await
            .unwrap()
            .is_none());
        assert!(ledger
            .withdrawals(visit.player, Currency::WebCoin)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            ledger
                .cached_balance(visit.player, Currency::WebCoin)
                .await
                .unwrap(),
            Amount::new(100)
        );
    }

    #[tokio::test]
    async fn test_settle_banks_positive_net() {
        let engine = engine(pricing_10pct()).await;
        let visit = web_ring_visit(1_000, 4_000);

        let settlement = engine.settle(&visit, true, Amount::ZERO).await.unwrap();
        assert_eq!(settlement.net_amount, Amount::new(3_000));

        let ledger = LotLedger::new(engine.db.clone());
        let lots = ledger.lots(visit.player, Currency::WebCoin).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, Amount::new(3_000));
        assert_eq!(lots[0].origin_visit, Some(visit.id));
    }

    #[tokio::test]
    async fn test_settle_does_not_bank_negative_net() {
        let engine = engine(pricing_10pct()).await;
        let visit = web_ring_visit(4_000, 1_000);

        let settlement = engine.settle(&visit, true, Amount::ZERO).await.unwrap();
        assert!(settlement.net_amount.is_negative());

        let ledger = LotLedger::new(engine.db.clone());
        assert!(ledger
            .lots(visit.player, Currency::WebCoin)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_accrued_chips_banked_regardless_of_net_sign() {
        let engine = engine(pricing_10pct()).await;
        let mut visit = web_ring_visit(4_000, 1_000);
        visit.accrued_chip_deposit = Amount::new(700);

        let settlement = engine.settle(&visit, false, Amount::ZERO).await.unwrap();
        assert!(settlement.net_amount.is_negative());

        let ledger = LotLedger::new(engine.db.clone());
        let lots = ledger
            .lots(visit.player, Currency::InStoreChip)
            .await
            .unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].amount, Amount::new(700));
        assert_eq!(lots[0].origin_visit, Some(visit.id));
    }

    #[tokio::test]
    async fn test_negative_withdraw_rejected_before_any_write() {
        let engine = engine(pricing_10pct()).await;
        let visit = Visit::empty(PlayerId::new());

        let result = engine.settle(&visit, false, Amount::new(-1)).await;
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
        assert!(engine
            .settlement_for_visit(visit.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_winning_visit_end_to_end() {
        // Rate 1, tax 10%. Buy-in 500000, cash-out 750000, one tournament
        // charge of 3000. Positive taxable net, so no tax; final 247000.
        let engine = engine(pricing_10pct()).await;
        let mut visit = web_ring_visit(500_000, 750_000);
        visit.tournament_entries = vec![cageledger_types::TournamentEntry {
            tournament: cageledger_types::TournamentId::new(),
            events: vec![ChipEvent::new(
                ChipEventKind::BuyIn,
                Amount::new(10_000),
                Amount::new(3_000),
            )],
            final_rank: None,
            kills: 0,
            prize_table: vec![],
            bounty_pool: None,
        }];

        let settlement = engine.settle(&visit, false, Amount::ZERO).await.unwrap();
        assert_eq!(settlement.consumption_tax, Amount::ZERO);
        assert_eq!(settlement.net_amount, Amount::new(247_000));
    }

    #[tokio::test]
    async fn test_losing_visit_end_to_end() {
        // Same shape but cash-out 400000: taxable net -100000 yields 10000
        // tax, final -113000.
        let engine = engine(pricing_10pct()).await;
        let mut visit = web_ring_visit(500_000, 400_000);
        visit.tournament_entries = vec![cageledger_types::TournamentEntry {
            tournament: cageledger_types::TournamentId::new(),
            events: vec![ChipEvent::new(
                ChipEventKind::BuyIn,
                Amount::new(10_000),
                Amount::new(3_000),
            )],
            final_rank: None,
            kills: 0,
            prize_table: vec![],
            bounty_pool: None,
        }];

        let settlement = engine.settle(&visit, false, Amount::ZERO).await.unwrap();
        assert_eq!(settlement.consumption_tax, Amount::new(10_000));
        assert_eq!(settlement.net_amount, Amount::new(-113_000));

        let items = engine.line_items(settlement.id).await.unwrap();
        let tax_item = items
            .iter()
            .find(|i| i.category == SettlementCategory::ConsumptionTax)
            .unwrap();
        assert_eq!(tax_item.amount, Amount::new(10_000));
    }

    #[tokio::test]
    async fn test_preview_matches_settle() {
        let engine = engine(pricing_10pct()).await;
        let visit = web_ring_visit(500_000, 400_000);

        let preview = engine.preview(&visit, Amount::ZERO).unwrap();
        let settlement = engine.settle(&visit, false, Amount::ZERO).await.unwrap();
        assert_eq!(settlement.net_amount, preview.net_amount);
        assert_eq!(settlement.consumption_tax, preview.consumption_tax);
    }
}
