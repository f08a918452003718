//! Cageledger Lot Ledger - per-account stored value with FIFO consumption
//!
//! Deposits create append-only lots; withdrawals consume the oldest
//! unconsumed lots first, recording one consumption link per touched lot.
//! A denormalized balance per (player, currency) is kept consistent with the
//! log by a value-based compare-and-swap executed in the same transaction as
//! the log writes.
//!
//! # Invariants
//!
//! 1. Lots, withdrawals, and links are never updated or deleted
//! 2. Per-lot link sum never exceeds the lot amount
//! 3. A withdrawal exists only together with links summing to its amount
//! 4. The cached balance equals the unconsumed lot sum at quiescence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{error, info};
use uuid::Uuid;

use cageledger_db::{
    BalanceRepo, Database, DbError, DbLot, DbLotConsumption, DbWithdrawal, LotRepo, WithdrawalRepo,
};
use cageledger_types::{
    Amount, Currency, LedgerError, LotId, PlayerId, Result, VisitId, WithdrawalId,
};

/// An individual deposit, tracked separately to preserve FIFO order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLot {
    pub id: LotId,
    pub player: PlayerId,
    pub currency: Currency,
    pub amount: Amount,
    pub origin_visit: Option<VisitId>,
    pub created_at: DateTime<Utc>,
}

/// One withdrawal request, fully allocated against lots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: WithdrawalId,
    pub player: PlayerId,
    pub currency: Currency,
    pub amount: Amount,
    /// Originating event, when the withdrawal was made on behalf of one
    pub reference: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Join record tying a withdrawal to a consumed slice of one lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionLink {
    pub lot: LotId,
    pub withdrawal: WithdrawalId,
    pub amount: Amount,
}

fn parse_currency(code: &str) -> Result<Currency> {
    Currency::from_code(code)
        .ok_or_else(|| LedgerError::storage(format!("unknown currency code {code}")))
}

fn lot_from_db(lot: DbLot) -> Result<DepositLot> {
    Ok(DepositLot {
        id: LotId::from_uuid(lot.id),
        player: PlayerId::from_uuid(lot.player_id),
        currency: parse_currency(&lot.currency)?,
        amount: Amount::new(lot.amount),
        origin_visit: lot.origin_visit.map(VisitId::from_uuid),
        created_at: lot.created_at,
    })
}

fn withdrawal_from_db(wd: DbWithdrawal) -> Result<WithdrawalRecord> {
    Ok(WithdrawalRecord {
        id: WithdrawalId::from_uuid(wd.id),
        player: PlayerId::from_uuid(wd.player_id),
        currency: parse_currency(&wd.currency)?,
        amount: Amount::new(wd.amount),
        reference: wd.reference,
        created_at: wd.created_at,
    })
}

fn link_from_db(link: DbLotConsumption) -> ConsumptionLink {
    ConsumptionLink {
        lot: LotId::from_uuid(link.lot_id),
        withdrawal: WithdrawalId::from_uuid(link.withdrawal_id),
        amount: Amount::new(link.amount),
    }
}

fn storage_err(e: DbError) -> LedgerError {
    LedgerError::storage(e.to_string())
}

/// The lot ledger service
///
/// One instance serves both currencies; every operation is scoped to a
/// (player, currency) account. Cloneable and safe to share across request
/// handlers.
#[derive(Clone)]
pub struct LotLedger {
    db: Database,
}

impl LotLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access to settlement lookups sharing this ledger's pool
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // Public operations (each owns one transaction)
    // ========================================================================

    /// Record a deposit: appends a lot and increments the cached balance.
    ///
    /// The only precondition is a positive amount.
    pub async fn deposit(
        &self,
        player: PlayerId,
        currency: Currency,
        amount: Amount,
        origin_visit: Option<VisitId>,
    ) -> Result<DepositLot> {
        let mut tx = self.db.pool().begin().await.map_err(|e| LedgerError::storage(e.to_string()))?;
        let lot = Self::deposit_in(&mut tx, player, currency, amount, origin_visit).await?;
        tx.commit().await.map_err(|e| LedgerError::storage(e.to_string()))?;

        info!(
            player = %player,
            currency = %currency,
            amount = %amount,
            lot = %lot.id,
            "deposit committed"
        );
        Ok(lot)
    }

    /// Withdraw against the oldest unconsumed lots first.
    ///
    /// Fails with InsufficientBalance when the cached balance cannot cover
    /// the amount, and with Conflict when another writer moved the balance
    /// between snapshot and write. Nothing persists on failure.
    pub async fn withdraw(
        &self,
        player: PlayerId,
        currency: Currency,
        amount: Amount,
    ) -> Result<WithdrawalRecord> {
        let mut tx = self.db.pool().begin().await.map_err(|e| LedgerError::storage(e.to_string()))?;
        let record = Self::withdraw_in(&mut tx, player, currency, amount, None).await?;
        tx.commit().await.map_err(|e| LedgerError::storage(e.to_string()))?;

        info!(
            player = %player,
            currency = %currency,
            amount = %amount,
            withdrawal = %record.id,
            "withdrawal committed"
        );
        Ok(record)
    }

    /// Balance derived purely from the lot log; equals the cached balance at
    /// quiescence
    pub async fn available_balance(&self, player: PlayerId, currency: Currency) -> Result<Amount> {
        let sum = self
            .db
            .lot_repo()
            .available_sum(player.0, currency.code())
            .await
            .map_err(storage_err)?;
        Ok(Amount::new(sum))
    }

    /// The denormalized cached balance (zero when no row exists)
    pub async fn cached_balance(&self, player: PlayerId, currency: Currency) -> Result<Amount> {
        let balance = self
            .db
            .balance_repo()
            .get(player.0, currency.code())
            .await
            .map_err(storage_err)?;
        Ok(Amount::new(balance.map(|b| b.amount).unwrap_or(0)))
    }

    /// All lots of an account, oldest first
    pub async fn lots(&self, player: PlayerId, currency: Currency) -> Result<Vec<DepositLot>> {
        let lots = self
            .db
            .lot_repo()
            .list(player.0, currency.code())
            .await
            .map_err(storage_err)?;
        lots.into_iter().map(lot_from_db).collect()
    }

    /// All withdrawals of an account, oldest first
    pub async fn withdrawals(
        &self,
        player: PlayerId,
        currency: Currency,
    ) -> Result<Vec<WithdrawalRecord>> {
        let withdrawals = self
            .db
            .withdrawal_repo()
            .list(player.0, currency.code())
            .await
            .map_err(storage_err)?;
        withdrawals.into_iter().map(withdrawal_from_db).collect()
    }

    /// Consumption links of one withdrawal
    pub async fn consumptions(&self, withdrawal: WithdrawalId) -> Result<Vec<ConsumptionLink>> {
        let links = self
            .db
            .withdrawal_repo()
            .consumptions(withdrawal.0)
            .await
            .map_err(storage_err)?;
        Ok(links.into_iter().map(link_from_db).collect())
    }

    // ========================================================================
    // Transactional building blocks (caller owns the transaction)
    // ========================================================================

    /// Deposit inside a caller-owned transaction
    pub async fn deposit_in(
        conn: &mut SqliteConnection,
        player: PlayerId,
        currency: Currency,
        amount: Amount,
        origin_visit: Option<VisitId>,
    ) -> Result<DepositLot> {
        if !amount.is_positive() {
            return Err(LedgerError::validation(
                "amount",
                "deposit amount must be positive",
            ));
        }

        let observed = BalanceRepo::amount_in(conn, player.0, currency.code())
            .await
            .map_err(storage_err)?;

        let lot = LotRepo::insert(
            conn,
            Uuid::new_v4(),
            player.0,
            currency.code(),
            amount.value(),
            origin_visit.map(|v| v.0),
            Utc::now(),
        )
        .await
        .map_err(storage_err)?;

        match BalanceRepo::credit_guarded(conn, player.0, currency.code(), amount.value(), observed)
            .await
        {
            Ok(()) => {}
            Err(DbError::StaleWrite(_)) => {
                return Err(LedgerError::Conflict {
                    player: player.to_string(),
                    currency: currency.code().to_string(),
                })
            }
            Err(e) => return Err(storage_err(e)),
        }

        lot_from_db(lot)
    }

    /// Withdraw inside a caller-owned transaction
    pub async fn withdraw_in(
        conn: &mut SqliteConnection,
        player: PlayerId,
        currency: Currency,
        amount: Amount,
        reference: Option<Uuid>,
    ) -> Result<WithdrawalRecord> {
        if !amount.is_positive() {
            return Err(LedgerError::validation(
                "amount",
                "withdrawal amount must be positive",
            ));
        }

        let observed = BalanceRepo::amount_in(conn, player.0, currency.code())
            .await
            .map_err(storage_err)?;
        if observed < amount.value() {
            return Err(LedgerError::InsufficientBalance {
                requested: amount.value(),
                available: observed,
            });
        }

        // Oldest-first allocation across unconsumed lot remainders.
        let lots = LotRepo::remaining_in(conn, player.0, currency.code())
            .await
            .map_err(storage_err)?;

        let mut allocations: Vec<(Uuid, i64)> = Vec::new();
        let mut left = amount.value();
        for lot in &lots {
            if left == 0 {
                break;
            }
            let remaining = lot.remaining();
            if remaining <= 0 {
                continue;
            }
            let take = remaining.min(left);
            allocations.push((lot.id, take));
            left -= take;
        }

        if left > 0 {
            // The balance precondition passed but the lots cannot cover the
            // amount: the snapshot and the cache have diverged.
            error!(
                player = %player,
                currency = %currency,
                unallocated = left,
                "FIFO allocation exhausted lots; ledger inconsistent"
            );
            return Err(LedgerError::LedgerInconsistency {
                player: player.to_string(),
                currency: currency.code().to_string(),
                unallocated: left,
            });
        }

        let withdrawal = WithdrawalRepo::insert(
            conn,
            Uuid::new_v4(),
            player.0,
            currency.code(),
            amount.value(),
            reference,
            Utc::now(),
        )
        .await
        .map_err(storage_err)?;

        for (lot_id, take) in &allocations {
            WithdrawalRepo::insert_consumption(conn, *lot_id, withdrawal.id, *take)
                .await
                .map_err(storage_err)?;
        }

        match BalanceRepo::debit_guarded(conn, player.0, currency.code(), amount.value(), observed)
            .await
        {
            Ok(()) => {}
            Err(DbError::StaleWrite(_)) => {
                return Err(LedgerError::Conflict {
                    player: player.to_string(),
                    currency: currency.code().to_string(),
                })
            }
            Err(e) => return Err(storage_err(e)),
        }

        withdrawal_from_db(withdrawal)
    }
}
