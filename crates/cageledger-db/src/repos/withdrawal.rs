//! Withdrawal and consumption link repository
//!
//! Withdrawals and their lot consumption links are append-only. A withdrawal
//! row only ever exists together with links summing to its full amount; both
//! are written in the same transaction or not at all.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{DbLotConsumption, DbResult, DbWithdrawal};

/// Repository for withdrawal records and lot consumption links
pub struct WithdrawalRepo {
    pool: SqlitePool,
}

impl WithdrawalRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a withdrawal record inside a caller-owned transaction
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        player_id: Uuid,
        currency: &str,
        amount: i64,
        reference: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> DbResult<DbWithdrawal> {
        let withdrawal = sqlx::query_as::<_, DbWithdrawal>(
            r#"
            INSERT INTO withdrawals (id, player_id, currency, amount, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING seq, id, player_id, currency, amount, reference, created_at
            "#,
        )
        .bind(id)
        .bind(player_id)
        .bind(currency)
        .bind(amount)
        .bind(reference)
        .bind(created_at)
        .fetch_one(conn)
        .await?;

        Ok(withdrawal)
    }

    /// Append one consumption link inside a caller-owned transaction
    pub async fn insert_consumption(
        conn: &mut SqliteConnection,
        lot_id: Uuid,
        withdrawal_id: Uuid,
        amount: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lot_consumptions (lot_id, withdrawal_id, amount)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(lot_id)
        .bind(withdrawal_id)
        .bind(amount)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// All withdrawals for an account, oldest first
    pub async fn list(&self, player_id: Uuid, currency: &str) -> DbResult<Vec<DbWithdrawal>> {
        let withdrawals = sqlx::query_as::<_, DbWithdrawal>(
            r#"
            SELECT seq, id, player_id, currency, amount, reference, created_at
            FROM withdrawals
            WHERE player_id = ?1 AND currency = ?2
            ORDER BY seq ASC
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }

    /// Consumption links of one withdrawal
    pub async fn consumptions(&self, withdrawal_id: Uuid) -> DbResult<Vec<DbLotConsumption>> {
        let links = sqlx::query_as::<_, DbLotConsumption>(
            r#"
            SELECT lot_id, withdrawal_id, amount
            FROM lot_consumptions
            WHERE withdrawal_id = ?1
            "#,
        )
        .bind(withdrawal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    /// Consumed total of one lot across all withdrawals
    pub async fn consumed_of_lot(&self, lot_id: Uuid) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM lot_consumptions WHERE lot_id = ?1",
        )
        .bind(lot_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }
}
