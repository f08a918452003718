//! Cached balance repository
//!
//! The cached balance is only ever written through the guarded methods here,
//! and only from inside a caller-owned transaction. The guard is a value-based
//! compare-and-swap: the write carries the amount observed at operation start
//! and matches zero rows if another writer got there first.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{DbBalance, DbError, DbResult};

/// Repository for the denormalized (player, currency) balance cache
pub struct BalanceRepo {
    pool: SqlitePool,
}

impl BalanceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the balance row, if one exists
    pub async fn get(&self, player_id: Uuid, currency: &str) -> DbResult<Option<DbBalance>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, player_id, currency).await
    }

    /// Get the balance row inside a caller-owned transaction
    pub async fn get_in(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
    ) -> DbResult<Option<DbBalance>> {
        let balance = sqlx::query_as::<_, DbBalance>(
            r#"
            SELECT player_id, currency, amount, updated_at
            FROM balances
            WHERE player_id = ?1 AND currency = ?2
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .fetch_optional(conn)
        .await?;

        Ok(balance)
    }

    /// Cached amount, zero when no row exists yet
    pub async fn amount_in(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
    ) -> DbResult<i64> {
        Ok(Self::get_in(conn, player_id, currency)
            .await?
            .map(|b| b.amount)
            .unwrap_or(0))
    }

    /// Increment the balance, conditional on the observed value.
    ///
    /// Upserts so that a first deposit creates the row. The conflict arm only
    /// fires when the current amount still equals `observed`; zero affected
    /// rows means another writer moved the balance and the caller must abort.
    pub async fn credit_guarded(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
        amount: i64,
        observed: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO balances (player_id, currency, amount, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (player_id, currency)
            DO UPDATE SET amount = balances.amount + excluded.amount, updated_at = excluded.updated_at
            WHERE balances.amount = ?5
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .bind(amount)
        .bind(Utc::now())
        .bind(observed)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleWrite(format!(
                "balance credit for {player_id}/{currency}"
            )));
        }
        Ok(())
    }

    /// Decrement the balance, conditional on the observed value
    pub async fn debit_guarded(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
        amount: i64,
        observed: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET amount = amount - ?3, updated_at = ?4
            WHERE player_id = ?1 AND currency = ?2 AND amount = ?5
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .bind(amount)
        .bind(Utc::now())
        .bind(observed)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::StaleWrite(format!(
                "balance debit for {player_id}/{currency}"
            )));
        }
        Ok(())
    }
}
