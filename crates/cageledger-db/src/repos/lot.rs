//! Deposit lot repository
//!
//! Lots are append-only. `seq` is the FIFO order; it is assigned by the
//! database so two lots created in the same millisecond still have a total
//! order.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{DbLot, DbLotRemaining, DbResult};

/// Repository for deposit lots
pub struct LotRepo {
    pool: SqlitePool,
}

impl LotRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new lot inside a caller-owned transaction
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        player_id: Uuid,
        currency: &str,
        amount: i64,
        origin_visit: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> DbResult<DbLot> {
        let lot = sqlx::query_as::<_, DbLot>(
            r#"
            INSERT INTO deposit_lots (id, player_id, currency, amount, origin_visit, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING seq, id, player_id, currency, amount, origin_visit, created_at
            "#,
        )
        .bind(id)
        .bind(player_id)
        .bind(currency)
        .bind(amount)
        .bind(origin_visit)
        .bind(created_at)
        .fetch_one(conn)
        .await?;

        Ok(lot)
    }

    /// All lots for an account, oldest first
    pub async fn list(&self, player_id: Uuid, currency: &str) -> DbResult<Vec<DbLot>> {
        let lots = sqlx::query_as::<_, DbLot>(
            r#"
            SELECT seq, id, player_id, currency, amount, origin_visit, created_at
            FROM deposit_lots
            WHERE player_id = ?1 AND currency = ?2
            ORDER BY seq ASC
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(lots)
    }

    /// Lots with their consumed totals, oldest first, for FIFO allocation
    pub async fn remaining_in(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
    ) -> DbResult<Vec<DbLotRemaining>> {
        let lots = sqlx::query_as::<_, DbLotRemaining>(
            r#"
            SELECT l.id AS id, l.amount AS amount, COALESCE(c.consumed, 0) AS consumed
            FROM deposit_lots l
            LEFT JOIN (
                SELECT lot_id, SUM(amount) AS consumed
                FROM lot_consumptions
                GROUP BY lot_id
            ) c ON c.lot_id = l.id
            WHERE l.player_id = ?1 AND l.currency = ?2
            ORDER BY l.seq ASC
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .fetch_all(conn)
        .await?;

        Ok(lots)
    }

    /// Sum over lots of (amount - consumed), derived purely from the log
    pub async fn available_sum(&self, player_id: Uuid, currency: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::available_sum_in(&mut conn, player_id, currency).await
    }

    /// Log-derived available balance inside a caller-owned transaction
    pub async fn available_sum_in(
        conn: &mut SqliteConnection,
        player_id: Uuid,
        currency: &str,
    ) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(l.amount - COALESCE(c.consumed, 0)), 0)
            FROM deposit_lots l
            LEFT JOIN (
                SELECT lot_id, SUM(amount) AS consumed
                FROM lot_consumptions
                GROUP BY lot_id
            ) c ON c.lot_id = l.id
            WHERE l.player_id = ?1 AND l.currency = ?2
            "#,
        )
        .bind(player_id)
        .bind(currency)
        .fetch_one(conn)
        .await?;

        Ok(sum)
    }
}
