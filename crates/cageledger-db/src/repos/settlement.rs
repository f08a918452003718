//! Settlement repository
//!
//! A settlement is terminal once created. The UNIQUE constraint on visit_id
//! converts a double-settle race at insert time into a Duplicate error.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{DbError, DbResult, DbSettlement, DbSettlementLineItem};

/// Repository for settlements and their line items
pub struct SettlementRepo {
    pool: SqlitePool,
}

impl SettlementRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the settlement of a visit, if one exists
    pub async fn find_by_visit(&self, visit_id: Uuid) -> DbResult<Option<DbSettlement>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_visit_in(&mut conn, visit_id).await
    }

    /// Find the settlement of a visit inside a caller-owned transaction
    pub async fn find_by_visit_in(
        conn: &mut SqliteConnection,
        visit_id: Uuid,
    ) -> DbResult<Option<DbSettlement>> {
        let settlement = sqlx::query_as::<_, DbSettlement>(
            r#"
            SELECT id, visit_id, player_id, net_amount, consumption_tax, withdrawal_id, created_at
            FROM settlements
            WHERE visit_id = ?1
            "#,
        )
        .bind(visit_id)
        .fetch_optional(conn)
        .await?;

        Ok(settlement)
    }

    /// Insert the settlement row inside a caller-owned transaction
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: Uuid,
        visit_id: Uuid,
        player_id: Uuid,
        net_amount: i64,
        consumption_tax: i64,
        withdrawal_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> DbResult<DbSettlement> {
        let result = sqlx::query_as::<_, DbSettlement>(
            r#"
            INSERT INTO settlements
                (id, visit_id, player_id, net_amount, consumption_tax, withdrawal_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, visit_id, player_id, net_amount, consumption_tax, withdrawal_id, created_at
            "#,
        )
        .bind(id)
        .bind(visit_id)
        .bind(player_id)
        .bind(net_amount)
        .bind(consumption_tax)
        .bind(withdrawal_id)
        .bind(created_at)
        .fetch_one(conn)
        .await;

        match result {
            Ok(settlement) => Ok(settlement),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation() {
                    Err(DbError::Duplicate(format!("settlement for visit {visit_id}")))
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Insert one categorized line item inside a caller-owned transaction
    pub async fn insert_line_item(
        conn: &mut SqliteConnection,
        settlement_id: Uuid,
        category: &str,
        amount: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settlement_line_items (settlement_id, category, amount)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(settlement_id)
        .bind(category)
        .bind(amount)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Line items of one settlement
    pub async fn line_items(&self, settlement_id: Uuid) -> DbResult<Vec<DbSettlementLineItem>> {
        let items = sqlx::query_as::<_, DbSettlementLineItem>(
            r#"
            SELECT settlement_id, category, amount
            FROM settlement_line_items
            WHERE settlement_id = ?1
            ORDER BY category ASC
            "#,
        )
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
