//! Database models - mapped from SQLite tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Balance Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbBalance {
    pub player_id: Uuid,
    pub currency: String,
    pub amount: i64,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Ledger Models (append-only)
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLot {
    pub seq: i64,
    pub id: Uuid,
    pub player_id: Uuid,
    pub currency: String,
    pub amount: i64,
    pub origin_visit: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbWithdrawal {
    pub seq: i64,
    pub id: Uuid,
    pub player_id: Uuid,
    pub currency: String,
    pub amount: i64,
    pub reference: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLotConsumption {
    pub lot_id: Uuid,
    pub withdrawal_id: Uuid,
    pub amount: i64,
}

/// One lot with its consumed total, as loaded for FIFO allocation
#[derive(Debug, Clone, FromRow)]
pub struct DbLotRemaining {
    pub id: Uuid,
    pub amount: i64,
    pub consumed: i64,
}

impl DbLotRemaining {
    pub fn remaining(&self) -> i64 {
        self.amount - self.consumed
    }
}

// ============================================================================
// Settlement Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSettlement {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub player_id: Uuid,
    pub net_amount: i64,
    pub consumption_tax: i64,
    pub withdrawal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSettlementLineItem {
    pub settlement_id: Uuid,
    pub category: String,
    pub amount: i64,
}
