//! Visit activity snapshot
//!
//! A visit is one check-in session. Its tournament and ring-game activity is
//! an append-only event log produced by external collaborators; settlement
//! reads it as an immutable snapshot and never writes to it.

use crate::{Amount, PlayerId, TournamentId, VisitId};
use serde::{Deserialize, Serialize};

/// Kind of a chip movement event inside an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipEventKind {
    BuyIn,
    CashOut,
    Withdraw,
}

/// A single chip movement within a tournament or ring-game entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipEvent {
    pub kind: ChipEventKind,
    /// Chips moved by this event
    pub chip_amount: Amount,
    /// Money charged alongside the event (entry fees etc.), zero if none
    pub charge_amount: Amount,
}

impl ChipEvent {
    pub fn new(kind: ChipEventKind, chip_amount: Amount, charge_amount: Amount) -> Self {
        Self {
            kind,
            chip_amount,
            charge_amount,
        }
    }
}

/// Bounty pool configuration for a tournament, if one is set up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyPool {
    pub total_amount: Amount,
    pub ticket_count: u32,
}

impl BountyPool {
    /// Prize credited per elimination: pool total divided by ticket count.
    /// A zero ticket count yields no bounty.
    pub fn per_kill(&self) -> Amount {
        if self.ticket_count == 0 {
            return Amount::ZERO;
        }
        Amount::new(self.total_amount.value() / self.ticket_count as i64)
    }
}

/// One rank -> prize row of a tournament prize table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub rank: u32,
    pub amount: Amount,
}

/// A player's entry into one tournament during a visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentEntry {
    pub tournament: TournamentId,
    pub events: Vec<ChipEvent>,
    /// Final rank, if the player placed
    pub final_rank: Option<u32>,
    /// Eliminations credited to the player
    pub kills: u32,
    /// Prize table snapshot of the tournament
    pub prize_table: Vec<PrizeTier>,
    /// Bounty pool snapshot, if configured
    pub bounty_pool: Option<BountyPool>,
}

impl TournamentEntry {
    /// Rank-based prize for this entry, zero when unranked or off-table
    pub fn rank_prize(&self) -> Amount {
        match self.final_rank {
            Some(rank) => self
                .prize_table
                .iter()
                .find(|t| t.rank == rank)
                .map(|t| t.amount)
                .unwrap_or(Amount::ZERO),
            None => Amount::ZERO,
        }
    }
}

/// A player's ring-game entry (web-coin table or in-store table)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingEntry {
    pub events: Vec<ChipEvent>,
}

/// Snapshot of one visit's activity, as read by settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub player: PlayerId,
    pub tournament_entries: Vec<TournamentEntry>,
    pub web_ring_entries: Vec<RingEntry>,
    pub in_store_entry: Option<RingEntry>,
    /// In-store chips bought during the visit and not yet banked; deposited
    /// to the in-store chip ledger at checkout regardless of net sign
    pub accrued_chip_deposit: Amount,
}

impl Visit {
    /// Empty visit for a player, useful as a starting point
    pub fn empty(player: PlayerId) -> Self {
        Self {
            id: VisitId::new(),
            player,
            tournament_entries: Vec::new(),
            web_ring_entries: Vec::new(),
            in_store_entry: None,
            accrued_chip_deposit: Amount::ZERO,
        }
    }
}
