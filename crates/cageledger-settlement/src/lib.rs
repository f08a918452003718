//! Cageledger Settlement - end-of-visit netting
//!
//! Three layers, composed by [`SettlementEngine::settle`]:
//!
//! - [`aggregate`]: read-only projection of a visit's tournament and
//!   ring-game activity into income and expense totals
//! - [`tax`]: pure consumption-tax and final-net derivations
//! - [`commit`]: the one atomic transaction combining an optional web-coin
//!   withdrawal, the settlement record with its line items, and re-deposits
//!
//! A visit settles at most once; any failure rolls the whole transaction
//! back with no observable partial state.

pub mod aggregate;
pub mod commit;
pub mod tax;

pub use aggregate::{
    compute_settlement_details, InStoreTotals, SettlementDetails, TournamentTotals, WebRingTotals,
};
pub use commit::{
    Settlement, SettlementCategory, SettlementEngine, SettlementLineItem, SettlementPreview,
};
pub use tax::{calc_consumption_tax, calc_final_net_amount};
