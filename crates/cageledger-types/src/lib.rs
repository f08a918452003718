//! Cageledger Types - Canonical domain types for the stored-value chip ledger
//!
//! This crate contains all foundational types for Cageledger with zero
//! dependencies on other cageledger crates. It defines:
//!
//! - Identity types (PlayerId, VisitId, LotId, etc.)
//! - The two store currencies and the integer Amount type
//! - Visit activity snapshots consumed by settlement aggregation
//! - Pricing tables (conversion rate, tax rate, buy-in options)
//! - The shared error taxonomy
//!
//! # Ledger Invariants
//!
//! 1. Deposits, withdrawals, and consumption links are append-only
//! 2. The cached balance equals the unconsumed lot sum at quiescence
//! 3. Balances are never written unconditionally under concurrency
//! 4. A visit is settled at most once

pub mod amount;
pub mod currency;
pub mod error;
pub mod identity;
pub mod pricing;
pub mod visit;

pub use amount::*;
pub use currency::*;
pub use error::*;
pub use identity::*;
pub use pricing::*;
pub use visit::*;

/// Version of the Cageledger types schema
pub const TYPES_VERSION: &str = "0.1.0";
