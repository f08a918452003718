//! Repository modules

pub mod balance;
pub mod lot;
pub mod settlement;
pub mod withdrawal;

pub use balance::BalanceRepo;
pub use lot::LotRepo;
pub use settlement::SettlementRepo;
pub use withdrawal::WithdrawalRepo;
