//! # ebb-ledger
//! The vote escrow and reward distributor wired together over one token bank.

pub mod config;
pub mod ledger;
pub mod shared;

pub use config::LedgerConfig;
pub use ledger::{Ledger, LedgerEvent};
pub use shared::SharedLedger;
