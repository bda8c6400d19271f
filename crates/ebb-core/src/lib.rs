//! # ebb-core
//! Foundation types and traits for the Ebb vote-escrow ledger.

pub mod bank;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod guard;
pub mod math;
pub mod time;
pub mod traits;
pub mod types;
