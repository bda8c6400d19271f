//! # ebb-rewards
//! Weekly reward buckets paid out pro rata to historical voting power.

pub mod distributor;

pub use distributor::{RewardDistributor, TokenLedger};
