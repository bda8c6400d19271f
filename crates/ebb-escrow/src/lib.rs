//! # ebb-escrow
//! Vote-escrow ledger: locks, positions, checkpointed decay curves and
//! historical voting power queries.
//!
//! ```
//! use ebb_core::bank::MemoryTokenBank;
//! use ebb_core::config::EscrowConfig;
//! use ebb_core::constants::{UNIT, WEEK};
//! use ebb_core::traits::NoopHook;
//! use ebb_core::types::{Address, TxContext};
//! use ebb_escrow::VotingEscrow;
//!
//! let token = Address::from_label("token");
//! let alice = Address::from_label("alice");
//! let mut bank = MemoryTokenBank::new();
//! bank.mint(&token, &alice, 100 * UNIT as u128).unwrap();
//!
//! let escrow_account = Address::from_label("escrow");
//! let mut ve = VotingEscrow::new(EscrowConfig::default(), token, escrow_account).unwrap();
//! let t0 = 2_810 * WEEK;
//! let ctx = TxContext::new(alice, t0, 1);
//! let id = ve.create_lock(&ctx, 100 * UNIT as u128, 26 * WEEK, &mut bank, &mut NoopHook).unwrap();
//!
//! let at_start = ve.voting_power_at(id, t0);
//! assert_eq!(ve.voting_power_at(id, t0 + 13 * WEEK), at_start / 2);
//! assert_eq!(ve.voting_power_at(id, t0 + 26 * WEEK), 0);
//! ```

pub mod checkpoint;
pub mod escrow;
pub mod history;
pub mod lifecycle;
pub mod registry;
pub mod store;

pub use escrow::{EscrowState, EscrowSummary, VotingEscrow};
