//! Property and adversarial test suite for the Ebb ledger.
//!
//! Integration tests drive the composed ledger through full lock, reward
//! and exit cycles and check the curve and payout invariants from a
//! holder's and from an attacker's point of view.

pub mod helpers;
