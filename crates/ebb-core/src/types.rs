//! Core ledger types: accounts, locks and checkpoint points.
//!
//! Lock amounts and curve values are signed (`i128`) so that decay
//! arithmetic can go below zero before being floored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_LOCK_DURATION_I128;

/// Identifier of a position. Ids start at 1; 0 is the heartbeat id.
pub type PositionId = u64;

/// A 20-byte account identifier (holders, tokens, treasury, contracts).
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid owner or recipient.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Derive a stable address from a human-readable label.
    ///
    /// Takes the first 20 bytes of the BLAKE3 hash of the label. Used for
    /// well-known system accounts and by the simulator for named actors.
    ///
    /// # Examples
    ///
    /// ```
    /// use ebb_core::types::Address;
    /// assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
    /// assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("invalid address {s:?}: {e}"))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("invalid address {s:?}: expected 20 bytes"))?;
        Ok(Self(array))
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Execution context of one transaction: who is calling, and the
/// timestamp and block number the host committed it at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub sender: Address,
    pub timestamp: u64,
    pub block: u64,
}

impl TxContext {
    pub fn new(sender: Address, timestamp: u64, block: u64) -> Self {
        Self {
            sender,
            timestamp,
            block,
        }
    }

    /// Same timestamp and block, different caller.
    pub fn with_sender(&self, sender: Address) -> Self {
        Self { sender, ..*self }
    }
}

/// Locked balance of one position.
///
/// A timed lock has a week-aligned `end`; a permanent lock has `end == 0`
/// and its amount also counts toward the global permanent balance.
/// A withdrawn position holds the default (all-zero) lock.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Lock {
    /// Locked principal in base units.
    pub amount: i128,
    /// Unlock timestamp, rounded down to a week; 0 when permanent or withdrawn.
    pub end: u64,
    /// Start used for the early-withdraw penalty fraction.
    pub effective_start: u64,
    pub is_permanent: bool,
}

impl Lock {
    /// A timed lock has run out. Permanent locks never expire.
    pub fn is_expired(&self, now: u64) -> bool {
        !self.is_permanent && self.end <= now
    }

    /// `(slope, bias)` this lock contributes to the decaying curve at `now`.
    ///
    /// Zero for permanent, expired or empty locks.
    pub fn decay_terms(&self, now: u64) -> (i128, i128) {
        if self.is_permanent || self.end <= now || self.amount <= 0 {
            return (0, 0);
        }
        let slope = self.amount / MAX_LOCK_DURATION_I128;
        let bias = slope * i128::from(self.end - now);
        (slope, bias)
    }

    /// Voting power of this lock at `now`, evaluated directly from the lock.
    pub fn voting_power(&self, now: u64) -> i128 {
        if self.is_permanent {
            return self.amount;
        }
        self.decay_terms(now).1
    }
}

/// One point of a position's history.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct UserPoint {
    /// Voting power at `ts` from the decaying curve.
    pub bias: i128,
    /// Decay per second.
    pub slope: i128,
    pub ts: u64,
    pub blk: u64,
    /// Non-decaying amount if the position is permanent, else 0.
    pub permanent: i128,
}

/// One point of the global curve.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct GlobalPoint {
    pub bias: i128,
    pub slope: i128,
    pub ts: u64,
    pub blk: u64,
    /// Sum of all permanent lock amounts at `ts`.
    pub permanent_lock_balance: i128,
}
