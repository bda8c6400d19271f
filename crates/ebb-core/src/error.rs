//! Error types for the Ebb ledger.
use thiserror::Error;

use crate::types::{Address, PositionId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance of {token} for {holder}: have {have}, need {need}")]
    InsufficientBalance { token: Address, holder: Address, have: u128, need: u128 },
    #[error("transfer to the zero address")] ZeroRecipient,
    #[error("balance overflow")] Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("penalty {0} bps exceeds 10000")] InvalidPenalty(u64),
    #[error("{0} must not be the zero address")] ZeroAddress(&'static str),
    #[error("invalid value for {key}: {reason}")] InvalidValue { key: String, reason: String },
    #[error("config file: {0}")] File(String),
}

/// Re-entry into a guarded entry point while it is still running.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("reentrant call")]
pub struct Reentered;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("reward amount is zero")] ZeroAmount,
    #[error("zero address")] ZeroAddress,
    #[error("timestamp {through} is in the future (now {now})")]
    FutureTimestamp { through: u64, now: u64 },
    #[error("position {0} does not exist")] NonexistentPosition(PositionId),
    #[error("caller is not approved or owner of position {0}")] NotApprovedOrOwner(PositionId),
    #[error("caller is not the owner of position {0}")] NotOwner(PositionId),
    #[error("caller is not the reward operator")] NotOperator,
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error(transparent)] Reentrancy(#[from] Reentered),
    #[error(transparent)] Token(#[from] TokenError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    // Authorization.
    #[error("caller is not approved or owner of position {0}")] NotApprovedOrOwner(PositionId),
    #[error("caller is not the escrow admin")] NotAdmin,
    // State preconditions.
    #[error("position {0} does not exist")] NonexistentPosition(PositionId),
    #[error("position {0} has no lock")] NoLockFound(PositionId),
    #[error("amount {amount} below minimum lock amount {minimum}")]
    AmountBelowMinimum { amount: u128, minimum: u128 },
    #[error("unlock time must be at least the minimum lock duration away")] LockDurationTooShort,
    #[error("unlock time exceeds the maximum lock duration")] LockDurationTooLong,
    #[error("new unlock time must be later than the current one")] LockDurationNotIncreasing,
    #[error("lock of position {0} has expired")] LockExpired(PositionId),
    #[error("lock of position {id} has not expired (ends at {end})")]
    LockNotExpired { id: PositionId, end: u64 },
    #[error("lock of position {0} expires within the minimum lock duration")]
    LockExpiresTooSoon(PositionId),
    #[error("position {0} is permanently locked")] PermanentLock(PositionId),
    #[error("position {0} is not permanently locked")] NotPermanentLock(PositionId),
    #[error("timestamp {got} is before the last checkpoint at {last}")]
    TimestampRegression { last: u64, got: u64 },
    // Invariant guards.
    #[error("amount is zero")] ZeroAmount,
    #[error("zero address")] ZeroAddress,
    #[error("cannot merge a position into itself")] SameNft,
    #[error("split amount must be smaller than the locked amount")] AmountTooBig,
    #[error("splitting is not enabled for {0}")] SplitNotAllowed(Address),
    #[error("{from} does not own position {id}")] NotOwnerOf { from: Address, id: PositionId },
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("snapshot: {0}")] Snapshot(String),
    #[error(transparent)] Reentrancy(#[from] Reentered),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error("reward hook: {0}")] Hook(#[from] RewardError),
}

#[derive(Error, Debug)]
pub enum EbbError {
    #[error(transparent)] Escrow(#[from] EscrowError),
    #[error(transparent)] Reward(#[from] RewardError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("ledger is busy: reentrant transaction")] Reentrancy,
}
