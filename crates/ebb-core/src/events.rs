//! Domain events for off-chain indexing.
//!
//! Both engines append events to an in-memory log that callers drain after
//! each transaction. Amounts are in base units.

use serde::{Deserialize, Serialize};

use crate::types::{Address, PositionId};

/// What kind of deposit produced an [`EscrowEvent::Deposit`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositKind {
    CreateLock,
    IncreaseAmount,
    IncreaseUnlockTime,
    DepositFor,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum EscrowEvent {
    Deposit {
        provider: Address,
        id: PositionId,
        kind: DepositKind,
        value: i128,
        amount_before: i128,
        amount_after: i128,
        locktime: u64,
        ts: u64,
    },
    Withdraw {
        provider: Address,
        id: PositionId,
        value: i128,
        ts: u64,
    },
    EarlyWithdraw {
        provider: Address,
        id: PositionId,
        value: i128,
        penalty: i128,
        treasury: Address,
        ts: u64,
    },
    LockPermanent {
        owner: Address,
        id: PositionId,
        amount: i128,
        ts: u64,
    },
    UnlockPermanent {
        owner: Address,
        id: PositionId,
        amount: i128,
        end: u64,
        ts: u64,
    },
    Merge {
        sender: Address,
        from: PositionId,
        to: PositionId,
        amount_from: i128,
        amount_to: i128,
        amount_final: i128,
        locktime: u64,
        ts: u64,
    },
    Split {
        sender: Address,
        from: PositionId,
        id1: PositionId,
        id2: PositionId,
        amount1: i128,
        amount2: i128,
        locktime: u64,
        ts: u64,
    },
    Transfer {
        from: Address,
        to: Address,
        id: PositionId,
    },
    Supply {
        before: i128,
        after: i128,
    },
    ToggleSplit {
        account: Address,
        allowed: bool,
    },
    ConfigUpdated {
        field: String,
        value: String,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum RewardEvent {
    NotifyReward {
        from: Address,
        token: Address,
        epoch: u64,
        amount: u128,
    },
    ClaimRewards {
        id: PositionId,
        receiver: Address,
        token: Address,
        amount: u128,
    },
    Recover {
        token: Address,
        amount: u128,
    },
    ReceiverSet {
        id: PositionId,
        receiver: Option<Address>,
    },
}
