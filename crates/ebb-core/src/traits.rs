//! Trait interfaces between the Ebb crates and their collaborators.
//!
//! - [`TokenBank`]: fungible token balances and transfers (any token)
//! - [`VotingPowerSource`]: read-only escrow view (ebb-escrow implements)
//! - [`PositionHook`]: mint/transfer/burn notifications (ebb-rewards implements)

use crate::error::{RewardError, TokenError};
use crate::types::{Address, PositionId, TxContext};

/// Balances of any number of fungible tokens.
///
/// The escrow and the reward distributor each hold their funds under their
/// own account address.
pub trait TokenBank {
    /// Balance of `holder` in `token`. Unknown pairs are zero.
    fn balance_of(&self, token: &Address, holder: &Address) -> u128;

    /// Move `amount` of `token` from `from` to `to`.
    ///
    /// Fails without side effects if `from` holds less than `amount`.
    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError>;
}

/// Read-only view of the escrow that reward accounting depends on.
pub trait VotingPowerSource {
    /// Voting power of `id` at timestamp `t`, reconstructed from history.
    fn voting_power_at(&self, id: PositionId, t: u64) -> u128;

    /// Sum of all voting power at timestamp `t`.
    fn total_supply_at(&self, t: u64) -> u128;

    /// Current owner, or `None` if the position was never minted or has been burned.
    fn owner_of(&self, id: PositionId) -> Option<Address>;

    /// Whether `spender` is the owner, the approved account or an operator of the owner.
    fn is_approved_or_owner(&self, spender: &Address, id: PositionId) -> bool;

    /// Timestamp of the position's first checkpoint (its mint time).
    ///
    /// Kept after burn so historical queries keep working.
    fn position_start(&self, id: PositionId) -> Option<u64>;
}

/// Notifications the escrow sends before ownership or balance changes take effect.
///
/// Each call sees the escrow as it was before the change, so rewards can be
/// settled against the holder of record.
pub trait PositionHook {
    /// A position `id` is about to be minted in this transaction.
    fn on_mint(
        &mut self,
        source: &dyn VotingPowerSource,
        bank: &mut dyn TokenBank,
        ctx: &TxContext,
        id: PositionId,
    ) -> Result<(), RewardError>;

    /// `id` is about to move from `from` to `to`.
    fn before_transfer(
        &mut self,
        source: &dyn VotingPowerSource,
        bank: &mut dyn TokenBank,
        ctx: &TxContext,
        id: PositionId,
        from: &Address,
        to: &Address,
    ) -> Result<(), RewardError>;

    /// `id`, owned by `owner`, is about to be burned (withdraw, merge source, split source).
    fn before_burn(
        &mut self,
        source: &dyn VotingPowerSource,
        bank: &mut dyn TokenBank,
        ctx: &TxContext,
        id: PositionId,
        owner: &Address,
    ) -> Result<(), RewardError>;
}

/// A hook that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PositionHook for NoopHook {
    fn on_mint(
        &mut self,
        _source: &dyn VotingPowerSource,
        _bank: &mut dyn TokenBank,
        _ctx: &TxContext,
        _id: PositionId,
    ) -> Result<(), RewardError> {
        Ok(())
    }

    fn before_transfer(
        &mut self,
        _source: &dyn VotingPowerSource,
        _bank: &mut dyn TokenBank,
        _ctx: &TxContext,
        _id: PositionId,
        _from: &Address,
        _to: &Address,
    ) -> Result<(), RewardError> {
        Ok(())
    }

    fn before_burn(
        &mut self,
        _source: &dyn VotingPowerSource,
        _bank: &mut dyn TokenBank,
        _ctx: &TxContext,
        _id: PositionId,
        _owner: &Address,
    ) -> Result<(), RewardError> {
        Ok(())
    }
}
