//! The composed ledger: one escrow, one reward distributor and the token
//! bank they both settle through.
//!
//! The reward distributor is wired in as the escrow's position hook, so
//! rewards are settled to the holder of record before every transfer and
//! burn.

use serde::Serialize;
use tracing::info;

use ebb_core::bank::MemoryTokenBank;
use ebb_core::error::EbbError;
use ebb_core::events::{EscrowEvent, RewardEvent};
use ebb_core::traits::TokenBank;
use ebb_core::types::{Address, PositionId, TxContext};
use ebb_escrow::VotingEscrow;
use ebb_rewards::RewardDistributor;

use crate::config::LedgerConfig;

/// Label of the account that holds locked principal.
pub const ESCROW_ACCOUNT_LABEL: &str = "ebb.escrow";
/// Label of the account that holds undistributed rewards.
pub const REWARDS_ACCOUNT_LABEL: &str = "ebb.rewards";

/// An event from either engine, in the order it was recorded.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Escrow(EscrowEvent),
    Reward(RewardEvent),
}

#[derive(Debug, Clone)]
pub struct Ledger<B: TokenBank = MemoryTokenBank> {
    escrow: VotingEscrow,
    rewards: RewardDistributor,
    bank: B,
}

impl Ledger<MemoryTokenBank> {
    /// A ledger over a fresh in-memory bank.
    pub fn in_memory(config: LedgerConfig) -> Result<Self, EbbError> {
        Self::new(config, MemoryTokenBank::new())
    }
}

impl<B: TokenBank> Ledger<B> {
    pub fn new(config: LedgerConfig, bank: B) -> Result<Self, EbbError> {
        config.validate()?;
        let escrow = VotingEscrow::new(
            config.escrow,
            config.token,
            Address::from_label(ESCROW_ACCOUNT_LABEL),
        )?;
        let rewards =
            RewardDistributor::new(config.rewards, Address::from_label(REWARDS_ACCOUNT_LABEL))?;
        info!(token = %config.token, "ledger ready");
        Ok(Self { escrow, rewards, bank })
    }

    /// Reassemble a ledger around a restored escrow.
    pub fn from_parts(escrow: VotingEscrow, rewards: RewardDistributor, bank: B) -> Self {
        Self { escrow, rewards, bank }
    }

    pub fn escrow(&self) -> &VotingEscrow {
        &self.escrow
    }

    pub fn rewards(&self) -> &RewardDistributor {
        &self.rewards
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Direct access to the bank, for funding accounts outside any ledger operation.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Reward events first, since hooks run before the escrow commits.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        let mut events: Vec<LedgerEvent> = self
            .rewards
            .drain_events()
            .into_iter()
            .map(LedgerEvent::Reward)
            .collect();
        events.extend(self.escrow.drain_events().into_iter().map(LedgerEvent::Escrow));
        events
    }

    // --- escrow ---

    pub fn create_lock(
        &mut self,
        ctx: &TxContext,
        amount: u128,
        duration: u64,
    ) -> Result<PositionId, EbbError> {
        Ok(self
            .escrow
            .create_lock(ctx, amount, duration, &mut self.bank, &mut self.rewards)?)
    }

    pub fn create_lock_for(
        &mut self,
        ctx: &TxContext,
        amount: u128,
        duration: u64,
        to: Address,
    ) -> Result<PositionId, EbbError> {
        Ok(self
            .escrow
            .create_lock_for(ctx, amount, duration, to, &mut self.bank, &mut self.rewards)?)
    }

    pub fn increase_amount(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        amount: u128,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.increase_amount(ctx, id, amount, &mut self.bank)?)
    }

    pub fn deposit_for(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        amount: u128,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.deposit_for(ctx, id, amount, &mut self.bank)?)
    }

    pub fn increase_unlock_time(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        duration: u64,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.increase_unlock_time(ctx, id, duration)?)
    }

    pub fn lock_permanent(&mut self, ctx: &TxContext, id: PositionId) -> Result<(), EbbError> {
        Ok(self.escrow.lock_permanent(ctx, id)?)
    }

    pub fn unlock_permanent(&mut self, ctx: &TxContext, id: PositionId) -> Result<(), EbbError> {
        Ok(self.escrow.unlock_permanent(ctx, id)?)
    }

    pub fn withdraw(&mut self, ctx: &TxContext, id: PositionId) -> Result<u128, EbbError> {
        Ok(self.escrow.withdraw(ctx, id, &mut self.bank, &mut self.rewards)?)
    }

    pub fn early_withdraw(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
    ) -> Result<(u128, u128), EbbError> {
        Ok(self.escrow.early_withdraw(ctx, id, &mut self.bank, &mut self.rewards)?)
    }

    pub fn merge(
        &mut self,
        ctx: &TxContext,
        from: PositionId,
        to: PositionId,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.merge(ctx, from, to, &mut self.bank, &mut self.rewards)?)
    }

    pub fn split(
        &mut self,
        ctx: &TxContext,
        from: PositionId,
        amount: u128,
    ) -> Result<(PositionId, PositionId), EbbError> {
        Ok(self.escrow.split(ctx, from, amount, &mut self.bank, &mut self.rewards)?)
    }

    pub fn transfer_from(
        &mut self,
        ctx: &TxContext,
        from: Address,
        to: Address,
        id: PositionId,
    ) -> Result<(), EbbError> {
        Ok(self
            .escrow
            .transfer_from(ctx, from, to, id, &mut self.bank, &mut self.rewards)?)
    }

    pub fn approve(
        &mut self,
        ctx: &TxContext,
        spender: Option<Address>,
        id: PositionId,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.approve(ctx, spender, id)?)
    }

    pub fn set_approval_for_all(
        &mut self,
        ctx: &TxContext,
        operator: Address,
        approved: bool,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.set_approval_for_all(ctx, operator, approved)?)
    }

    pub fn checkpoint(&mut self, ctx: &TxContext) -> Result<(), EbbError> {
        Ok(self.escrow.checkpoint(ctx)?)
    }

    pub fn toggle_split(
        &mut self,
        ctx: &TxContext,
        account: Address,
        allowed: bool,
    ) -> Result<(), EbbError> {
        Ok(self.escrow.toggle_split(ctx, account, allowed)?)
    }

    pub fn set_treasury(&mut self, ctx: &TxContext, treasury: Address) -> Result<(), EbbError> {
        Ok(self.escrow.set_treasury(ctx, treasury)?)
    }

    pub fn set_penalty_bps(&mut self, ctx: &TxContext, bps: u64) -> Result<(), EbbError> {
        Ok(self.escrow.set_penalty_bps(ctx, bps)?)
    }

    pub fn set_min_lock_amount(&mut self, ctx: &TxContext, amount: u128) -> Result<(), EbbError> {
        Ok(self.escrow.set_min_lock_amount(ctx, amount)?)
    }

    pub fn set_admin(&mut self, ctx: &TxContext, admin: Address) -> Result<(), EbbError> {
        Ok(self.escrow.set_admin(ctx, admin)?)
    }

    // --- escrow queries ---

    pub fn voting_power(&self, id: PositionId, ctx: &TxContext) -> u128 {
        self.escrow.voting_power(id, ctx)
    }

    pub fn voting_power_at(&self, id: PositionId, t: u64) -> u128 {
        self.escrow.voting_power_at(id, t)
    }

    pub fn total_supply_at(&self, t: u64) -> u128 {
        self.escrow.total_supply_at(t)
    }

    // --- rewards ---

    pub fn notify_reward(
        &mut self,
        ctx: &TxContext,
        token: Address,
        amount: u128,
    ) -> Result<(), EbbError> {
        Ok(self.rewards.notify(ctx, &mut self.bank, token, amount)?)
    }

    pub fn earned(
        &self,
        ctx: &TxContext,
        token: &Address,
        id: PositionId,
        through: u64,
    ) -> Result<u128, EbbError> {
        Ok(self.rewards.earned(&self.escrow, ctx, token, id, through)?)
    }

    pub fn claim(
        &mut self,
        ctx: &TxContext,
        token: Address,
        id: PositionId,
        through: u64,
    ) -> Result<u128, EbbError> {
        Ok(self
            .rewards
            .claim(ctx, &self.escrow, &mut self.bank, token, id, through)?)
    }

    pub fn claim_many(
        &mut self,
        ctx: &TxContext,
        tokens: &[Address],
        id: PositionId,
    ) -> Result<Vec<u128>, EbbError> {
        Ok(self
            .rewards
            .claim_many(ctx, &self.escrow, &mut self.bank, tokens, id)?)
    }

    pub fn set_reward_receiver(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        receiver: Address,
    ) -> Result<(), EbbError> {
        Ok(self.rewards.set_reward_receiver(ctx, &self.escrow, id, receiver)?)
    }

    pub fn clear_reward_receiver(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
    ) -> Result<(), EbbError> {
        Ok(self.rewards.clear_reward_receiver(ctx, &self.escrow, id)?)
    }

    pub fn recover_unaccounted_balance(
        &mut self,
        ctx: &TxContext,
        token: Address,
    ) -> Result<u128, EbbError> {
        Ok(self.rewards.recover_unaccounted_balance(ctx, &mut self.bank, token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::constants::{UNIT, WEEK};
    use ebb_core::error::{EscrowError, RewardError};

    const T0: u64 = 1_699_488_000;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    fn usdc() -> Address {
        Address::from_label("usdc")
    }

    fn ctx(sender: Address, t: u64) -> TxContext {
        TxContext::new(sender, t, t / 12)
    }

    fn ledger() -> Ledger {
        let cfg = LedgerConfig::default();
        let token = cfg.token;
        let mut ledger = Ledger::in_memory(cfg).unwrap();
        for who in [alice(), bob()] {
            ledger.bank_mut().mint(&token, &who, 10_000 * UNIT as u128).unwrap();
            ledger.bank_mut().mint(&usdc(), &who, 10_000 * UNIT as u128).unwrap();
        }
        ledger
    }

    #[test]
    fn lock_notify_claim() {
        let mut l = ledger();
        let id = l.create_lock(&ctx(alice(), T0), 1_000 * UNIT as u128, 52 * WEEK).unwrap();
        l.notify_reward(&ctx(bob(), T0), usdc(), 700 * UNIT as u128).unwrap();
        let c = ctx(alice(), T0 + WEEK);
        assert_eq!(l.claim(&c, usdc(), id, c.timestamp).unwrap(), 700 * UNIT as u128);
    }

    #[test]
    fn transfer_settles_to_previous_owner() {
        let mut l = ledger();
        let id = l.create_lock(&ctx(alice(), T0), 1_000 * UNIT as u128, 52 * WEEK).unwrap();
        l.notify_reward(&ctx(bob(), T0), usdc(), 700 * UNIT as u128).unwrap();
        let before = l.bank().balance_of(&usdc(), &alice());
        l.transfer_from(&ctx(alice(), T0 + WEEK + 5), alice(), bob(), id).unwrap();
        assert_eq!(l.bank().balance_of(&usdc(), &alice()) - before, 700 * UNIT as u128);
        let c = ctx(bob(), T0 + 2 * WEEK);
        assert_eq!(l.claim(&c, usdc(), id, c.timestamp).unwrap(), 0);
    }

    #[test]
    fn withdraw_settles_before_burn() {
        let mut l = ledger();
        let id = l.create_lock(&ctx(alice(), T0), 100 * UNIT as u128, 4 * WEEK).unwrap();
        l.notify_reward(&ctx(bob(), T0), usdc(), 50 * UNIT as u128).unwrap();
        let before = l.bank().balance_of(&usdc(), &alice());
        l.withdraw(&ctx(alice(), T0 + 4 * WEEK), id).unwrap();
        assert_eq!(l.bank().balance_of(&usdc(), &alice()) - before, 50 * UNIT as u128);
        // Burned positions can no longer be claimed by anyone.
        let err = l.claim(&ctx(alice(), T0 + 5 * WEEK), usdc(), id, T0 + 5 * WEEK).unwrap_err();
        assert!(matches!(err, EbbError::Reward(RewardError::NonexistentPosition(_))));
    }

    #[test]
    fn errors_surface_through_umbrella() {
        let mut l = ledger();
        let err = l.create_lock(&ctx(alice(), T0), 0, 52 * WEEK).unwrap_err();
        assert!(matches!(err, EbbError::Escrow(EscrowError::ZeroAmount)));
    }

    #[test]
    fn drain_orders_reward_events_first() {
        let mut l = ledger();
        let id = l.create_lock(&ctx(alice(), T0), 100 * UNIT as u128, 52 * WEEK).unwrap();
        l.notify_reward(&ctx(bob(), T0), usdc(), 10).unwrap();
        l.drain_events();
        l.transfer_from(&ctx(alice(), T0 + WEEK), alice(), bob(), id).unwrap();
        let events = l.drain_events();
        assert!(matches!(
            events.first(),
            Some(LedgerEvent::Reward(RewardEvent::ClaimRewards { .. }))
        ));
        assert!(matches!(events.last(), Some(LedgerEvent::Escrow(EscrowEvent::Transfer { .. }))));
    }
}
