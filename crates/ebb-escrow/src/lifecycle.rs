//! Lock lifecycle operations.
//!
//! Every entry point is guarded against re-entry and runs in the same order:
//! validate, notify the position hook, move tokens, then commit the new lock
//! and checkpoint it. A failure before the commit leaves the escrow unchanged.
//! Validation also checks the grown supply: every checkpoint value is bounded
//! by the supply, so once that fits in `i128` the commit cannot overflow.
//!
//! ```text
//! Unlocked ──create──▶ Active(timed) ◀──lock/unlock permanent──▶ Active(permanent)
//!                           │                                          │
//!                 withdraw / early withdraw / merge / split       early withdraw
//!                           ▼                                          ▼
//!                        Retired ◀─────────────────────────────────────┘
//! ```

use tracing::info;

use ebb_core::config::validate_penalty;
use ebb_core::constants::{BPS_PRECISION, MAX_LOCK_DURATION, MIN_LOCK_DURATION};
use ebb_core::error::EscrowError;
use ebb_core::events::{DepositKind, EscrowEvent};
use ebb_core::math::{mul_div, weighted_timestamp};
use ebb_core::time::{epoch_start, unlock_time};
use ebb_core::traits::{PositionHook, TokenBank};
use ebb_core::types::{Address, Lock, PositionId, TxContext};

use crate::escrow::VotingEscrow;

fn to_amount(amount: u128) -> Result<i128, EscrowError> {
    i128::try_from(amount).map_err(|_| EscrowError::ArithmeticOverflow)
}

impl VotingEscrow {
    // --- deposits ---

    /// Lock `amount` for `duration` seconds and mint a position to the caller.
    pub fn create_lock(
        &mut self,
        ctx: &TxContext,
        amount: u128,
        duration: u64,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<PositionId, EscrowError> {
        self.create_lock_for(ctx, amount, duration, ctx.sender, bank, hook)
    }

    /// Lock the caller's `amount` for `duration` seconds and mint the position to `to`.
    pub fn create_lock_for(
        &mut self,
        ctx: &TxContext,
        amount: u128,
        duration: u64,
        to: Address,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<PositionId, EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            if amount == 0 {
                return Err(EscrowError::ZeroAmount);
            }
            let minimum = this.state.config.min_lock_amount;
            if amount < minimum {
                return Err(EscrowError::AmountBelowMinimum { amount, minimum });
            }
            if to.is_zero() {
                return Err(EscrowError::ZeroAddress);
            }
            let now = ctx.timestamp;
            let end = unlock_time(now, duration);
            if end < now.saturating_add(MIN_LOCK_DURATION) {
                return Err(EscrowError::LockDurationTooShort);
            }
            if end > now.saturating_add(MAX_LOCK_DURATION) {
                return Err(EscrowError::LockDurationTooLong);
            }
            let value = to_amount(amount)?;
            this.grown_supply(value)?;
            this.require_funds(bank, &ctx.sender, amount)?;

            let id = this.state.next_id;
            hook.on_mint(&*this, bank, ctx, id)?;
            bank.transfer(&this.state.token, &ctx.sender, &this.state.account, amount)?;

            this.state.next_id += 1;
            this.state.registry.mint(to, id);
            let lock = Lock {
                amount: value,
                end,
                effective_start: now,
                is_permanent: false,
            };
            this.commit_deposit(ctx, id, value, Lock::default(), lock, DepositKind::CreateLock)?;
            info!(id, owner = %to, amount, end, "lock created");
            Ok(id)
        })
    }

    /// Add `amount` to the lock of `id`. Caller must be approved or owner.
    pub fn increase_amount(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            if amount == 0 {
                return Err(EscrowError::ZeroAmount);
            }
            this.require_approved(ctx, id)?;
            this.top_up(ctx, id, amount, DepositKind::IncreaseAmount, bank)
        })
    }

    /// Add the caller's `amount` to someone else's lock.
    pub fn deposit_for(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            if amount == 0 {
                return Err(EscrowError::ZeroAmount);
            }
            this.require_owner(id)?;
            this.top_up(ctx, id, amount, DepositKind::DepositFor, bank)
        })
    }

    fn top_up(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        amount: u128,
        kind: DepositKind,
        bank: &mut dyn TokenBank,
    ) -> Result<(), EscrowError> {
        let now = ctx.timestamp;
        let old = self.state.locks.get(id);
        if old.amount <= 0 {
            return Err(EscrowError::NoLockFound(id));
        }
        if !old.is_permanent {
            if old.end <= now {
                return Err(EscrowError::LockExpired(id));
            }
            if old.end < now.saturating_add(MIN_LOCK_DURATION) {
                return Err(EscrowError::LockExpiresTooSoon(id));
            }
        }
        let value = to_amount(amount)?;
        let new_amount = old.amount.checked_add(value).ok_or(EscrowError::ArithmeticOverflow)?;
        self.grown_supply(value)?;
        self.require_funds(bank, &ctx.sender, amount)?;
        bank.transfer(&self.state.token, &ctx.sender, &self.state.account, amount)?;

        let new = Lock {
            amount: new_amount,
            effective_start: weighted_timestamp(old.amount, old.effective_start, value, now),
            ..old
        };
        if new.is_permanent {
            self.state.permanent_lock_balance += value;
        }
        self.commit_deposit(ctx, id, value, old, new, kind)?;
        info!(id, amount, total = new_amount, "lock topped up");
        Ok(())
    }

    fn grown_supply(&self, value: i128) -> Result<i128, EscrowError> {
        self.state.supply.checked_add(value).ok_or(EscrowError::ArithmeticOverflow)
    }

    /// Store `new`, grow supply by `value`, checkpoint and emit.
    fn commit_deposit(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        value: i128,
        old: Lock,
        new: Lock,
        kind: DepositKind,
    ) -> Result<(), EscrowError> {
        let supply_before = self.state.supply;
        self.state.supply = self.grown_supply(value)?;
        self.state.locks.set(id, new);
        self.checkpoint_position(ctx, id, &old, &new)?;
        self.emit(EscrowEvent::Deposit {
            provider: ctx.sender,
            id,
            kind,
            value,
            amount_before: old.amount,
            amount_after: new.amount,
            locktime: new.end,
            ts: ctx.timestamp,
        });
        if value != 0 {
            self.emit(EscrowEvent::Supply {
                before: supply_before,
                after: self.state.supply,
            });
        }
        Ok(())
    }

    /// Move the unlock time of `id` to `epoch_start(now + duration)`.
    pub fn increase_unlock_time(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        duration: u64,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            this.require_approved(ctx, id)?;
            let now = ctx.timestamp;
            let old = this.state.locks.get(id);
            if old.is_permanent {
                return Err(EscrowError::PermanentLock(id));
            }
            if old.end <= now {
                return Err(EscrowError::LockExpired(id));
            }
            if old.amount <= 0 {
                return Err(EscrowError::NoLockFound(id));
            }
            let end = unlock_time(now, duration);
            if end <= old.end {
                return Err(EscrowError::LockDurationNotIncreasing);
            }
            if end > now.saturating_add(MAX_LOCK_DURATION) {
                return Err(EscrowError::LockDurationTooLong);
            }
            let new = Lock { end, ..old };
            this.commit_deposit(ctx, id, 0, old, new, DepositKind::IncreaseUnlockTime)?;
            info!(id, end, "unlock time extended");
            Ok(())
        })
    }

    // --- permanent locks ---

    /// Freeze `id` at full, non-decaying voting power.
    pub fn lock_permanent(&mut self, ctx: &TxContext, id: PositionId) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_approved(ctx, id)?;
            let old = this.state.locks.get(id);
            if old.is_permanent {
                return Err(EscrowError::PermanentLock(id));
            }
            if old.amount <= 0 {
                return Err(EscrowError::NoLockFound(id));
            }
            if old.end <= ctx.timestamp {
                return Err(EscrowError::LockExpired(id));
            }
            let new = Lock {
                end: 0,
                is_permanent: true,
                ..old
            };
            this.state.permanent_lock_balance += old.amount;
            this.state.locks.set(id, new);
            this.checkpoint_position(ctx, id, &old, &new)?;
            this.emit(EscrowEvent::LockPermanent {
                owner,
                id,
                amount: old.amount,
                ts: ctx.timestamp,
            });
            info!(id, amount = old.amount, "lock made permanent");
            Ok(())
        })
    }

    /// Turn a permanent lock back into a maximal timed lock starting now.
    pub fn unlock_permanent(&mut self, ctx: &TxContext, id: PositionId) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_approved(ctx, id)?;
            let old = this.state.locks.get(id);
            if !old.is_permanent {
                return Err(EscrowError::NotPermanentLock(id));
            }
            let new = unlocked(&old, ctx.timestamp);
            this.state.permanent_lock_balance -= old.amount;
            this.state.locks.set(id, new);
            this.checkpoint_position(ctx, id, &old, &new)?;
            this.emit(EscrowEvent::UnlockPermanent {
                owner,
                id,
                amount: old.amount,
                end: new.end,
                ts: ctx.timestamp,
            });
            info!(id, end = new.end, "permanent lock released");
            Ok(())
        })
    }

    // --- exits ---

    /// Return the principal of an expired lock to the owner and burn the position.
    pub fn withdraw(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<u128, EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_approved(ctx, id)?;
            let old = this.state.locks.get(id);
            if old.is_permanent {
                return Err(EscrowError::PermanentLock(id));
            }
            if ctx.timestamp < old.end {
                return Err(EscrowError::LockNotExpired { id, end: old.end });
            }
            let value = old.amount.max(0) as u128;

            hook.before_burn(&*this, bank, ctx, id, &owner)?;
            bank.transfer(&this.state.token, &this.state.account, &owner, value)?;

            this.retire(ctx, id, old)?;
            this.emit(EscrowEvent::Withdraw {
                provider: owner,
                id,
                value: old.amount,
                ts: ctx.timestamp,
            });
            info!(id, %owner, value, "lock withdrawn");
            Ok(value)
        })
    }

    /// Exit before expiry, paying a penalty to the treasury.
    ///
    /// The penalty is `vp * penalty_bps * remaining / (total * 10_000)`,
    /// where `remaining = end - now` and `total = end - effective_start`,
    /// capped at the principal. A permanent lock is first released into a
    /// maximal timed lock. Returns `(paid_to_owner, penalty)`.
    pub fn early_withdraw(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<(u128, u128), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_approved(ctx, id)?;
            let now = ctx.timestamp;
            let old = this.state.locks.get(id);
            if old.amount <= 0 {
                return Err(EscrowError::NoLockFound(id));
            }
            if old.is_expired(now) {
                return Err(EscrowError::LockExpired(id));
            }
            let working = if old.is_permanent { unlocked(&old, now) } else { old };

            let principal = old.amount as u128;
            let penalty = this.penalty(&working, now)?.min(principal);
            let payout = principal - penalty;
            let treasury = this.state.config.treasury;

            hook.before_burn(&*this, bank, ctx, id, &owner)?;
            if penalty > 0 {
                bank.transfer(&this.state.token, &this.state.account, &treasury, penalty)?;
            }
            if payout > 0 {
                bank.transfer(&this.state.token, &this.state.account, &owner, payout)?;
            }

            if old.is_permanent {
                this.state.permanent_lock_balance -= old.amount;
            }
            this.retire(ctx, id, old)?;
            this.emit(EscrowEvent::EarlyWithdraw {
                provider: owner,
                id,
                value: old.amount,
                penalty: penalty as i128,
                treasury,
                ts: now,
            });
            info!(id, %owner, payout, penalty, "lock withdrawn early");
            Ok((payout, penalty))
        })
    }

    fn penalty(&self, lock: &Lock, now: u64) -> Result<u128, EscrowError> {
        let total = lock.end.saturating_sub(lock.effective_start);
        if total == 0 {
            return Ok(0);
        }
        let remaining = lock.end.saturating_sub(now);
        let vp = lock.voting_power(now).max(0) as u128;
        let bps = u128::from(self.state.config.penalty_bps);
        mul_div(
            vp,
            bps * u128::from(remaining),
            u128::from(BPS_PRECISION) * u128::from(total),
        )
        .ok_or(EscrowError::ArithmeticOverflow)
    }

    /// Burn `id`, clear its lock, shrink supply and checkpoint it to empty.
    fn retire(&mut self, ctx: &TxContext, id: PositionId, old: Lock) -> Result<(), EscrowError> {
        let supply_before = self.state.supply;
        self.state.registry.burn(id);
        self.state.locks.clear(id);
        self.state.supply -= old.amount;
        self.checkpoint_position(ctx, id, &old, &Lock::default())?;
        self.emit(EscrowEvent::Supply {
            before: supply_before,
            after: self.state.supply,
        });
        Ok(())
    }

    // --- restructuring ---

    /// Fold position `from` into `to` and burn `from`.
    ///
    /// The merged lock keeps the later expiry, or stays permanent if `to` is.
    pub fn merge(
        &mut self,
        ctx: &TxContext,
        from: PositionId,
        to: PositionId,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            if from == to {
                return Err(EscrowError::SameNft);
            }
            let from_owner = this.require_approved(ctx, from)?;
            this.require_approved(ctx, to)?;
            let old_from = this.state.locks.get(from);
            let old_to = this.state.locks.get(to);
            if old_from.is_permanent {
                return Err(EscrowError::PermanentLock(from));
            }
            if old_from.amount <= 0 {
                return Err(EscrowError::NoLockFound(from));
            }
            if old_to.amount <= 0 {
                return Err(EscrowError::NoLockFound(to));
            }
            if old_to.is_expired(ctx.timestamp) {
                return Err(EscrowError::LockExpired(to));
            }
            let amount = old_to
                .amount
                .checked_add(old_from.amount)
                .ok_or(EscrowError::ArithmeticOverflow)?;
            let new_to = Lock {
                amount,
                end: if old_to.is_permanent { 0 } else { old_to.end.max(old_from.end) },
                effective_start: weighted_timestamp(
                    old_to.amount,
                    old_to.effective_start,
                    old_from.amount,
                    old_from.effective_start,
                ),
                is_permanent: old_to.is_permanent,
            };

            hook.before_burn(&*this, bank, ctx, from, &from_owner)?;

            this.state.registry.burn(from);
            this.state.locks.clear(from);
            this.checkpoint_position(ctx, from, &old_from, &Lock::default())?;
            if new_to.is_permanent {
                this.state.permanent_lock_balance += old_from.amount;
            }
            this.state.locks.set(to, new_to);
            this.checkpoint_position(ctx, to, &old_to, &new_to)?;
            this.emit(EscrowEvent::Merge {
                sender: ctx.sender,
                from,
                to,
                amount_from: old_from.amount,
                amount_to: old_to.amount,
                amount_final: amount,
                locktime: new_to.end,
                ts: ctx.timestamp,
            });
            info!(from, to, amount, "positions merged");
            Ok(())
        })
    }

    /// Split `amount` off position `from` into a new position.
    ///
    /// Burns `from` and mints two positions to its owner holding
    /// `locked - amount` and `amount`, both with the original expiry.
    /// Returns the two new ids.
    pub fn split(
        &mut self,
        ctx: &TxContext,
        from: PositionId,
        amount: u128,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<(PositionId, PositionId), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_owner(from)?;
            if !this.can_split(&owner) {
                return Err(EscrowError::SplitNotAllowed(owner));
            }
            this.require_approved(ctx, from)?;
            let old = this.state.locks.get(from);
            if old.is_permanent {
                return Err(EscrowError::PermanentLock(from));
            }
            if old.end <= ctx.timestamp {
                return Err(EscrowError::LockExpired(from));
            }
            if amount == 0 {
                return Err(EscrowError::ZeroAmount);
            }
            let value = to_amount(amount)?;
            if value >= old.amount {
                return Err(EscrowError::AmountTooBig);
            }
            let id1 = this.state.next_id;
            let id2 = id1 + 1;

            hook.before_burn(&*this, bank, ctx, from, &owner)?;
            hook.on_mint(&*this, bank, ctx, id1)?;
            hook.on_mint(&*this, bank, ctx, id2)?;

            this.state.registry.burn(from);
            this.state.locks.clear(from);
            this.checkpoint_position(ctx, from, &old, &Lock::default())?;

            this.state.next_id += 2;
            for (id, part) in [(id1, old.amount - value), (id2, value)] {
                let lock = Lock { amount: part, ..old };
                this.state.registry.mint(owner, id);
                this.state.locks.set(id, lock);
                this.checkpoint_position(ctx, id, &Lock::default(), &lock)?;
            }
            this.emit(EscrowEvent::Split {
                sender: ctx.sender,
                from,
                id1,
                id2,
                amount1: old.amount - value,
                amount2: value,
                locktime: old.end,
                ts: ctx.timestamp,
            });
            info!(from, id1, id2, amount, "position split");
            Ok((id1, id2))
        })
    }

    // --- ownership ---

    /// Move `id` from `from` to `to`, settling its rewards first.
    pub fn transfer_from(
        &mut self,
        ctx: &TxContext,
        from: Address,
        to: Address,
        id: PositionId,
        bank: &mut dyn TokenBank,
        hook: &mut dyn PositionHook,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            let owner = this.require_owner(id)?;
            if owner != from {
                return Err(EscrowError::NotOwnerOf { from, id });
            }
            if to.is_zero() {
                return Err(EscrowError::ZeroAddress);
            }
            this.require_approved(ctx, id)?;

            hook.before_transfer(&*this, bank, ctx, id, &from, &to)?;

            this.state.registry.transfer(to, id, ctx.block);
            this.emit(EscrowEvent::Transfer { from, to, id });
            info!(id, %from, %to, "position transferred");
            Ok(())
        })
    }

    /// Approve `spender` for `id`, or clear the approval with `None`.
    pub fn approve(
        &mut self,
        ctx: &TxContext,
        spender: Option<Address>,
        id: PositionId,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            let owner = this.require_owner(id)?;
            if ctx.sender != owner
                && !this.state.registry.is_approved_for_all(&owner, &ctx.sender)
            {
                return Err(EscrowError::NotApprovedOrOwner(id));
            }
            this.state.registry.approve(id, spender);
            Ok(())
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        ctx: &TxContext,
        operator: Address,
        approved: bool,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            if operator.is_zero() {
                return Err(EscrowError::ZeroAddress);
            }
            this.state.registry.set_approval_for_all(ctx.sender, operator, approved);
            Ok(())
        })
    }

    // --- admin ---

    /// Allow or forbid splitting for `account`; the zero address is the global switch.
    pub fn toggle_split(
        &mut self,
        ctx: &TxContext,
        account: Address,
        allowed: bool,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.require_admin(ctx)?;
            this.state.split_allowed.insert(account, allowed);
            this.emit(EscrowEvent::ToggleSplit { account, allowed });
            info!(%account, allowed, "split permission changed");
            Ok(())
        })
    }

    pub fn set_treasury(&mut self, ctx: &TxContext, treasury: Address) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.require_admin(ctx)?;
            if treasury.is_zero() {
                return Err(EscrowError::ZeroAddress);
            }
            this.state.config.treasury = treasury;
            this.config_updated("treasury", treasury.to_string());
            Ok(())
        })
    }

    pub fn set_penalty_bps(&mut self, ctx: &TxContext, bps: u64) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.require_admin(ctx)?;
            validate_penalty(bps)?;
            this.state.config.penalty_bps = bps;
            this.config_updated("penalty_bps", bps.to_string());
            Ok(())
        })
    }

    pub fn set_min_lock_amount(
        &mut self,
        ctx: &TxContext,
        amount: u128,
    ) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.require_admin(ctx)?;
            this.state.config.min_lock_amount = amount;
            this.config_updated("min_lock_amount", amount.to_string());
            Ok(())
        })
    }

    pub fn set_admin(&mut self, ctx: &TxContext, admin: Address) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.require_admin(ctx)?;
            if admin.is_zero() {
                return Err(EscrowError::ZeroAddress);
            }
            this.state.config.admin = admin;
            this.config_updated("admin", admin.to_string());
            Ok(())
        })
    }

    fn config_updated(&mut self, field: &str, value: String) {
        info!(field, %value, "escrow config updated");
        self.emit(EscrowEvent::ConfigUpdated {
            field: field.to_string(),
            value,
        });
    }
}

/// `lock` released from permanence into a maximal timed lock starting at `now`.
fn unlocked(lock: &Lock, now: u64) -> Lock {
    Lock {
        amount: lock.amount,
        end: epoch_start(now.saturating_add(MAX_LOCK_DURATION)),
        effective_start: now,
        is_permanent: false,
    }
}
