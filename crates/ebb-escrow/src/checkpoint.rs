//! Checkpoint engine: keeps the global and per-position curves in step with
//! every lock change.
//!
//! A lock contributes `slope = amount / MAX_LOCK_DURATION` and
//! `bias = slope * (end - now)` while it is timed and unexpired. The global
//! curve is stored as a sequence of points plus a schedule of slope changes
//! at week boundaries, which the walk applies as it crosses them.

use tracing::{debug, warn};

use ebb_core::constants::{BLOCK_SLOPE_PRECISION, HEARTBEAT_POSITION, MAX_CHECKPOINT_WALK, WEEK};
use ebb_core::error::EscrowError;
use ebb_core::math::mul_div;
use ebb_core::time::epoch_start;
use ebb_core::types::{GlobalPoint, Lock, PositionId, TxContext, UserPoint};

use crate::escrow::VotingEscrow;

fn overflow() -> EscrowError {
    EscrowError::ArithmeticOverflow
}

/// `bias - slope * dt`, without flooring.
fn decay(bias: i128, slope: i128, dt: u64) -> Result<i128, EscrowError> {
    slope
        .checked_mul(i128::from(dt))
        .and_then(|d| bias.checked_sub(d))
        .ok_or_else(overflow)
}

impl VotingEscrow {
    /// Record a global checkpoint without touching any position.
    pub fn checkpoint(&mut self, ctx: &TxContext) -> Result<(), EscrowError> {
        self.guarded(|this| {
            this.check_time(ctx)?;
            this.checkpoint_position(ctx, HEARTBEAT_POSITION, &Lock::default(), &Lock::default())
        })
    }

    /// Apply the change of `id` from `old` to `new` to both curves.
    ///
    /// The caller has already stored `new` and updated the permanent balance.
    /// Position 0 only advances the global curve.
    pub(crate) fn checkpoint_position(
        &mut self,
        ctx: &TxContext,
        id: PositionId,
        old: &Lock,
        new: &Lock,
    ) -> Result<(), EscrowError> {
        let now = ctx.timestamp;
        let mut u_old = UserPoint::default();
        let mut u_new = UserPoint::default();
        let mut old_dslope = 0i128;
        let mut new_dslope = 0i128;

        if id != HEARTBEAT_POSITION {
            (u_old.slope, u_old.bias) = old.decay_terms(now);
            (u_new.slope, u_new.bias) = new.decay_terms(now);

            old_dslope = self.slope_change(old.end);
            if new.end != 0 {
                new_dslope = if new.end == old.end {
                    old_dslope
                } else {
                    self.slope_change(new.end)
                };
            }
        }

        let mut next_epoch = self.epoch();
        let mut last_point = if next_epoch > 0 {
            self.last_global_point()
        } else {
            GlobalPoint {
                ts: now,
                blk: ctx.block,
                ..Default::default()
            }
        };
        let initial = last_point;
        let mut last_checkpoint = last_point.ts;

        let block_slope = if now > last_point.ts {
            mul_div(
                BLOCK_SLOPE_PRECISION,
                u128::from(ctx.block.saturating_sub(last_point.blk)),
                u128::from(now - last_point.ts),
            )
            .ok_or_else(overflow)?
        } else {
            0
        };

        // Walk the global curve forward one week at a time.
        let mut t_i = epoch_start(last_checkpoint);
        let mut reached_now = false;
        for _ in 0..MAX_CHECKPOINT_WALK {
            t_i += WEEK;
            let mut d_slope = 0;
            if t_i > now {
                t_i = now;
            } else {
                d_slope = self.slope_change(t_i);
            }
            last_point.bias = decay(last_point.bias, last_point.slope, t_i - last_checkpoint)?;
            last_point.slope = last_point.slope.checked_add(d_slope).ok_or_else(overflow)?;
            last_point.bias = last_point.bias.max(0);
            last_point.slope = last_point.slope.max(0);

            last_checkpoint = t_i;
            last_point.ts = t_i;
            let elapsed = mul_div(block_slope, u128::from(t_i - initial.ts), BLOCK_SLOPE_PRECISION)
                .ok_or_else(overflow)?;
            last_point.blk = initial
                .blk
                .checked_add(u64::try_from(elapsed).map_err(|_| overflow())?)
                .ok_or_else(overflow)?;
            next_epoch += 1;

            if t_i == now {
                last_point.blk = ctx.block;
                reached_now = true;
                break;
            }
            self.put_global_point(next_epoch, last_point);
        }
        if !reached_now {
            warn!(
                reached = last_point.ts,
                now,
                "checkpoint walk hit its iteration cap; global history lags behind"
            );
        }

        if id != HEARTBEAT_POSITION {
            last_point.slope = last_point
                .slope
                .checked_add(u_new.slope - u_old.slope)
                .ok_or_else(overflow)?;
            last_point.bias = last_point
                .bias
                .checked_add(u_new.bias - u_old.bias)
                .ok_or_else(overflow)?;
            last_point.slope = last_point.slope.max(0);
            last_point.bias = last_point.bias.max(0);
            last_point.permanent_lock_balance = self.state.permanent_lock_balance;
        }

        // Same-timestamp writes replace the newest point; genesis is never replaced.
        if next_epoch != 1 && self.state.point_history[next_epoch - 1].ts == now {
            self.put_global_point(next_epoch - 1, last_point);
        } else {
            self.put_global_point(next_epoch, last_point);
        }

        if id == HEARTBEAT_POSITION {
            debug!(epoch = self.epoch(), ts = now, "heartbeat checkpoint");
            return Ok(());
        }

        if old.end > now {
            old_dslope += u_old.slope;
            if new.end == old.end {
                old_dslope -= u_new.slope;
            }
            self.state.slope_changes.insert(old.end, old_dslope);
        }
        if new.end > now && new.end > old.end {
            new_dslope -= u_new.slope;
            self.state.slope_changes.insert(new.end, new_dslope);
        }

        u_new.ts = now;
        u_new.blk = ctx.block;
        u_new.permanent = if new.is_permanent { new.amount } else { 0 };
        let history = self
            .state
            .user_point_history
            .entry(id)
            .or_insert_with(|| vec![UserPoint::default()]);
        let overwrite = history.len() > 1 && history.last().is_some_and(|p| p.ts == now);
        if overwrite {
            if let Some(last) = history.last_mut() {
                *last = u_new;
            }
        } else {
            history.push(u_new);
        }

        debug!(
            id,
            epoch = self.epoch(),
            bias = u_new.bias,
            slope = u_new.slope,
            permanent = u_new.permanent,
            "position checkpoint"
        );
        Ok(())
    }

    /// Write the global point at `index`, appending when it is one past the end.
    fn put_global_point(&mut self, index: usize, point: GlobalPoint) {
        let history = &mut self.state.point_history;
        if index < history.len() {
            history[index] = point;
        } else {
            history.push(point);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::config::EscrowConfig;
    use ebb_core::constants::{MAX_LOCK_DURATION, MAX_LOCK_DURATION_I128, UNIT};
    use ebb_core::types::Address;

    const T0: u64 = 1_699_488_000;

    fn escrow() -> VotingEscrow {
        VotingEscrow::new(
            EscrowConfig::default(),
            Address::from_label("tok"),
            Address::from_label("escrow"),
        )
        .unwrap()
    }

    fn ctx(t: u64) -> TxContext {
        TxContext::new(Address::from_label("alice"), t, t / 12)
    }

    fn timed(amount: i128, end: u64, start: u64) -> Lock {
        Lock {
            amount,
            end,
            effective_start: start,
            is_permanent: false,
        }
    }

    #[test]
    fn first_heartbeat_writes_index_one() {
        let mut ve = escrow();
        ve.checkpoint(&ctx(T0 + 5)).unwrap();
        assert_eq!(ve.epoch(), 1);
        let p = ve.global_point(1).unwrap();
        assert_eq!(p.ts, T0 + 5);
        assert_eq!(p.blk, (T0 + 5) / 12);
        assert_eq!(ve.global_point(0), Some(GlobalPoint::default()));
    }

    #[test]
    fn heartbeat_same_timestamp_is_idempotent() {
        let mut ve = escrow();
        ve.checkpoint(&ctx(T0)).unwrap();
        ve.checkpoint(&ctx(T0 + 3 * WEEK)).unwrap();
        let epoch = ve.epoch();
        let point = ve.global_point(epoch).unwrap();
        ve.checkpoint(&ctx(T0 + 3 * WEEK)).unwrap();
        assert_eq!(ve.epoch(), epoch);
        assert_eq!(ve.global_point(epoch), Some(point));
    }

    #[test]
    fn walk_writes_one_point_per_week() {
        let mut ve = escrow();
        ve.checkpoint(&ctx(T0)).unwrap();
        ve.checkpoint(&ctx(T0 + 3 * WEEK + 10)).unwrap();
        // Genesis, T0, three boundaries, then the current point.
        assert_eq!(ve.epoch(), 5);
        assert_eq!(ve.global_point(2).unwrap().ts, T0 + WEEK);
        assert_eq!(ve.global_point(4).unwrap().ts, T0 + 3 * WEEK);
        assert_eq!(ve.global_point(5).unwrap().ts, T0 + 3 * WEEK + 10);
    }

    #[test]
    fn interpolates_block_numbers() {
        let mut ve = escrow();
        ve.checkpoint(&TxContext::new(Address::ZERO, T0, 1_000)).unwrap();
        ve.checkpoint(&TxContext::new(Address::ZERO, T0 + 2 * WEEK, 4_780)).unwrap();
        assert_eq!(ve.global_point(2).unwrap().blk, 2_890);
        assert_eq!(ve.global_point(3).unwrap().blk, 4_780);
    }

    #[test]
    fn position_checkpoint_schedules_slope_change() {
        let mut ve = escrow();
        let end = T0 + 10 * WEEK;
        let lock = timed(100 * UNIT, end, T0);
        ve.state.locks.set(1, lock);
        ve.checkpoint_position(&ctx(T0), 1, &Lock::default(), &lock).unwrap();

        let slope = 100 * UNIT / MAX_LOCK_DURATION_I128;
        assert_eq!(ve.slope_change(end), -slope);
        let g = ve.global_point(ve.epoch()).unwrap();
        assert_eq!(g.slope, slope);
        assert_eq!(g.bias, slope * (10 * WEEK) as i128);
        assert_eq!(ve.user_point_epoch(1), 1);
        assert_eq!(ve.user_point(1, 1).unwrap().bias, g.bias);
    }

    #[test]
    fn extending_moves_slope_change() {
        let mut ve = escrow();
        let old = timed(100 * UNIT, T0 + 10 * WEEK, T0);
        let new = Lock { end: T0 + 20 * WEEK, ..old };
        ve.checkpoint_position(&ctx(T0), 1, &Lock::default(), &old).unwrap();
        ve.checkpoint_position(&ctx(T0 + 100), 1, &old, &new).unwrap();
        assert_eq!(ve.slope_change(old.end), 0);
        assert_eq!(ve.slope_change(new.end), -(100 * UNIT / MAX_LOCK_DURATION_I128));
        // Two points: creation and extension.
        assert_eq!(ve.user_point_epoch(1), 2);
    }

    #[test]
    fn same_timestamp_user_point_overwritten() {
        let mut ve = escrow();
        let a = timed(100 * UNIT, T0 + 10 * WEEK, T0);
        let b = Lock { amount: 150 * UNIT, ..a };
        ve.checkpoint_position(&ctx(T0), 1, &Lock::default(), &a).unwrap();
        ve.checkpoint_position(&ctx(T0), 1, &a, &b).unwrap();
        assert_eq!(ve.user_point_epoch(1), 1);
        let slope = 150 * UNIT / MAX_LOCK_DURATION_I128;
        assert_eq!(ve.user_point(1, 1).unwrap().slope, slope);
        assert_eq!(ve.slope_change(a.end), -slope);
    }

    #[test]
    fn permanent_point_carries_amount() {
        let mut ve = escrow();
        let lock = Lock {
            amount: 40 * UNIT,
            end: 0,
            effective_start: T0,
            is_permanent: true,
        };
        ve.state.permanent_lock_balance = 40 * UNIT;
        ve.checkpoint_position(&ctx(T0), 1, &Lock::default(), &lock).unwrap();
        let u = ve.user_point(1, 1).unwrap();
        assert_eq!((u.bias, u.slope, u.permanent), (0, 0, 40 * UNIT));
        assert_eq!(ve.global_point(ve.epoch()).unwrap().permanent_lock_balance, 40 * UNIT);
    }

    #[test]
    fn walk_is_capped() {
        let mut ve = escrow();
        ve.checkpoint(&ctx(T0)).unwrap();
        let far = T0 + 300 * WEEK;
        ve.checkpoint(&ctx(far)).unwrap();
        // 255 weekly points, the last of which is reused as the final write.
        assert_eq!(ve.epoch(), 1 + MAX_CHECKPOINT_WALK);
        let last = ve.global_point(ve.epoch()).unwrap();
        assert_eq!(last.ts, T0 + MAX_CHECKPOINT_WALK as u64 * WEEK);
        assert!(last.ts < far);
    }

    #[test]
    fn bias_floors_at_zero_after_expiry() {
        let mut ve = escrow();
        let lock = timed(100 * UNIT, T0 + 5 * WEEK, T0);
        ve.checkpoint_position(&ctx(T0), 1, &Lock::default(), &lock).unwrap();
        ve.checkpoint(&ctx(T0 + MAX_LOCK_DURATION)).unwrap();
        let g = ve.global_point(ve.epoch()).unwrap();
        assert_eq!((g.bias, g.slope), (0, 0));
    }

    #[test]
    fn regressing_timestamp_rejected() {
        let mut ve = escrow();
        ve.checkpoint(&ctx(T0 + 10)).unwrap();
        let err = ve.checkpoint(&ctx(T0)).unwrap_err();
        assert_eq!(err, EscrowError::TimestampRegression { last: T0 + 10, got: T0 });
    }
}
