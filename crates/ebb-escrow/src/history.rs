//! Point-in-time voting power queries over the recorded curves.

use ebb_core::constants::{MAX_CHECKPOINT_WALK, WEEK};
use ebb_core::time::epoch_start;
use ebb_core::types::{PositionId, TxContext};

use crate::escrow::VotingEscrow;

/// Index of the newest point with `ts <= t`, given a history whose entry 0
/// is a sentinel. 0 means `t` predates the history.
fn past_index<P>(history: &[P], t: u64, ts: impl Fn(&P) -> u64) -> usize {
    match history.get(1..) {
        Some(points) => points.partition_point(|p| ts(p) <= t),
        None => 0,
    }
}

impl VotingEscrow {
    /// Voting power of `id` at timestamp `t`.
    ///
    /// Reconstructed from the newest user point at or before `t`; burned
    /// positions keep answering for times before their burn.
    pub fn voting_power_at(&self, id: PositionId, t: u64) -> u128 {
        let Some(history) = self.state.user_point_history.get(&id) else {
            return 0;
        };
        let index = past_index(history, t, |p| p.ts);
        if index == 0 {
            return 0;
        }
        let point = history[index];
        let dt = i128::from(t - point.ts);
        let bias = point
            .bias
            .saturating_sub(point.slope.saturating_mul(dt))
            .max(0);
        (bias + point.permanent.max(0)) as u128
    }

    /// Voting power of `id` now.
    ///
    /// Zero during the block in which the position changed hands, so a
    /// position cannot be counted twice in one block.
    pub fn voting_power(&self, id: PositionId, ctx: &TxContext) -> u128 {
        if self.state.registry.ownership_change(id) == Some(ctx.block) {
            return 0;
        }
        self.voting_power_at(id, ctx.timestamp)
    }

    /// Total voting power at timestamp `t`.
    ///
    /// Re-walks the global curve week by week from the newest point at or
    /// before `t`, applying scheduled slope changes. The walk stops after
    /// [`MAX_CHECKPOINT_WALK`] weeks: every timed lock ends within a year of
    /// the newest point, so beyond that only permanent power remains.
    pub fn total_supply_at(&self, t: u64) -> u128 {
        let history = &self.state.point_history;
        let index = past_index(history, t, |p| p.ts);
        if index == 0 {
            return 0;
        }
        let mut point = history[index];
        let mut t_i = epoch_start(point.ts);
        for _ in 0..MAX_CHECKPOINT_WALK {
            t_i = t_i.saturating_add(WEEK);
            let mut d_slope = 0;
            if t_i > t {
                t_i = t;
            } else {
                d_slope = self.slope_change(t_i);
            }
            let dt = i128::from(t_i - point.ts);
            point.bias = point
                .bias
                .saturating_sub(point.slope.saturating_mul(dt))
                .max(0);
            if t_i == t {
                break;
            }
            point.slope = point.slope.saturating_add(d_slope).max(0);
            point.ts = t_i;
        }
        (point.bias + point.permanent_lock_balance.max(0)) as u128
    }

    /// Total voting power now.
    pub fn total_supply(&self, ctx: &TxContext) -> u128 {
        self.total_supply_at(ctx.timestamp)
    }
}
