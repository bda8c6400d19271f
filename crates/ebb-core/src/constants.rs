//! Protocol constants. Token amounts are in base units (1 token = 10^18 units).

/// One whole token in base units.
pub const UNIT: i128 = 1_000_000_000_000_000_000;

pub const DAY: u64 = 86_400;

/// Length of a reward epoch and of one step of the checkpoint walk.
pub const WEEK: u64 = 7 * DAY;

/// Shortest lock a position may be created or topped up with.
pub const MIN_LOCK_DURATION: u64 = 28 * DAY;

/// Longest lock; a lock of this length starts with voting power equal to its amount.
pub const MAX_LOCK_DURATION: u64 = 365 * DAY;

/// Maximum number of weekly steps a single checkpoint call walks the global
/// curve forward (about 4.9 years).
///
/// After a longer dormancy the global history is only advanced by this many
/// weeks per call; withdrawals are unaffected.
pub const MAX_CHECKPOINT_WALK: usize = 255;

/// Fixed-point scale used to interpolate block numbers between global points.
pub const BLOCK_SLOPE_PRECISION: u128 = 1_000_000_000_000_000_000;

pub const BPS_PRECISION: u64 = 10_000;

/// Early-withdraw penalty applied when no configuration overrides it (50%).
pub const DEFAULT_PENALTY_BPS: u64 = 5_000;

/// Position id reserved for heartbeat checkpoints that only advance the global curve.
pub const HEARTBEAT_POSITION: u64 = 0;

/// `MAX_LOCK_DURATION` as a signed divisor for slope math.
pub const MAX_LOCK_DURATION_I128: i128 = MAX_LOCK_DURATION as i128;
