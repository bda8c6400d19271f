//! The voting escrow: state, accessors, snapshots and the read-only view
//! the reward engine consumes.
//!
//! Mutating operations live in [`crate::lifecycle`], curve bookkeeping in
//! [`crate::checkpoint`] and point-in-time reads in [`crate::history`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use ebb_core::config::EscrowConfig;
use ebb_core::error::EscrowError;
use ebb_core::events::EscrowEvent;
use ebb_core::guard::ReentrancyGuard;
use ebb_core::traits::{TokenBank, VotingPowerSource};
use ebb_core::types::{Address, GlobalPoint, Lock, PositionId, TxContext, UserPoint};

use crate::registry::PositionRegistry;
use crate::store::LockStore;

/// Everything the escrow persists. Encoded as a whole by [`VotingEscrow::snapshot`].
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct EscrowState {
    pub(crate) config: EscrowConfig,
    /// The locked token.
    pub(crate) token: Address,
    /// Account holding the locked principal.
    pub(crate) account: Address,
    pub(crate) locks: LockStore,
    pub(crate) registry: PositionRegistry,
    /// Global curve; entry 0 is the genesis point.
    pub(crate) point_history: Vec<GlobalPoint>,
    /// Per-position curve; entry 0 of each history is an empty sentinel.
    pub(crate) user_point_history: BTreeMap<PositionId, Vec<UserPoint>>,
    /// Week boundary → slope to add when the walk crosses it (non-positive).
    pub(crate) slope_changes: BTreeMap<u64, i128>,
    /// Total principal locked.
    pub(crate) supply: i128,
    pub(crate) permanent_lock_balance: i128,
    /// Split permission per owner; the zero address is the global switch.
    pub(crate) split_allowed: BTreeMap<Address, bool>,
    pub(crate) next_id: PositionId,
}

/// Vote-escrow ledger over one locked token.
#[derive(Debug, Clone)]
pub struct VotingEscrow {
    pub(crate) state: EscrowState,
    pub(crate) guard: ReentrancyGuard,
    pub(crate) events: Vec<EscrowEvent>,
}

/// Headline figures, printed by the simulator.
#[derive(Debug, Clone, Serialize)]
pub struct EscrowSummary {
    pub supply: i128,
    pub permanent_lock_balance: i128,
    pub epoch: usize,
    pub positions: usize,
    pub total_voting_power: u128,
}

impl VotingEscrow {
    /// Create an empty escrow locking `token` into `account`.
    pub fn new(
        config: EscrowConfig,
        token: Address,
        account: Address,
    ) -> Result<Self, EscrowError> {
        config.validate()?;
        if token.is_zero() || account.is_zero() {
            return Err(EscrowError::ZeroAddress);
        }
        let mut split_allowed = BTreeMap::new();
        if config.split_globally_enabled {
            split_allowed.insert(Address::ZERO, true);
        }
        info!(%token, %account, penalty_bps = config.penalty_bps, "voting escrow created");
        Ok(Self {
            state: EscrowState {
                config,
                token,
                account,
                locks: LockStore::new(),
                registry: PositionRegistry::new(),
                point_history: vec![GlobalPoint::default()],
                user_point_history: BTreeMap::new(),
                slope_changes: BTreeMap::new(),
                supply: 0,
                permanent_lock_balance: 0,
                split_allowed,
                next_id: 1,
            },
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
        })
    }

    /// Encode the full state with bincode.
    pub fn snapshot(&self) -> Result<Vec<u8>, EscrowError> {
        bincode::encode_to_vec(&self.state, bincode::config::standard())
            .map_err(|e| EscrowError::Snapshot(e.to_string()))
    }

    /// Rebuild an escrow from [`snapshot`](Self::snapshot) bytes.
    pub fn restore(bytes: &[u8]) -> Result<Self, EscrowError> {
        let (state, _): (EscrowState, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| EscrowError::Snapshot(e.to_string()))?;
        if state.point_history.is_empty() {
            return Err(EscrowError::Snapshot("missing genesis point".into()));
        }
        if state.next_id == 0 {
            return Err(EscrowError::Snapshot("position counter is zero".into()));
        }
        Ok(Self {
            state,
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
        })
    }

    /// Run `f` as a non-reentrant entry point.
    pub(crate) fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EscrowError>,
    ) -> Result<T, EscrowError> {
        self.guard.enter()?;
        let out = f(self);
        self.guard.exit();
        out
    }

    /// Reject a context older than the newest global point.
    pub(crate) fn check_time(&self, ctx: &TxContext) -> Result<(), EscrowError> {
        let last = self.last_global_point().ts;
        if ctx.timestamp < last {
            return Err(EscrowError::TimestampRegression {
                last,
                got: ctx.timestamp,
            });
        }
        Ok(())
    }

    /// Owner of `id`, or `NonexistentPosition`.
    pub(crate) fn require_owner(&self, id: PositionId) -> Result<Address, EscrowError> {
        self.state
            .registry
            .owner_of(id)
            .ok_or(EscrowError::NonexistentPosition(id))
    }

    /// Owner of `id` after checking that the caller may act on it.
    pub(crate) fn require_approved(
        &self,
        ctx: &TxContext,
        id: PositionId,
    ) -> Result<Address, EscrowError> {
        let owner = self.require_owner(id)?;
        if !self.state.registry.is_approved_or_owner(&ctx.sender, id) {
            return Err(EscrowError::NotApprovedOrOwner(id));
        }
        Ok(owner)
    }

    pub(crate) fn require_admin(&self, ctx: &TxContext) -> Result<(), EscrowError> {
        if ctx.sender != self.state.config.admin {
            return Err(EscrowError::NotAdmin);
        }
        Ok(())
    }

    /// Fail early if `holder` cannot fund a pull of `amount`.
    pub(crate) fn require_funds(
        &self,
        bank: &dyn TokenBank,
        holder: &Address,
        amount: u128,
    ) -> Result<(), EscrowError> {
        let have = bank.balance_of(&self.state.token, holder);
        if have < amount {
            return Err(ebb_core::error::TokenError::InsufficientBalance {
                token: self.state.token,
                holder: *holder,
                have,
                need: amount,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: EscrowEvent) {
        self.events.push(event);
    }

    /// Take all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<EscrowEvent> {
        std::mem::take(&mut self.events)
    }

    // --- accessors ---

    pub fn config(&self) -> &EscrowConfig {
        &self.state.config
    }

    pub fn token(&self) -> Address {
        self.state.token
    }

    pub fn account(&self) -> Address {
        self.state.account
    }

    pub fn locked(&self, id: PositionId) -> Lock {
        self.state.locks.get(id)
    }

    pub fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.state.registry.owner_of(id)
    }

    pub fn registry(&self) -> &PositionRegistry {
        &self.state.registry
    }

    /// Total principal locked.
    pub fn supply(&self) -> i128 {
        self.state.supply
    }

    pub fn permanent_lock_balance(&self) -> i128 {
        self.state.permanent_lock_balance
    }

    /// Index of the newest global point.
    pub fn epoch(&self) -> usize {
        self.state.point_history.len().saturating_sub(1)
    }

    pub fn global_point(&self, index: usize) -> Option<GlobalPoint> {
        self.state.point_history.get(index).copied()
    }

    pub(crate) fn last_global_point(&self) -> GlobalPoint {
        self.state
            .point_history
            .last()
            .copied()
            .unwrap_or_default()
    }

    /// Index of the newest point of `id`; 0 if it has none.
    pub fn user_point_epoch(&self, id: PositionId) -> usize {
        self.state
            .user_point_history
            .get(&id)
            .map_or(0, |h| h.len().saturating_sub(1))
    }

    pub fn user_point(&self, id: PositionId, index: usize) -> Option<UserPoint> {
        self.state
            .user_point_history
            .get(&id)
            .and_then(|h| h.get(index))
            .copied()
    }

    /// Scheduled slope delta at week boundary `t`.
    pub fn slope_change(&self, t: u64) -> i128 {
        self.state.slope_changes.get(&t).copied().unwrap_or(0)
    }

    /// Whether `owner` may split, individually or through the global switch.
    pub fn can_split(&self, owner: &Address) -> bool {
        let flag = |a: &Address| self.state.split_allowed.get(a).copied().unwrap_or(false);
        flag(owner) || flag(&Address::ZERO)
    }

    /// Id the next minted position will receive.
    pub fn next_id(&self) -> PositionId {
        self.state.next_id
    }

    pub fn summary(&self, t: u64) -> EscrowSummary {
        EscrowSummary {
            supply: self.state.supply,
            permanent_lock_balance: self.state.permanent_lock_balance,
            epoch: self.epoch(),
            positions: self.state.locks.len(),
            total_voting_power: self.total_supply_at(t),
        }
    }
}

impl VotingPowerSource for VotingEscrow {
    fn voting_power_at(&self, id: PositionId, t: u64) -> u128 {
        VotingEscrow::voting_power_at(self, id, t)
    }

    fn total_supply_at(&self, t: u64) -> u128 {
        VotingEscrow::total_supply_at(self, t)
    }

    fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.state.registry.owner_of(id)
    }

    fn is_approved_or_owner(&self, spender: &Address, id: PositionId) -> bool {
        self.state.registry.is_approved_or_owner(spender, id)
    }

    fn position_start(&self, id: PositionId) -> Option<u64> {
        self.user_point(id, 1).map(|p| p.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::constants::{UNIT, WEEK};
    use ebb_core::error::ConfigError;

    fn escrow() -> VotingEscrow {
        VotingEscrow::new(
            EscrowConfig::default(),
            Address::from_label("tok"),
            Address::from_label("escrow"),
        )
        .unwrap()
    }

    #[test]
    fn new_escrow_has_genesis_point() {
        let ve = escrow();
        assert_eq!(ve.epoch(), 0);
        assert_eq!(ve.global_point(0), Some(GlobalPoint::default()));
        assert_eq!(ve.next_id(), 1);
        assert_eq!(ve.supply(), 0);
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = EscrowConfig {
            penalty_bps: 20_000,
            ..Default::default()
        };
        let err =
            VotingEscrow::new(cfg, Address::from_label("t"), Address::from_label("e")).unwrap_err();
        assert_eq!(err, EscrowError::Config(ConfigError::InvalidPenalty(20_000)));
    }

    #[test]
    fn zero_token_rejected() {
        let err =
            VotingEscrow::new(EscrowConfig::default(), Address::ZERO, Address::from_label("e"))
                .unwrap_err();
        assert_eq!(err, EscrowError::ZeroAddress);
    }

    #[test]
    fn guard_blocks_nested_entry() {
        let mut ve = escrow();
        let nested = ve.guarded(|this| this.guarded(|_| Ok(())));
        assert!(matches!(nested, Err(EscrowError::Reentrancy(_))));
        // Released after the outer call returns.
        assert!(ve.guarded(|_| Ok(())).is_ok());
    }

    #[test]
    fn guard_released_after_error() {
        let mut ve = escrow();
        let _ = ve.guarded(|_| Err::<(), _>(EscrowError::ZeroAmount));
        assert!(!ve.guard.is_entered());
    }

    #[test]
    fn global_split_switch_from_config() {
        let cfg = EscrowConfig {
            split_globally_enabled: true,
            ..Default::default()
        };
        let ve =
            VotingEscrow::new(cfg, Address::from_label("t"), Address::from_label("e")).unwrap();
        assert!(ve.can_split(&Address::from_label("anyone")));
        assert!(!escrow().can_split(&Address::from_label("anyone")));
    }

    #[test]
    fn snapshot_restores_state() {
        let mut ve = escrow();
        ve.state.supply = 3 * UNIT;
        ve.state.slope_changes.insert(10 * WEEK, -7);
        ve.state.registry.mint(Address::from_label("alice"), 1);
        let bytes = ve.snapshot().unwrap();
        let back = VotingEscrow::restore(&bytes).unwrap();
        assert_eq!(back.supply(), 3 * UNIT);
        assert_eq!(back.slope_change(10 * WEEK), -7);
        assert_eq!(back.owner_of(1), Some(Address::from_label("alice")));
        assert_eq!(back.epoch(), 0);
    }

    #[test]
    fn restore_rejects_missing_genesis() {
        let mut ve = escrow();
        ve.state.point_history.clear();
        let bytes = ve.snapshot().unwrap();
        let err = VotingEscrow::restore(&bytes).unwrap_err();
        assert_eq!(err, EscrowError::Snapshot("missing genesis point".into()));
        // Accessors stay total on such a state.
        assert_eq!(ve.epoch(), 0);
        assert_eq!(ve.last_global_point(), GlobalPoint::default());
    }

    #[test]
    fn restore_rejects_zero_counter() {
        let mut ve = escrow();
        ve.state.next_id = 0;
        let bytes = ve.snapshot().unwrap();
        assert!(matches!(VotingEscrow::restore(&bytes), Err(EscrowError::Snapshot(_))));
    }

    #[test]
    fn restore_rejects_garbage() {
        assert!(matches!(VotingEscrow::restore(&[0xff; 3]), Err(EscrowError::Snapshot(_))));
    }
}
