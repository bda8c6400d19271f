//! Position registry: ownership, approvals and the per-block transfer marker.

use std::collections::{BTreeMap, BTreeSet};

use ebb_core::types::{Address, PositionId};

/// Who owns each position and who may act for them.
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct PositionRegistry {
    owners: BTreeMap<PositionId, Address>,
    /// Owner → positions in acquisition order.
    owned: BTreeMap<Address, Vec<PositionId>>,
    approvals: BTreeMap<PositionId, Address>,
    /// (owner, operator) pairs.
    operators: BTreeSet<(Address, Address)>,
    /// Block of the last ownership transfer per position.
    ownership_change: BTreeMap<PositionId, u64>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, id: PositionId) -> Option<Address> {
        self.owners.get(&id).copied()
    }

    pub fn exists(&self, id: PositionId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Number of positions held by `owner`.
    pub fn balance_of(&self, owner: &Address) -> usize {
        self.owned.get(owner).map_or(0, Vec::len)
    }

    /// The `index`-th position of `owner`.
    pub fn position_of_owner_by_index(&self, owner: &Address, index: usize) -> Option<PositionId> {
        self.owned.get(owner).and_then(|ids| ids.get(index)).copied()
    }

    pub fn positions_of(&self, owner: &Address) -> &[PositionId] {
        self.owned.get(owner).map_or(&[], Vec::as_slice)
    }

    pub fn get_approved(&self, id: PositionId) -> Option<Address> {
        self.approvals.get(&id).copied()
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators.contains(&(*owner, *operator))
    }

    /// Owner, approved account or operator of the owner.
    pub fn is_approved_or_owner(&self, spender: &Address, id: PositionId) -> bool {
        let Some(owner) = self.owner_of(id) else {
            return false;
        };
        owner == *spender
            || self.get_approved(id) == Some(*spender)
            || self.is_approved_for_all(&owner, spender)
    }

    /// Block in which `id` last changed hands, if ever.
    pub fn ownership_change(&self, id: PositionId) -> Option<u64> {
        self.ownership_change.get(&id).copied()
    }

    pub fn mint(&mut self, to: Address, id: PositionId) {
        self.owners.insert(id, to);
        self.owned.entry(to).or_default().push(id);
    }

    /// Remove `id` and its approval. Returns the former owner.
    pub fn burn(&mut self, id: PositionId) -> Option<Address> {
        let owner = self.owners.remove(&id)?;
        self.approvals.remove(&id);
        self.remove_owned(&owner, id);
        Some(owner)
    }

    /// Move `id` to `to`, clear its approval and stamp the transfer block.
    pub fn transfer(&mut self, to: Address, id: PositionId, block: u64) {
        let Some(from) = self.owners.insert(id, to) else {
            return;
        };
        self.approvals.remove(&id);
        self.remove_owned(&from, id);
        self.owned.entry(to).or_default().push(id);
        self.ownership_change.insert(id, block);
    }

    pub fn approve(&mut self, id: PositionId, spender: Option<Address>) {
        match spender {
            Some(s) => self.approvals.insert(id, s),
            None => self.approvals.remove(&id),
        };
    }

    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    fn remove_owned(&mut self, owner: &Address, id: PositionId) {
        if let Some(ids) = self.owned.get_mut(owner) {
            ids.retain(|x| *x != id);
            if ids.is_empty() {
                self.owned.remove(owner);
            }
        }
    }
}
