//! In-memory multi-token balance book.
//!
//! [`MemoryTokenBank`] backs the tests and the simulator. A host embedding
//! the ledger supplies its own [`TokenBank`] over real token contracts.

use std::collections::HashMap;

use crate::error::TokenError;
use crate::traits::TokenBank;
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct MemoryTokenBank {
    /// (token, holder) → balance.
    balances: HashMap<(Address, Address), u128>,
}

impl MemoryTokenBank {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Credit `amount` of `token` to `holder` out of thin air.
    pub fn mint(
        &mut self,
        token: &Address,
        holder: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let entry = self.balances.entry((*token, *holder)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Sum of all balances held in `token`.
    pub fn total_of(&self, token: &Address) -> u128 {
        self.balances
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, v)| *v)
            .sum()
    }
}

impl Default for MemoryTokenBank {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBank for MemoryTokenBank {
    fn balance_of(&self, token: &Address, holder: &Address) -> u128 {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroRecipient);
        }
        let have = self.balance_of(token, from);
        if have < amount {
            return Err(TokenError::InsufficientBalance {
                token: *token,
                holder: *from,
                have,
                need: amount,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert((*token, *from), have - amount);
        self.balances.insert((*token, *to), credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Address {
        Address::from_label("tok")
    }

    #[test]
    fn unknown_balance_is_zero() {
        let bank = MemoryTokenBank::new();
        assert_eq!(bank.balance_of(&token(), &Address::from_label("a")), 0);
    }

    #[test]
    fn transfer_moves_balance() {
        let (a, b) = (Address::from_label("a"), Address::from_label("b"));
        let mut bank = MemoryTokenBank::new();
        bank.mint(&token(), &a, 100).unwrap();
        bank.transfer(&token(), &a, &b, 40).unwrap();
        assert_eq!(bank.balance_of(&token(), &a), 60);
        assert_eq!(bank.balance_of(&token(), &b), 40);
        assert_eq!(bank.total_of(&token()), 100);
    }

    #[test]
    fn insufficient_balance_leaves_state() {
        let (a, b) = (Address::from_label("a"), Address::from_label("b"));
        let mut bank = MemoryTokenBank::new();
        bank.mint(&token(), &a, 10).unwrap();
        let err = bank.transfer(&token(), &a, &b, 11).unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { have: 10, need: 11, .. }));
        assert_eq!(bank.balance_of(&token(), &a), 10);
        assert_eq!(bank.balance_of(&token(), &b), 0);
    }

    #[test]
    fn zero_recipient_rejected() {
        let a = Address::from_label("a");
        let mut bank = MemoryTokenBank::new();
        bank.mint(&token(), &a, 10).unwrap();
        assert_eq!(bank.transfer(&token(), &a, &Address::ZERO, 1), Err(TokenError::ZeroRecipient));
    }

    #[test]
    fn self_transfer_is_noop() {
        let a = Address::from_label("a");
        let mut bank = MemoryTokenBank::new();
        bank.mint(&token(), &a, 10).unwrap();
        bank.transfer(&token(), &a, &a, 10).unwrap();
        assert_eq!(bank.balance_of(&token(), &a), 10);
    }

    #[test]
    fn tokens_are_separate() {
        let a = Address::from_label("a");
        let other = Address::from_label("other");
        let mut bank = MemoryTokenBank::new();
        bank.mint(&token(), &a, 10).unwrap();
        assert_eq!(bank.balance_of(&other, &a), 0);
    }
}
