//! Thread-safe handle to a single [`Ledger`].
//!
//! Transactions from any thread are serialised by one lock; its acquisition
//! order is the transaction order. A transaction that re-enters the ledger
//! from the same thread, for example through a token bank callback, fails
//! with [`EbbError::Reentrancy`] instead of deadlocking.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use ebb_core::bank::MemoryTokenBank;
use ebb_core::error::EbbError;
use ebb_core::traits::TokenBank;

use crate::ledger::Ledger;

pub struct SharedLedger<B: TokenBank = MemoryTokenBank> {
    inner: Arc<ReentrantMutex<RefCell<Ledger<B>>>>,
}

impl<B: TokenBank> Clone for SharedLedger<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: TokenBank> SharedLedger<B> {
    pub fn new(ledger: Ledger<B>) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(ledger))),
        }
    }

    /// Run `f` as one exclusive transaction.
    pub fn transact<T, E>(
        &self,
        f: impl FnOnce(&mut Ledger<B>) -> Result<T, E>,
    ) -> Result<T, EbbError>
    where
        E: Into<EbbError>,
    {
        let guard = self.inner.lock();
        let mut ledger = guard.try_borrow_mut().map_err(|_| EbbError::Reentrancy)?;
        f(&mut ledger).map_err(Into::into)
    }

    /// Run a read-only query.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger<B>) -> T) -> Result<T, EbbError> {
        let guard = self.inner.lock();
        let ledger = guard.try_borrow().map_err(|_| EbbError::Reentrancy)?;
        Ok(f(&ledger))
    }
}
