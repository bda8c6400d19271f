//! Shared test helpers for the integration suites.

use ebb_core::constants::UNIT;
use ebb_core::types::{Address, TxContext};
use ebb_ledger::{Ledger, LedgerConfig};

/// A Thursday 00:00 UTC, aligned to a week boundary.
pub const T0: u64 = 1_699_488_000;

/// Seconds per block used by [`ctx`] to derive block numbers.
pub const BLOCK_TIME: u64 = 12;

/// Tokens held by every actor of [`funded_ledger`], per token.
pub const STARTING_BALANCE: u128 = 1_000_000;

/// `n` whole tokens in base units.
pub fn tokens(n: u128) -> u128 {
    n * UNIT as u128
}

pub fn actor(name: &str) -> Address {
    Address::from_label(name)
}

pub fn alice() -> Address {
    actor("alice")
}

pub fn bob() -> Address {
    actor("bob")
}

pub fn carol() -> Address {
    actor("carol")
}

/// Reward token used throughout the suites.
pub fn usdc() -> Address {
    actor("usdc")
}

/// Context at time `t`, with one block every [`BLOCK_TIME`] seconds.
pub fn ctx(sender: Address, t: u64) -> TxContext {
    TxContext::new(sender, t, t / BLOCK_TIME)
}

/// Context of the escrow admin at time `t`.
pub fn admin_ctx(ledger: &Ledger, t: u64) -> TxContext {
    ctx(ledger.escrow().config().admin, t)
}

/// A default-configured in-memory ledger where alice, bob and carol each
/// hold [`STARTING_BALANCE`] of the lock token and of [`usdc`].
pub fn funded_ledger() -> Ledger {
    funded_ledger_with(LedgerConfig::default())
}

pub fn funded_ledger_with(config: LedgerConfig) -> Ledger {
    let token = config.token;
    let mut ledger = Ledger::in_memory(config).expect("default config is valid");
    for who in [alice(), bob(), carol()] {
        for t in [token, usdc()] {
            ledger
                .bank_mut()
                .mint(&t, &who, tokens(STARTING_BALANCE))
                .expect("mint");
        }
    }
    ledger
}

/// Lock token balance of `who`.
pub fn lock_balance(ledger: &Ledger, who: &Address) -> u128 {
    use ebb_core::traits::TokenBank;
    ledger.bank().balance_of(&ledger.escrow().token(), who)
}

/// Reward token balance of `who`.
pub fn usdc_balance(ledger: &Ledger, who: &Address) -> u128 {
    use ebb_core::traits::TokenBank;
    ledger.bank().balance_of(&usdc(), who)
}
