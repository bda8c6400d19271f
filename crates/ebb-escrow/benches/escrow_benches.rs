//! Criterion benchmarks for ebb-escrow hot paths.
//!
//! Covers: lock creation with checkpoint, the capped catch-up walk, and
//! historical supply/voting power reads over a long history.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ebb_core::bank::MemoryTokenBank;
use ebb_core::config::EscrowConfig;
use ebb_core::constants::{UNIT, WEEK};
use ebb_core::traits::NoopHook;
use ebb_core::types::{Address, TxContext};
use ebb_escrow::VotingEscrow;

const T0: u64 = 1_699_488_000;

fn token() -> Address {
    Address::from_label("token")
}

fn funded() -> (VotingEscrow, MemoryTokenBank, Address) {
    let holder = Address::from_label("holder");
    let mut bank = MemoryTokenBank::new();
    bank.mint(&token(), &holder, u128::MAX / 2).unwrap();
    let ve = VotingEscrow::new(EscrowConfig::default(), token(), Address::from_label("escrow"))
        .unwrap();
    (ve, bank, holder)
}

/// An escrow with one new lock per week for `weeks` weeks.
fn with_history(weeks: u64) -> VotingEscrow {
    let (mut ve, mut bank, holder) = funded();
    for w in 0..weeks {
        let t = T0 + w * WEEK + 60;
        let ctx = TxContext::new(holder, t, t / 12);
        ve.create_lock(&ctx, (10 * UNIT) as u128, 52 * WEEK, &mut bank, &mut NoopHook)
            .unwrap();
    }
    ve
}

fn bench_create_lock(c: &mut Criterion) {
    c.bench_function("create_lock", |b| {
        b.iter_batched(
            funded,
            |(mut ve, mut bank, holder)| {
                let ctx = TxContext::new(holder, T0, 1);
                let amount = black_box((10 * UNIT) as u128);
                ve.create_lock(&ctx, amount, 52 * WEEK, &mut bank, &mut NoopHook)
                    .unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_catch_up_walk(c: &mut Criterion) {
    let base = with_history(4);
    c.bench_function("checkpoint_after_300_weeks_idle", |b| {
        b.iter_batched(
            || base.clone(),
            |mut ve| {
                let t = T0 + 300 * WEEK;
                ve.checkpoint(&TxContext::new(Address::ZERO, t, t / 12)).unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_historical_reads(c: &mut Criterion) {
    let ve = with_history(200);
    let t = T0 + 120 * WEEK + 17;

    c.bench_function("total_supply_at", |b| {
        b.iter(|| ve.total_supply_at(black_box(t)))
    });
    c.bench_function("voting_power_at", |b| {
        b.iter(|| ve.voting_power_at(black_box(150), black_box(t)))
    });
}

criterion_group!(benches, bench_create_lock, bench_catch_up_walk, bench_historical_reads);
criterion_main!(benches);
