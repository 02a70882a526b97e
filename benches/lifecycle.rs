//! Benchmarks for the dark-otc escrow engine.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark
//! cargo bench -- create_order
//! ```
//!
//! Results are saved to `target/criterion/` with HTML reports.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use dark_otc::config::EngineConfig;
use dark_otc::confidential::{LocalCoprocessor, Plaintext};
use dark_otc::engine::{CreateOrder, EscrowEngine, FillRequest, TxContext};
use dark_otc::types::{Identity, OrderId};

const NOW: u64 = 1_700_000_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Actors {
    maker: Identity,
    taker: Identity,
    validator: Identity,
    custody: Identity,
    asset_a: Identity,
    asset_b: Identity,
}

fn actors() -> Actors {
    Actors {
        maker: Identity::from_label("maker"),
        taker: Identity::from_label("taker"),
        validator: Identity::from_label("validator"),
        custody: Identity::from_label("escrow"),
        asset_a: Identity::from_label("asset-a"),
        asset_b: Identity::from_label("asset-b"),
    }
}

fn new_engine(a: &Actors) -> EscrowEngine<LocalCoprocessor> {
    let mut fhe = LocalCoprocessor::new(b"bench");
    fhe.mint(a.asset_a, a.taker, u64::MAX as u128);
    fhe.mint(a.asset_b, a.maker, u64::MAX as u128);
    fhe.set_operator(a.asset_a, a.taker, a.custody);
    fhe.set_operator(a.asset_b, a.maker, a.custody);
    EscrowEngine::new(EngineConfig::new(a.validator, a.custody), fhe).expect("valid config")
}

fn create_params(engine: &mut EscrowEngine<LocalCoprocessor>, a: &Actors, escrow_now: bool) -> CreateOrder {
    let (h, proof) = engine.backend_mut().encrypt_inputs(
        a.custody,
        a.maker,
        &[Plaintext::Uint(100), Plaintext::Uint(1), Plaintext::ANY_TAKER],
    );
    CreateOrder {
        asset_in: a.asset_a,
        asset_out: a.asset_b,
        amount_in: h[0],
        amount_out: h[1],
        allowed_taker: h[2],
        proof,
        deadline: NOW + 3600,
        escrow_now,
    }
}

fn fill_params(engine: &mut EscrowEngine<LocalCoprocessor>, a: &Actors, escrow_now: bool) -> FillRequest {
    let (payment, proof) = engine
        .backend_mut()
        .encrypt(a.custody, a.taker, Plaintext::Uint(100));
    FillRequest {
        payment,
        proof,
        escrow_now,
    }
}

/// Engine with `count` open orders.
fn populated_engine(a: &Actors, count: usize) -> EscrowEngine<LocalCoprocessor> {
    let mut engine = new_engine(a);
    for _ in 0..count {
        let params = create_params(&mut engine, a, false);
        engine
            .create_order(&TxContext::new(a.maker, NOW), params)
            .expect("valid create");
    }
    engine
}

// ============================================================================
// BENCHMARK: Single Operations
// ============================================================================

fn bench_operations(c: &mut Criterion) {
    let a = actors();
    let mut group = c.benchmark_group("operations");
    group.measurement_time(Duration::from_secs(5));

    for escrow_now in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("create_order", if escrow_now { "escrow" } else { "no_escrow" }),
            &escrow_now,
            |b, &escrow_now| {
                // Includes client-side encryption of the three terms.
                let mut engine = new_engine(&a);
                b.iter(|| {
                    let params = create_params(&mut engine, &a, escrow_now);
                    black_box(engine.create_order(&TxContext::new(a.maker, NOW), params))
                });
            },
        );
    }

    group.bench_function("request_fill", |b| {
        b.iter_batched(
            || {
                let mut engine = populated_engine(&a, 1);
                let params = fill_params(&mut engine, &a, true);
                (engine, params)
            },
            |(mut engine, params)| {
                black_box(engine.request_fill(&TxContext::new(a.taker, NOW), 0, params))
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("finalize", |b| {
        b.iter_batched(
            || {
                let mut engine = populated_engine(&a, 1);
                let params = fill_params(&mut engine, &a, false);
                engine
                    .request_fill(&TxContext::new(a.taker, NOW), 0, params)
                    .expect("valid fill");
                engine
            },
            |mut engine| black_box(engine.finalize(&TxContext::new(a.validator, NOW), 0, a.taker)),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("rejected_finalize", |b| {
        let mut engine = populated_engine(&a, 1);
        b.iter(|| black_box(engine.finalize(&TxContext::new(a.maker, NOW), 0, a.taker)));
    });

    group.finish();
}

// ============================================================================
// BENCHMARK: Full Lifecycle Throughput
// ============================================================================

fn bench_lifecycle_throughput(c: &mut Criterion) {
    let a = actors();
    let mut group = c.benchmark_group("lifecycle");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for batch_size in [100usize, 1_000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::new("orders", batch_size), &batch_size, |b, &size| {
            b.iter_batched(
                || new_engine(&a),
                |mut engine| {
                    for _ in 0..size {
                        let params = create_params(&mut engine, &a, true);
                        let id: OrderId = engine
                            .create_order(&TxContext::new(a.maker, NOW), params)
                            .expect("valid create");
                        let params = fill_params(&mut engine, &a, true);
                        engine
                            .request_fill(&TxContext::new(a.taker, NOW), id, params)
                            .expect("valid fill");
                        engine
                            .finalize(&TxContext::new(a.validator, NOW), id, a.taker)
                            .expect("valid finalize");
                    }
                    engine.store().len()
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// BENCHMARK: State Root
// ============================================================================

fn bench_state_root(c: &mut Criterion) {
    let a = actors();
    let mut group = c.benchmark_group("state_root");

    for count in [1_000usize, 10_000] {
        let engine = populated_engine(&a, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("orders", count), &engine, |b, engine| {
            b.iter(|| black_box(engine.store().state_root()))
        });
    }

    group.finish();
}

// ============================================================================
// CRITERION ENTRY POINT
// ============================================================================

criterion_group!(benches, bench_operations, bench_lifecycle_throughput, bench_state_root);

criterion_main!(benches);
