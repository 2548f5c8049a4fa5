use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mmsim::{
    Owner, Side,
    book::{OrderBook, TICK_SIZE},
    config::SimConfig,
    market_maker::MarketMaker,
    simulation::run_simulation,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn price(ticks: i64) -> Decimal {
    dec!(100) + TICK_SIZE * Decimal::from(ticks)
}

//
// Raw limit insert throughput
//
fn bench_limit_inserts(c: &mut Criterion) {
    c.bench_function("limit_insert_100k", |b| {
        b.iter_batched(
            || OrderBook::new(dec!(100)),
            |mut book| {
                for i in 0..100_000i64 {
                    let (side, ticks) = if i % 2 == 0 {
                        (Side::Buy, -1 - i % 100)
                    } else {
                        (Side::Sell, 1 + i % 100)
                    };
                    let _ = book.add_limit_order(black_box(price(ticks)), 10, side, Owner::Investor);
                }
            },
            BatchSize::LargeInput,
        )
    });
}

//
// Pure market sweeps (worst-case matching)
//
fn bench_full_sweep(c: &mut Criterion) {
    c.bench_function("market_full_sweep", |b| {
        b.iter_batched(
            || {
                let mut book = OrderBook::new(dec!(100));
                for i in 0..100_000i64 {
                    let owner = if i % 10 == 0 {
                        Owner::MarketMaker
                    } else {
                        Owner::Investor
                    };
                    book.add_limit_order(price(1 + i % 500), 10, Side::Sell, owner)
                        .unwrap();
                }
                (book, MarketMaker::default())
            },
            |(mut book, mut maker)| {
                let _ = book.execute_market_order(black_box(1_000_000), Side::Buy, Some(&mut maker));
            },
            BatchSize::LargeInput,
        )
    });
}

//
// Requote churn against a deep book
//
fn bench_requote(c: &mut Criterion) {
    c.bench_function("requote_10k", |b| {
        b.iter_batched(
            || {
                let mut book = OrderBook::new(dec!(100));
                for i in 1..=200i64 {
                    book.add_limit_order(price(-i), 10, Side::Buy, Owner::Investor).unwrap();
                    book.add_limit_order(price(i), 10, Side::Sell, Owner::Investor).unwrap();
                }
                (book, MarketMaker::default())
            },
            |(mut book, mut maker)| {
                for _ in 0..10_000 {
                    let _ = maker.place_quotes(&mut book);
                }
                black_box(book);
            },
            BatchSize::LargeInput,
        )
    });
}

//
// A whole default simulation run
//
fn bench_simulation(c: &mut Criterion) {
    let config = SimConfig::default();
    c.bench_function("simulation_50_steps", |b| {
        b.iter(|| black_box(run_simulation(&config)))
    });
}

criterion_group!(
    benches,
    bench_limit_inserts,
    bench_full_sweep,
    bench_requote,
    bench_simulation
);

criterion_main!(benches);
