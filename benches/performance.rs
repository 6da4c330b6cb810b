use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use ledger_engine::cache::CacheStats;
use ledger_engine::idempotency::hash_request;
use ledger_engine::models::{Currency, LedgerEntry, Money};
use ledger_engine::observability::LatencyTimer;

fn benchmark_money_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("money");

    group.bench_function("add", |b| {
        let a = Money::new(dec!(1234.56), Currency::USD).unwrap();
        let other = Money::new(dec!(789.01), Currency::USD).unwrap();
        b.iter(|| black_box(a.add(black_box(&other))));
    });

    group.bench_function("sub", |b| {
        let a = Money::new(dec!(1234.56), Currency::USD).unwrap();
        let other = Money::new(dec!(789.01), Currency::USD).unwrap();
        b.iter(|| black_box(a.sub(black_box(&other))));
    });

    group.bench_function("quantize", |b| {
        let m = Money::new(dec!(1234.5678), Currency::USD).unwrap();
        b.iter(|| black_box(m.quantize(black_box(2))));
    });

    group.bench_function("comparison", |b| {
        let a = Money::new(dec!(1234.56), Currency::USD).unwrap();
        let other = Money::new(dec!(789.01), Currency::USD).unwrap();
        b.iter(|| black_box(a.lt(black_box(&other))));
    });

    group.bench_function("parse", |b| {
        b.iter(|| black_box(Money::parse(black_box("1234.56"), Currency::USD)));
    });

    group.finish();
}

fn benchmark_ledger_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_entry");

    group.bench_function("debit_credit_pair", |b| {
        let transaction_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        b.iter(|| {
            let debit = LedgerEntry::debit(
                black_box(transaction_id),
                black_box(account_id),
                black_box(dec!(30.00)),
                Currency::USD,
            );
            black_box(debit)
        });
    });

    group.bench_function("sum_by_side", |b| {
        let transaction_id = Uuid::new_v4();
        let entries: Vec<LedgerEntry> = (0..100)
            .map(|_| LedgerEntry::debit(transaction_id, Uuid::new_v4(), dec!(1.00), Currency::USD))
            .collect();
        b.iter(|| black_box(ledger_engine::models::sum_by_side(black_box(&entries), ledger_engine::models::EntryType::Debit)));
    });

    group.finish();
}

fn benchmark_idempotency_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("idempotency");

    for size in [1, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("hash_request", size), size, |b, &size| {
            let mut fields = serde_json::Map::new();
            for i in 0..size {
                fields.insert(format!("field_{i}"), serde_json::json!(i));
            }
            let value = serde_json::Value::Object(fields);
            b.iter(|| black_box(hash_request(black_box(&value))));
        });
    }

    group.finish();
}

fn benchmark_cache_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_stats");

    group.bench_function("record_hit", |b| {
        let stats = CacheStats::new();
        b.iter(|| {
            stats.record_hit();
        });
    });

    group.bench_function("hit_rate_calculation", |b| {
        let stats = CacheStats::new();
        for _ in 0..1000 {
            stats.record_hit();
        }
        for _ in 0..100 {
            stats.record_miss();
        }

        b.iter(|| black_box(stats.hit_rate()));
    });

    group.finish();
}

fn benchmark_latency_timer(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency_timer");

    group.bench_function("create_and_elapsed", |b| {
        b.iter(|| {
            let timer = LatencyTimer::new();
            black_box(timer.elapsed_ms())
        });
    });

    group.finish();
}

fn benchmark_decimal_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("decimal");

    group.bench_function("addition", |b| {
        let a = Decimal::from(12345);
        let b_val = Decimal::from(67890);
        b.iter(|| black_box(a + b_val));
    });

    group.bench_function("multiplication", |b| {
        let a = Decimal::from(12345);
        let b_val = Decimal::from(67890);
        b.iter(|| black_box(a * b_val));
    });

    group.bench_function("comparison", |b| {
        let a = Decimal::from(12345);
        let b_val = Decimal::from(67890);
        b.iter(|| black_box(a < b_val));
    });

    group.finish();
}

fn benchmark_lock_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_ordering");

    group.bench_function("ascending_pair", |b| {
        let pairs: Vec<(Uuid, Uuid)> = (0..100).map(|_| (Uuid::new_v4(), Uuid::new_v4())).collect();
        b.iter(|| {
            for (from, to) in &pairs {
                let ordered = if from <= to { (*from, *to) } else { (*to, *from) };
                black_box(ordered);
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_money_arithmetic,
    benchmark_ledger_entries,
    benchmark_idempotency_hashing,
    benchmark_cache_stats,
    benchmark_latency_timer,
    benchmark_decimal_operations,
    benchmark_lock_ordering,
);

criterion_main!(benches);
