// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Key metrics:
//   1. Startup time: schema migration + store init
//   2. Mining throughput: incremental episode mining per event
//   3. Suggestion latency: ranking against a populated pattern store
//   4. Ingestion: durable append plus mining through the engine

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rusqlite::Connection;

use habitual::infra::config::Config;
use habitual::memory::schema::run_migrations;
use habitual::memory::store::Store;
use habitual::patterns::miner::{MinerConfig, PatternMiner};
use habitual::patterns::pattern_store::{self, PatternStore};
use habitual::patterns::ranker::{RankerConfig, SuggestionRanker};
use habitual::patterns::types::{ActionEvent, NewEvent, Outcome};
use habitual::Engine;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// A repeating workday: 40 distinct actions, a few seconds apart, with some
/// noise in the order.
fn build_events(n: usize) -> Vec<ActionEvent> {
    (0..n)
        .map(|i| {
            let action = if i % 7 == 0 {
                format!("action-{}", (i * 13) % 40)
            } else {
                format!("action-{}", i % 40)
            };
            ActionEvent {
                seq: i as u64 + 1,
                action_id: action,
                occurred_at: t0() + Duration::seconds(i as i64 * 5),
                outcome: Outcome::Success,
                params: Default::default(),
            }
        })
        .collect()
}

fn mined_miner(events: &[ActionEvent]) -> PatternMiner {
    let mut miner =
        PatternMiner::new(MinerConfig::default(), pattern_store::shared(PatternStore::new()));
    for event in events {
        miner.on_event(event);
    }
    miner
}

// ─── Benchmark: Startup ─────────────────────────────────────────────────────

fn bench_startup(c: &mut Criterion) {
    c.bench_function("startup_schema_init", |b| {
        b.iter(|| {
            let conn = Connection::open_in_memory().expect("open in-memory db");
            run_migrations(black_box(&conn)).expect("run migrations");
            Store::new(conn)
        })
    });
}

// ─── Benchmark: Mining throughput ───────────────────────────────────────────

fn bench_mining(c: &mut Criterion) {
    let events = build_events(10_000);
    let mut group = c.benchmark_group("mining");

    group.bench_function("on_event_10k", |b| {
        b.iter_batched(
            || PatternMiner::new(MinerConfig::default(), pattern_store::shared(PatternStore::new())),
            |mut miner| {
                for event in &events {
                    miner.on_event(black_box(event));
                }
                miner
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("decay_populated", |b| {
        b.iter_batched(
            || mined_miner(&events),
            |mut miner| miner.decay(black_box(t0() + Duration::days(2))),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

// ─── Benchmark: Suggestion latency ──────────────────────────────────────────

fn bench_suggest(c: &mut Criterion) {
    let events = build_events(10_000);
    let miner = mined_miner(&events);
    let mut config = RankerConfig::default();
    config.cooldown = Duration::zero();
    let ranker = SuggestionRanker::new(config, miner.patterns().clone());
    let now = events.last().map(|e| e.occurred_at).unwrap_or_else(t0);

    c.bench_function("suggest_for_populated", |b| {
        b.iter(|| ranker.suggest_for(black_box("action-3"), now))
    });
}

// ─── Benchmark: Ingestion ───────────────────────────────────────────────────

fn bench_record(c: &mut Criterion) {
    c.bench_function("engine_record_100", |b| {
        b.iter_batched(
            || Engine::in_memory(Config::default()).expect("engine"),
            |engine| {
                for i in 0..100 {
                    engine
                        .record(NewEvent::success(
                            format!("action-{}", i % 10),
                            t0() + Duration::seconds(i * 3),
                        ))
                        .expect("record");
                }
                engine
            },
            BatchSize::SmallInput,
        )
    });
}

// ─── Main ───────────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_startup,
    bench_mining,
    bench_suggest,
    bench_record,
);
criterion_main!(benches);
