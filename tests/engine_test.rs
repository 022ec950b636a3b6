// tests/engine_test.rs — Integration test: engine facade end to end

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use habitual::infra::config::Config;
use habitual::infra::errors::HabitError;
use habitual::memory;
use habitual::patterns::miner::CancelCheck;
use habitual::patterns::snapshot::{PatternRecord, PatternSnapshot, SNAPSHOT_VERSION};
use habitual::patterns::types::{Decision, NewEvent, PatternKey, PatternState, PatternStats};
use habitual::Engine;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

fn engine() -> Engine {
    Engine::in_memory(Config::default()).unwrap()
}

/// A followed by B three times, 50-60 seconds apart.
fn record_ab(engine: &Engine) {
    for (a, b) in [(0, 10), (60, 70), (130, 140)] {
        engine.record(NewEvent::success("A", t(a))).unwrap();
        engine.record(NewEvent::success("B", t(b))).unwrap();
    }
}

fn snapshot_with(key: PatternKey, stats: PatternStats) -> PatternSnapshot {
    PatternSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: t(0),
        patterns: vec![PatternRecord { key, stats }],
    }
}

#[test]
fn test_repeated_pair_becomes_suggestion() {
    let engine = engine();
    record_ab(&engine);
    engine.record(NewEvent::success("A", t(200))).unwrap();

    let suggestions = engine.suggest_for("A", t(200));
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].key(), PatternKey::new("A", "B"));
    assert!((suggestions[0].confidence - 1.0).abs() < 1e-12);
    assert_eq!(
        suggestions[0].message,
        "You often run 'B' after 'A'. Run it now?"
    );
}

#[test]
fn test_cooldown_suppresses_repeat_emission() {
    let engine = engine();
    record_ab(&engine);

    assert_eq!(engine.suggest_for("A", t(140)).len(), 1);
    assert!(engine.suggest_for("A", t(141)).is_empty());
    assert_eq!(
        engine.lifecycle(&PatternKey::new("A", "B"), t(141)),
        PatternState::Suggested
    );
    assert_eq!(engine.suggest_for("A", t(140 + 300)).len(), 1);
}

#[test]
fn test_unknown_action_has_no_suggestions() {
    let engine = engine();
    record_ab(&engine);
    assert!(engine.suggest_for("C", t(200)).is_empty());
}

#[test]
fn test_concurrent_producers_get_dense_sequences() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|name| {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    engine
                        .record(NewEvent::success(format!("{name}-{}", i % 5), t(i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let seqs: Vec<u64> = engine
        .log()
        .iterate(1)
        .map(|e| e.unwrap().seq)
        .collect();
    assert_eq!(seqs, (1..=2000).collect::<Vec<u64>>());
    assert_eq!(engine.log().len().unwrap(), 2000);
    assert_eq!(engine.processed_through(), 2000);
}

#[test]
fn test_dismissals_floor_weight() {
    let engine = engine();
    let key = PatternKey::new("A", "B");
    engine.import_patterns(snapshot_with(
        key.clone(),
        PatternStats {
            antecedent_count: 4.0,
            episode_count: 4.0,
            last_seen_at: t(0),
            decayed_through: None,
            feedback_weight: 0.2,
        },
    ));

    let weights: Vec<f64> = (0..5)
        .map(|_| engine.feedback(&key, Decision::Dismissed).unwrap())
        .collect();
    assert!(weights.windows(2).all(|w| w[1] <= w[0]));
    assert!(weights.iter().all(|w| *w >= 0.1));
    assert!((weights[4] - 0.1).abs() < 1e-12);
}

#[test]
fn test_feedback_on_unknown_pattern_is_noop() {
    let engine = engine();
    let err = engine
        .feedback(&PatternKey::new("x", "y"), Decision::Accepted)
        .unwrap_err();
    assert!(err.is_noop());
    assert!(!err.is_fatal());
}

#[test]
fn test_accept_outranks_dismissed_sibling() {
    let engine = engine();
    for round in 0..3 {
        let base = round * 300;
        engine.record(NewEvent::success("A", t(base))).unwrap();
        engine.record(NewEvent::success("B", t(base + 10))).unwrap();
        engine.record(NewEvent::success("C", t(base + 20))).unwrap();
    }
    engine
        .feedback(&PatternKey::new("A", "B"), Decision::Dismissed)
        .unwrap();
    engine
        .feedback(&PatternKey::new("A", "C"), Decision::Accepted)
        .unwrap();

    let order: Vec<String> = engine
        .suggest_for("A", t(620))
        .into_iter()
        .map(|s| s.consequent)
        .collect();
    assert_eq!(order, vec!["C".to_string(), "B".to_string()]);
}

#[test]
fn test_promote_pins_max_weight() {
    let engine = engine();
    record_ab(&engine);
    let key = PatternKey::new("A", "B");

    let descriptor = engine.promote(&key).unwrap();
    assert_eq!(descriptor.steps, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(descriptor.source, key);
    let weight = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == key)
        .unwrap()
        .1
        .feedback_weight;
    assert!((weight - 2.0).abs() < 1e-12);

    assert!(matches!(
        engine.promote(&PatternKey::new("B", "Z")),
        Err(HabitError::UnknownPattern { .. })
    ));
}

#[test]
fn test_cancelled_rebuild_leaves_store_untouched() {
    let engine = engine();
    record_ab(&engine);
    engine
        .feedback(&PatternKey::new("A", "B"), Decision::Accepted)
        .unwrap();
    let before = engine.patterns();

    let err = engine.rebuild(&AtomicBool::new(true)).unwrap_err();
    assert!(matches!(err, HabitError::RebuildInterrupted { processed: 0 }));
    pretty_assertions::assert_eq!(engine.patterns(), before);
    assert_eq!(engine.processed_through(), 6);
}

/// Lets `remaining` checks through, then reports cancellation.
struct CancelAfter {
    remaining: AtomicUsize,
}

impl CancelCheck for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_err()
    }
}

#[test]
fn test_rebuild_cancelled_midway_leaves_store_untouched() {
    let engine = engine();
    for i in 0..1000 {
        let action = ["open", "edit", "save", "close"][i % 4];
        engine
            .record(NewEvent::success(action, t(i as i64 * 20)))
            .unwrap();
    }
    engine
        .feedback(&PatternKey::new("open", "edit"), Decision::Accepted)
        .unwrap();
    let before = engine.patterns();

    let cancel = CancelAfter {
        remaining: AtomicUsize::new(500),
    };
    let err = engine.rebuild(&cancel).unwrap_err();
    assert!(matches!(err, HabitError::RebuildInterrupted { processed: 500 }));
    pretty_assertions::assert_eq!(engine.patterns(), before);
    assert_eq!(engine.processed_through(), 1000);

    // Mining continues on the untouched window.
    engine.record(NewEvent::success("open", t(20_000))).unwrap();
    assert_eq!(engine.processed_through(), 1001);
}

#[test]
fn test_unfollowed_history_keeps_new_pair_quiet() {
    let engine = engine();
    for i in 0..10 {
        engine.record(NewEvent::success("A", t(i * 1000))).unwrap();
    }
    for i in 0..3 {
        let base = 20_000 + i * 1000;
        engine.record(NewEvent::success("A", t(base))).unwrap();
        engine.record(NewEvent::success("B", t(base + 10))).unwrap();
    }

    let stats = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == PatternKey::new("A", "B"))
        .unwrap()
        .1;
    assert!((stats.confidence() - 3.0 / 13.0).abs() < 1e-12);
    assert!(engine.suggest_for("A", t(22_010)).is_empty());
}

#[test]
fn test_rebuild_keeps_feedback_weights() {
    let engine = engine();
    record_ab(&engine);
    let key = PatternKey::new("A", "B");
    let weight = engine.feedback(&key, Decision::Accepted).unwrap();

    engine.rebuild(&AtomicBool::new(false)).unwrap();
    let after = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == key)
        .unwrap()
        .1;
    assert!((after.feedback_weight - weight).abs() < 1e-12);
}

#[test]
fn test_corrupt_records_skipped_on_open() {
    let store = memory::in_memory_store().unwrap();
    store
        .insert_action_event(1, "A", "2026-03-01T09:00:00Z", "success", "{}")
        .unwrap();
    store
        .insert_action_event(2, "X", "not-a-timestamp", "success", "{}")
        .unwrap();
    store
        .insert_action_event(3, "B", "2026-03-01T09:00:10Z", "success", "{}")
        .unwrap();

    let engine = Engine::with_store(store, Config::default()).unwrap();
    let keys: Vec<PatternKey> = engine.patterns().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![PatternKey::new("A", "B")]);

    // Numbering continues past the corrupt row.
    let seq = engine.record(NewEvent::success("C", t(20))).unwrap();
    assert_eq!(seq, 4);
}

#[test]
fn test_snapshot_moves_patterns_between_engines() {
    let source = engine();
    record_ab(&source);
    let json = source.export_patterns().to_json().unwrap();

    let target = engine();
    let changed = target.import_patterns(PatternSnapshot::from_json(&json).unwrap());
    assert_eq!(changed, source.patterns().len());
    assert_eq!(target.suggest_for("A", t(140)).len(), 1);

    // Same data again: nothing is newer, nothing changes.
    assert_eq!(
        target.import_patterns(PatternSnapshot::from_json(&json).unwrap()),
        0
    );
}

#[test]
fn test_reopen_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitual.db");
    let key = PatternKey::new("A", "B");
    {
        let engine = Engine::open(&path, Config::default()).unwrap();
        record_ab(&engine);
        engine.feedback(&key, Decision::Dismissed).unwrap();
        engine.checkpoint().unwrap();
    }

    let engine = Engine::open(&path, Config::default()).unwrap();
    assert_eq!(engine.processed_through(), 6);
    let stats = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == key)
        .unwrap()
        .1;
    assert!((stats.feedback_weight - 0.8).abs() < 1e-12);
    assert_eq!(stats.episode_count, 3.0);

    // The window was rebuilt too: the next B still pairs with the last A.
    engine.record(NewEvent::success("A", t(400))).unwrap();
    assert_eq!(engine.record(NewEvent::success("B", t(410))).unwrap(), 8);
    let stats = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == key)
        .unwrap()
        .1;
    assert_eq!(stats.episode_count, 4.0);
}

#[test]
fn test_reopen_mines_tail_after_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habitual.db");
    let key = PatternKey::new("A", "B");
    {
        let engine = Engine::open(&path, Config::default()).unwrap();
        engine.record(NewEvent::success("A", t(0))).unwrap();
        engine.record(NewEvent::success("B", t(10))).unwrap();
        engine.checkpoint().unwrap();
        // Logged after the checkpoint; only the log has them.
        engine.record(NewEvent::success("A", t(60))).unwrap();
        engine.record(NewEvent::success("B", t(70))).unwrap();
    }

    let engine = Engine::open(&path, Config::default()).unwrap();
    assert_eq!(engine.processed_through(), 4);
    let stats = engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == key)
        .unwrap()
        .1;
    assert_eq!((stats.antecedent_count, stats.episode_count), (2.0, 2.0));
}

#[test]
fn test_routines_ranked_by_use() {
    let engine = engine();
    record_ab(&engine);
    engine.record(NewEvent::success("A", t(500))).unwrap();
    let routines = engine.routines(5).unwrap();
    assert_eq!(
        routines,
        vec![("A".to_string(), 4), ("B".to_string(), 3)]
    );
}
