// tests/miner_test.rs — Integration test: mining semantics through the engine

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Duration, TimeZone, Utc};
use habitual::infra::config::Config;
use habitual::patterns::types::{NewEvent, PatternKey, PatternStats};
use habitual::Engine;
use pretty_assertions::assert_eq;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn engine() -> Engine {
    Engine::in_memory(Config::default()).unwrap()
}

/// Deterministic pseudo-random workload: a handful of actions, gaps between
/// 0 and 200 seconds, occasional failures.
fn workload(n: usize) -> Vec<NewEvent> {
    let actions = ["open", "edit", "build", "test", "commit", "push"];
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 33) as usize
    };

    let mut at = t0();
    (0..n)
        .map(|_| {
            at += Duration::seconds((next() % 200) as i64);
            let action = actions[next() % actions.len()];
            if next() % 10 == 0 {
                NewEvent::failure(action, at)
            } else {
                NewEvent::success(action, at)
            }
        })
        .collect()
}

fn stats(engine: &Engine, a: &str, b: &str) -> Option<PatternStats> {
    engine
        .patterns()
        .into_iter()
        .find(|(k, _)| *k == PatternKey::new(a, b))
        .map(|(_, s)| s)
}

#[test]
fn test_rebuild_matches_incremental() {
    let engine = engine();
    for event in workload(500) {
        engine.record(event).unwrap();
    }
    let incremental = engine.patterns();
    assert!(!incremental.is_empty());

    let report = engine.rebuild(&AtomicBool::new(false)).unwrap();
    assert_eq!(report.events, 500);
    assert_eq!(engine.patterns(), incremental);
}

#[test]
fn test_rebuild_then_tail_matches_incremental() {
    let events = workload(400);

    let whole = engine();
    for event in events.iter().cloned() {
        whole.record(event).unwrap();
    }

    let split = engine();
    for event in events[..250].iter().cloned() {
        split.record(event).unwrap();
    }
    split.rebuild(&AtomicBool::new(false)).unwrap();
    for event in events[250..].iter().cloned() {
        split.record(event).unwrap();
    }

    assert_eq!(split.patterns(), whole.patterns());
    assert_eq!(split.processed_through(), 400);
}

#[test]
fn test_window_boundary_is_exclusive() {
    let at_limit = engine();
    at_limit.record(NewEvent::success("a", t0())).unwrap();
    at_limit
        .record(NewEvent::success("b", t0() + Duration::seconds(120)))
        .unwrap();
    assert!(stats(&at_limit, "a", "b").is_none());

    let inside = engine();
    inside.record(NewEvent::success("a", t0())).unwrap();
    inside
        .record(NewEvent::success("b", t0() + Duration::milliseconds(119_999)))
        .unwrap();
    let s = stats(&inside, "a", "b").unwrap();
    assert_eq!((s.antecedent_count, s.episode_count), (1.0, 1.0));
}

#[test]
fn test_late_event_does_not_become_antecedent_of_earlier_time() {
    let engine = engine();
    engine.record(NewEvent::success("b", t0() + Duration::seconds(30))).unwrap();
    // Logged later but happened earlier: nothing precedes it in the window.
    engine.record(NewEvent::success("a", t0())).unwrap();
    assert!(stats(&engine, "b", "a").is_none());
}

#[test]
fn test_self_transitions_ignored() {
    let engine = engine();
    for secs in [0, 5, 10] {
        engine
            .record(NewEvent::success("refresh", t0() + Duration::seconds(secs)))
            .unwrap();
    }
    assert!(engine.patterns().is_empty());
}

#[test]
fn test_confidence_bounds_hold_through_decay() {
    let engine = engine();
    for event in workload(300) {
        engine.record(event).unwrap();
    }
    let check = |engine: &Engine| {
        for (key, s) in engine.patterns() {
            assert!(s.episode_count <= s.antecedent_count, "{key}: {s:?}");
            let c = s.confidence();
            assert!((0.0..=1.0).contains(&c), "{key}: confidence {c}");
        }
    };
    check(&engine);

    let last = engine.patterns().iter().map(|(_, s)| s.last_seen_at).max().unwrap();
    for days in [1, 3, 10] {
        engine.decay(last + Duration::days(days));
        check(&engine);
    }
}

#[test]
fn test_decay_monotone_until_pruned() {
    let engine = engine();
    engine.record(NewEvent::success("a", t0())).unwrap();
    engine.record(NewEvent::success("b", t0() + Duration::seconds(5))).unwrap();

    let mut prev = stats(&engine, "a", "b").unwrap().episode_count;
    let mut pruned = false;
    for day in 1..=40 {
        engine.decay(t0() + Duration::days(day));
        match stats(&engine, "a", "b") {
            Some(s) => {
                assert!(s.episode_count < prev);
                prev = s.episode_count;
            }
            None => {
                pruned = true;
                break;
            }
        }
    }
    assert!(pruned);
}

#[test]
fn test_failures_mined_when_enabled() {
    let mut config = Config::default();
    config.mining.include_failures = true;
    let engine = Engine::in_memory(config).unwrap();
    engine.record(NewEvent::success("build", t0())).unwrap();
    engine
        .record(NewEvent::failure("deploy", t0() + Duration::seconds(5)))
        .unwrap();
    assert!(stats(&engine, "build", "deploy").is_some());

    let default = Engine::in_memory(Config::default()).unwrap();
    default.record(NewEvent::success("build", t0())).unwrap();
    default
        .record(NewEvent::failure("deploy", t0() + Duration::seconds(5)))
        .unwrap();
    assert!(stats(&default, "build", "deploy").is_none());
}
