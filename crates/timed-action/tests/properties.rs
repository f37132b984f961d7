//! Lifecycle properties of the pending slot

mod common;

use common::{init_tracing, Probe};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use timed_action::{
    Action, Cancelled, ScopedTimedAction, TimedAction, TimedActionConfig, TimedActionError,
    TimingDefaults,
};
use tokio::time::sleep;

const DELAY: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn test_skip_calls_share_one_settlement() {
    init_tracing();

    for n in 1..=8 {
        let probe = Probe::new();
        let timed = TimedAction::bound(probe.action(), DELAY, true).unwrap();

        let first = timed.schedule().unwrap();
        assert!(timed.is_pending());
        for _ in 1..n {
            assert_eq!(timed.schedule().unwrap(), first);
        }

        first.await.unwrap();
        assert_eq!(probe.calls(), 1, "n = {}", n);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_rejects_and_never_runs() {
    let probe = Probe::new();
    let timed = TimedAction::bound(probe.action(), DELAY, false).unwrap();

    let settlement = timed.schedule().unwrap();
    assert!(timed.cancel());
    assert!(!timed.is_pending());

    assert_eq!(settlement.await, Err(Cancelled));
    sleep(DELAY * 3).await;
    assert_eq!(probe.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_settlement_after_fulfillment() {
    let probe = Probe::new();
    let timed = TimedAction::bound(probe.action(), DELAY, true).unwrap();

    let first = timed.schedule().unwrap();
    first.clone().await.unwrap();

    let second = timed.schedule().unwrap();
    assert_ne!(first, second);
    assert!(second.cycle() > first.cycle());

    second.await.unwrap();
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_settlement_after_rejection() {
    let probe = Probe::new();
    let timed = TimedAction::bound(probe.action(), DELAY, true).unwrap();

    let first = timed.schedule().unwrap();
    timed.cancel();
    let second = timed.schedule().unwrap();

    assert_ne!(first, second);
    assert_eq!(first.await, Err(Cancelled));
    assert_eq!(second.await, Ok(()));
    assert_eq!(probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_cancel_changes_nothing() {
    let timed = TimedAction::new().unwrap();
    let before = timed.current();

    assert!(!timed.cancel());
    assert!(!timed.cancel());

    assert!(!timed.is_pending());
    assert_eq!(timed.current(), before);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_hands_out_precreated_settlement() {
    let timed = TimedAction::bound(Action::noop(), DELAY, true).unwrap();
    let precreated = timed.current();

    let scheduled = timed.schedule().unwrap();

    assert_eq!(precreated, scheduled);
    assert_eq!(precreated.await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_settlement_until_it_fires() {
    let timed = TimedAction::new().unwrap();

    let a = timed.schedule_action(Action::noop(), DELAY, false);
    sleep(Duration::from_millis(10)).await;
    let b = timed.schedule_action(Action::noop(), DELAY, false);
    assert_eq!(a, b);

    a.await.unwrap();
    let c = timed.schedule_action(Action::noop(), DELAY, false);
    assert_ne!(b, c);
}

#[tokio::test(start_paused = true)]
async fn test_bound_defaults_mask_per_call_overrides() {
    let bound = Probe::new();
    let other = Probe::new();
    let timed = TimedAction::builder()
        .action(bound.action())
        .delay(DELAY)
        .build()
        .unwrap();

    let start = tokio::time::Instant::now();
    let overrides = TimedActionConfig::new(other.action(), Duration::from_millis(500), true);
    timed.schedule_with(&overrides).unwrap().await.unwrap();

    // Bound delay wins over the 500ms override
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!((bound.calls(), other.calls()), (1, 0));
}

#[tokio::test(start_paused = true)]
async fn test_missing_action_is_a_schedule_error() {
    let timed = TimedAction::builder().delay(DELAY).build().unwrap();

    let err = timed.schedule().unwrap_err();

    assert!(matches!(err, TimedActionError::MissingAction));
    assert!(!timed.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_skip_without_action_joins_pending_cycle() {
    let probe = Probe::new();
    let timed = TimedAction::new().unwrap();

    let pending = timed.schedule_action(probe.action(), DELAY, true);
    let joined = timed
        .schedule_with(&TimedActionConfig::default().with_skip_if_pending(true))
        .unwrap();

    assert_eq!(pending, joined);
    assert_eq!(joined.await, Ok(()));
    assert_eq!(probe.calls(), 1);

    // Idle again, so the same call would have to arm a timer
    let err = timed
        .schedule_with(&TimedActionConfig::default().with_skip_if_pending(true))
        .unwrap_err();
    assert!(matches!(err, TimedActionError::MissingAction));
    assert!(!timed.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_action_panic_rejects_and_coordinator_recovers() {
    let timed = TimedAction::new().unwrap();

    let doomed = timed.schedule_action(Action::new(|| panic!("action failed")), DELAY, false);
    assert_eq!(doomed.await, Err(Cancelled));
    assert!(!timed.is_pending());

    let probe = Probe::new();
    let next = timed.schedule_action(probe.action(), DELAY, false);
    assert_eq!(next.await, Ok(()));
    assert_eq!(probe.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_defaults_from_toml_drive_timing() -> anyhow::Result<()> {
    let defaults = TimingDefaults::from_toml_str(
        r#"
        id = "autosave"
        delay_ms = 80
        skip_if_pending = true
        "#,
    )?;
    let probe = Probe::new();
    let timed = TimedAction::builder()
        .action(probe.action())
        .defaults(&defaults)
        .build()?;
    assert_eq!(timed.id(), Some("autosave"));

    let first = timed.schedule()?;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(timed.schedule()?, first);

    sleep(Duration::from_millis(30)).await;
    assert_eq!(probe.calls(), 1);
    assert!(!timed.is_pending());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scoped_owner_teardown_cancels() {
    let probe = Probe::new();
    let settlement = {
        let scoped = ScopedTimedAction::new(TimedAction::bound(probe.action(), DELAY, true).unwrap());
        scoped.schedule().unwrap()
    };

    assert_eq!(settlement.await, Err(Cancelled));
    sleep(DELAY * 2).await;
    assert_eq!(probe.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_restart_and_cancel_fire_each_cycle_once() {
    init_tracing();
    let probe = Probe::new();
    let timed = Arc::new(TimedAction::new().unwrap());

    let mut workers = Vec::new();
    for worker in 0..4u64 {
        let timed = timed.clone();
        let action = probe.action();
        workers.push(tokio::spawn(async move {
            let mut settlements = Vec::new();
            for round in 0..100u64 {
                let delay = Duration::from_micros((round * 7 + worker * 13) % 1500);
                settlements.push(timed.schedule_action(action.clone(), delay, false));
                if (round + worker) % 9 == 0 {
                    timed.cancel();
                }
                if round % 4 == 0 {
                    tokio::time::sleep(Duration::from_micros(300)).await;
                } else {
                    tokio::task::yield_now().await;
                }
            }
            settlements
        }));
    }

    let mut outcomes = HashMap::new();
    for worker in workers {
        for settlement in worker.await.unwrap() {
            let cycle = settlement.cycle();
            let outcome = tokio::time::timeout(Duration::from_secs(5), settlement)
                .await
                .expect("settlement never settled");
            // Every handle of one cycle sees the same outcome
            assert_eq!(*outcomes.entry(cycle).or_insert(outcome), outcome);
        }
    }

    assert!(!timed.is_pending());
    let fulfilled = outcomes.values().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(probe.calls(), fulfilled);
}
