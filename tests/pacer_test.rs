//! Adaptive pacer invariants.
//!
//! Each test uses its own isolated pacer instance so tests can run in
//! parallel.

use pagepilot::{AdaptivePacer, PacerSettings};

fn settings() -> PacerSettings {
    PacerSettings {
        base_delay: 2.0,
        min_delay: 0.5,
        max_delay: 10.0,
        success_increment: 0.1,
        failure_decrement: 0.2,
    }
}

#[test]
fn delay_stays_bounded_under_any_sequence() {
    let pacer = AdaptivePacer::new(settings());

    // Alternate long streaks in both directions.
    for i in 0..200 {
        let success = (i / 17) % 2 == 0;
        let delay = pacer.next_delay(success);
        let stats = pacer.stats();
        assert!(stats.current_delay >= 0.5, "delay {} below min", stats.current_delay);
        assert!(stats.current_delay <= 10.0, "delay {} above max", stats.current_delay);
        // Returned delay adds jitter in [0, 1].
        assert!(delay >= stats.current_delay);
        assert!(delay <= stats.current_delay + 1.0);
    }
}

#[test]
fn success_rate_stays_in_range() {
    let pacer = AdaptivePacer::new(settings());
    for _ in 0..50 {
        pacer.next_delay(false);
        let rate = pacer.stats().success_rate;
        assert!((0.1..=1.0).contains(&rate));
    }
    for _ in 0..50 {
        pacer.next_delay(true);
        let rate = pacer.stats().success_rate;
        assert!((0.1..=1.0).contains(&rate));
    }
}

#[test]
fn failures_double_delay_and_successes_shrink_it() {
    let pacer = AdaptivePacer::new(settings());

    pacer.next_delay(false);
    assert_eq!(pacer.stats().current_delay, 4.0);
    pacer.next_delay(false);
    assert_eq!(pacer.stats().current_delay, 8.0);
    pacer.next_delay(false);
    assert_eq!(pacer.stats().current_delay, 10.0); // clamped

    pacer.next_delay(true);
    assert_eq!(pacer.stats().current_delay, 9.0);
}

#[test]
fn mixed_run_lands_strictly_inside_bounds() {
    let pacer = AdaptivePacer::new(settings());

    // Ten requests, five failures, interleaved.
    for i in 0..10 {
        pacer.next_delay(i % 2 == 0);
    }

    let stats = pacer.stats();
    assert!(stats.current_delay > 0.5);
    assert!(stats.current_delay < 10.0);
    assert!(stats.success_rate >= 0.1 && stats.success_rate <= 1.0);
    assert_eq!(stats.total_requests, 10);
    assert_eq!(stats.successful_requests, 5);
}

#[test]
fn floor_and_ceiling_are_sticky_not_exceeded() {
    let pacer = AdaptivePacer::new(settings());

    for _ in 0..100 {
        pacer.next_delay(true);
    }
    assert_eq!(pacer.stats().current_delay, 0.5);
    assert_eq!(pacer.stats().success_rate, 1.0);

    for _ in 0..100 {
        pacer.next_delay(false);
    }
    assert_eq!(pacer.stats().current_delay, 10.0);
    assert!((pacer.stats().success_rate - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn wait_sleeps_without_failing() {
    let pacer = AdaptivePacer::new(PacerSettings {
        base_delay: 0.01,
        min_delay: 0.0,
        max_delay: 0.02,
        success_increment: 0.1,
        failure_decrement: 0.2,
    });
    // Must never panic or error regardless of outcome pattern.
    pacer.wait(true).await;
    pacer.wait(false).await;
    assert_eq!(pacer.stats().total_requests, 2);
}
