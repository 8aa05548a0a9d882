use std::time::Duration;

use crate::ManualClock;

use super::{
    runtime::{block_on, block_on_multi_thread},
    support::{T0_MS, limiter, memory_context},
};

#[test]
fn first_window_behaves_like_fixed_window() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "k", 10, 10, "sliding_window");

    block_on(async {
        for _ in 0..10 {
            assert!(l.increment().await.unwrap().allowed);
        }

        let decision = l.increment().await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.current_count, 11);
    });
}

#[test]
fn previous_window_is_weighted_by_remaining_fraction() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "k", 10, 10, "sliding_window");

    block_on(async {
        for _ in 0..10 {
            l.increment().await.unwrap();
        }

        // Halfway into the next window the previous 10 weigh 5.
        clock.advance(Duration::from_secs(15));
        assert_eq!(l.count().await.unwrap(), 0);
        assert_eq!(l.remaining().await.unwrap(), 5);

        let mut admitted = 0;
        for _ in 0..8 {
            admitted += l.increment().await.unwrap().allowed as u64;
        }

        assert_eq!(admitted, 5);
        assert_eq!(l.count().await.unwrap(), 8);
        assert!(l.is_exceeded(1).await.unwrap());
    });
}

#[test]
fn non_integer_estimate_admits_below_max() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "k", 10, 10, "sliding_window");

    block_on(async {
        // 11 recorded in the previous window (one of them denied).
        for _ in 0..11 {
            l.increment().await.unwrap();
        }

        // weight 0.5: effective before each call is pre + 5.5
        clock.advance(Duration::from_secs(15));

        let mut admitted = 0;
        for _ in 0..6 {
            admitted += l.increment().await.unwrap().allowed as u64;
        }

        assert_eq!(admitted, 5);
    });
}

#[test]
fn previous_window_stops_counting_after_two_periods() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "k", 4, 1, "sliding_window");

    block_on(async {
        for _ in 0..4 {
            l.increment().await.unwrap();
        }

        clock.advance(Duration::from_millis(2_000));
        assert_eq!(l.remaining().await.unwrap(), 4);

        for _ in 0..4 {
            assert!(l.increment().await.unwrap().allowed);
        }
    });
}

#[test]
fn reset_clears_current_and_previous_windows() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "k", 4, 10, "sliding_window");

    block_on(async {
        for _ in 0..4 {
            l.increment().await.unwrap();
        }

        clock.advance(Duration::from_secs(12));
        l.increment().await.unwrap();

        l.reset().await.unwrap();
        assert_eq!(l.count().await.unwrap(), 0);
        assert_eq!(l.remaining().await.unwrap(), 4);
    });
}

#[test]
fn sliding_and_fixed_limiters_do_not_share_counters() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let sliding = limiter(&rl, "k", 1, 10, "sliding_window");
    let fixed = limiter(&rl, "k", 1, 10, "fixed_window");

    block_on(async {
        assert!(sliding.increment().await.unwrap().allowed);
        assert!(fixed.increment().await.unwrap().allowed);
        assert_ne!(sliding.current_key(), fixed.current_key());
    });
}

#[test]
fn concurrent_tasks_admit_at_most_max() {
    let clock = ManualClock::new(T0_MS);
    let (rl, _store) = memory_context(&clock);
    let l = limiter(&rl, "hot", 10, 1, "sliding");

    let admitted = block_on_multi_thread(async move {
        let mut handles = Vec::with_capacity(100);

        for _ in 0..100 {
            let l = l.clone();
            handles.push(tokio::spawn(async move { l.increment().await.unwrap() }));
        }

        let mut admitted = 0u64;
        for handle in handles {
            admitted += handle.await.unwrap().allowed as u64;
        }

        admitted
    });

    assert_eq!(admitted, 10);
}
