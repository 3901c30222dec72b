//! Operator pipelines observed end to end through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use new_zealand::nz;
use testing::{Collected, with_watchdog};
use trickle::{Error, Flux, Mono, TestSubscriber};

#[test]
fn filter_keeps_multiples_of_twenty() {
    let probe = TestSubscriber::new();
    Flux::from_iterable(vec![10, 20, 30, 40])
        .filter(|x| x % 20 == 0)
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![20, 40]);
    assert_eq!(
        probe.signal_names(),
        vec!["onSubscribe", "onNext", "onNext", "onComplete"]
    );
}

#[test]
fn zip_length_is_minimum_of_both_sides() {
    for (m, n) in [(0, 5), (5, 0), (3, 7), (7, 3), (4, 4)] {
        let probe = TestSubscriber::new();
        Flux::zip(Flux::range(0, m), Flux::range(0, n)).subscribe(probe.clone());

        let count = u64::try_from(probe.item_count()).unwrap();
        assert_eq!(count, m.min(n), "zip of {m} and {n} items");
        assert!(probe.is_completed());
    }
}

#[test]
fn zip_stops_pulling_the_longer_side() {
    let pulled = Arc::new(AtomicU64::new(0));

    let long_side = Flux::generate({
        let pulled = Arc::clone(&pulled);
        move || {
            pulled.fetch_add(1, Ordering::Relaxed);
            'x'
        }
    });

    let probe = TestSubscriber::new();
    Flux::zip(long_side, Flux::just([1, 2])).subscribe(probe.clone());

    assert_eq!(probe.items(), vec![('x', 1), ('x', 2)]);
    assert!(probe.is_completed());

    // Only the prefetch plus one replenishment per pair was ever asked for.
    let pulled_at_completion = pulled.load(Ordering::Relaxed);
    assert!(pulled_at_completion < 100);

    probe.request(10);
    assert_eq!(pulled.load(Ordering::Relaxed), pulled_at_completion);
}

#[test]
fn flat_map_completes_after_all_inners() {
    let probe = TestSubscriber::new();
    Flux::just([1, 2, 3])
        .flat_map(|x| Flux::just([x * 10, x * 10 + 1]))
        .subscribe(probe.clone());

    let mut items = probe.items();
    items.sort_unstable();

    assert_eq!(items, vec![10, 11, 20, 21, 30, 31]);
    assert!(probe.is_completed());
}

#[test]
fn flat_map_serial_preserves_order() {
    let probe = TestSubscriber::new();
    Flux::range(0, 4)
        .flat_map_with(|x| Flux::range(x * 100, 3), nz!(1))
        .subscribe(probe.clone());

    assert_eq!(
        probe.items(),
        vec![0, 1, 2, 100, 101, 102, 200, 201, 202, 300, 301, 302]
    );
}

#[test]
fn flat_map_inner_error_cancels_everything() {
    let pulled = Arc::new(AtomicU64::new(0));
    let hook_fired = Arc::new(AtomicBool::new(false));

    let probe = TestSubscriber::new();
    Flux::generate({
        let pulled = Arc::clone(&pulled);
        move || pulled.fetch_add(1, Ordering::Relaxed)
    })
    .flat_map(|x| {
        if x == 2 {
            Flux::error(Error::msg("inner failed"))
        } else {
            Flux::just([x])
        }
    })
    .do_on_error({
        let hook_fired = Arc::clone(&hook_fired);
        move |_| hook_fired.store(true, Ordering::Relaxed)
    })
    .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![0, 1]);
    assert!(
        probe
            .error()
            .is_some_and(|e| e.to_string().contains("inner failed"))
    );
    assert!(hook_fired.load(Ordering::Relaxed));

    // The outer source was cancelled right at the failing item.
    assert_eq!(pulled.load(Ordering::Relaxed), 3);
}

#[test]
fn flat_map_respects_downstream_demand() {
    let probe = TestSubscriber::with_initial_request(5);
    Flux::range(0, 100)
        .flat_map_with(|x| Flux::just([x, x]), nz!(2))
        .subscribe(probe.clone());

    assert_eq!(probe.item_count(), 5);
    assert!(!probe.is_completed());

    probe.request(1_000);
    assert_eq!(probe.item_count(), 200);
    assert!(probe.is_completed());
}

#[test]
fn take_synthesizes_completion_and_cancels_upstream() {
    let pulled = Arc::new(AtomicU64::new(0));

    let probe = TestSubscriber::new();
    Flux::generate(|| "hello")
        .do_on_next({
            let pulled = Arc::clone(&pulled);
            move |_| {
                pulled.fetch_add(1, Ordering::Relaxed);
            }
        })
        .take(4)
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec!["hello"; 4]);
    assert!(probe.is_completed());
    assert_eq!(pulled.load(Ordering::Relaxed), 4);
}

#[test]
fn transform_error_becomes_on_error() {
    let probe = TestSubscriber::new();
    Flux::range(1, 20)
        .try_map(|x| {
            if x == 9 {
                Err(Error::msg("Number 9 cannot be used"))
            } else {
                Ok(x * 2)
            }
        })
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![2, 4, 6, 8, 10, 12, 14, 16]);
    assert!(probe.error().is_some_and(|e| e.is_upstream_failure()));
    assert!(!probe.is_completed());
}

#[test]
fn do_hooks_fire_in_signal_order() {
    let events = Collected::new();

    Flux::just(["a", "b"])
        .do_on_next({
            let events = events.clone();
            move |item| events.push(format!("next {item}"))
        })
        .do_on_complete({
            let events = events.clone();
            move || events.push("complete".to_string())
        })
        .consume();

    assert_eq!(events.snapshot(), vec!["next a", "next b", "complete"]);
}

#[test]
fn do_on_error_sees_the_error_before_subscriber() {
    let events = Collected::new();

    Flux::<i32>::error(Error::msg("boom"))
        .do_on_error({
            let events = events.clone();
            move |error| events.push(format!("hook {error}"))
        })
        .for_each_with(
            |_| {},
            {
                let events = events.clone();
                move |error| events.push(format!("subscriber {error}"))
            },
            || {},
        );

    let events = events.snapshot();
    assert_eq!(events.len(), 2);
    assert!(events[0].starts_with("hook"));
    assert!(events[1].starts_with("subscriber"));
}

#[test]
fn switch_if_empty_carries_demand_over() {
    let probe = TestSubscriber::with_initial_request(2);
    Flux::<i64>::empty()
        .switch_if_empty(Flux::range(10, 5))
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![10, 11]);

    probe.request(10);
    assert_eq!(probe.items(), vec![10, 11, 12, 13, 14]);
    assert!(probe.is_completed());
}

#[test]
fn switch_if_empty_ignores_fallback_for_non_empty() {
    let built = Arc::new(AtomicBool::new(false));

    let probe = TestSubscriber::new();
    Flux::just([1])
        .switch_if_empty(Flux::defer({
            let built = Arc::clone(&built);
            move || {
                built.store(true, Ordering::Relaxed);
                Flux::just([2])
            }
        }))
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![1]);
    assert!(!built.load(Ordering::Relaxed));
}

#[test]
fn distinct_and_sort_compose() {
    let probe = TestSubscriber::new();
    Flux::just([5, 3, 5, 1, 3, 4])
        .distinct()
        .sort()
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![1, 3, 4, 5]);
}

#[test]
fn collect_list_into_mono() {
    let list = Flux::range(1, 4)
        .map(|x| x.to_string())
        .collect_list()
        .block()
        .unwrap();

    assert_eq!(list, Some(vec!["1".to_string(), "2".into(), "3".into(), "4".into()]));
}

#[test]
fn mono_from_flux_cancels_after_first() {
    let pulled = Arc::new(AtomicU64::new(0));

    let first = Mono::from_flux(Flux::generate({
        let pulled = Arc::clone(&pulled);
        move || pulled.fetch_add(1, Ordering::Relaxed)
    }))
    .block()
    .unwrap();

    assert_eq!(first, Some(0));
    assert_eq!(pulled.load(Ordering::Relaxed), 1);
}

#[test]
fn log_passes_everything_through() {
    testing::init_tracing();

    let probe = TestSubscriber::with_initial_request(2);
    Flux::range(0, 3).log("range").subscribe(probe.clone());
    probe.request(1);
    probe.cancel();

    assert_eq!(probe.items(), vec![0, 1, 2]);
    assert!(probe.is_completed());
}

#[test]
fn blocking_iter_surfaces_error_item() {
    let results: Vec<_> = Flux::range(0, 5)
        .try_map(|x| {
            if x < 2 {
                Ok(x)
            } else {
                Err(Error::msg("too big"))
            }
        })
        .into_blocking_iter()
        .collect();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].is_err());
}

#[cfg_attr(miri, ignore)]
#[test]
fn dropping_blocking_iter_stops_interval() {
    with_watchdog(|| {
        let ticks = Arc::new(AtomicU64::new(0));

        let first: Vec<u64> = Flux::interval(Duration::from_millis(1))
            .do_on_next({
                let ticks = Arc::clone(&ticks);
                move |_| {
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
            .into_blocking_iter()
            .take(3)
            .map(Result::unwrap)
            .collect();

        assert_eq!(first, vec![0, 1, 2]);

        // Let a tick that was already being delivered at the moment of the drop settle.
        thread::sleep(Duration::from_millis(10));

        let after_drop = ticks.load(Ordering::Relaxed);
        assert!(!testing::wait_until(Duration::from_millis(50), || {
            ticks.load(Ordering::Relaxed) > after_drop
        }));
    });
}
