//! Demand accounting across whole pipelines, including demand issued from other threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use testing::with_watchdog;
use trickle::{
    Error, Flux, Lifecycle, Subscriber, SubscriptionHandle, Termination, TestSubscriber,
};

/// Requests `batch` items at a time, asking for the next batch from inside `on_next` once the
/// previous one has been fully received. Records any item that arrives without demand.
struct BatchSubscriber {
    batch: u64,
    subscription: Option<SubscriptionHandle>,
    outstanding: u64,
    report: Arc<Mutex<BatchReport>>,
}

#[derive(Debug, Default)]
struct BatchReport {
    received: Vec<i64>,
    requests: Vec<u64>,
    excess: u64,
    completed: bool,
}

impl BatchSubscriber {
    fn request_batch(&mut self) {
        if let Some(subscription) = &self.subscription {
            self.outstanding += self.batch;
            self.report.lock().requests.push(self.batch);
            subscription.request(self.batch);
        }
    }
}

impl Subscriber<i64> for BatchSubscriber {
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        self.subscription = Some(subscription);
        self.request_batch();
    }

    fn on_next(&mut self, item: i64) {
        {
            let mut report = self.report.lock();
            report.received.push(item);

            if self.outstanding == 0 {
                report.excess += 1;
            }
        }

        self.outstanding = self.outstanding.saturating_sub(1);

        if self.outstanding == 0 {
            self.request_batch();
        }
    }

    fn on_error(&mut self, error: Error) {
        panic!("unexpected error: {error}");
    }

    fn on_complete(&mut self) {
        self.report.lock().completed = true;
    }
}

#[test]
fn incremental_requests_from_on_next_never_exceed_demand() {
    let report = Arc::new(Mutex::new(BatchReport::default()));

    Flux::range(0, 100).subscribe(BatchSubscriber {
        batch: 3,
        subscription: None,
        outstanding: 0,
        report: Arc::clone(&report),
    });

    let report = report.lock();
    assert_eq!(report.received, (0..100).collect::<Vec<_>>());
    assert_eq!(report.excess, 0);
    assert!(report.completed);

    // 100 items in batches of 3 means 34 batches.
    assert_eq!(report.requests.len(), 34);
}

#[test]
fn max_request_delivers_everything_at_once() {
    let probe = TestSubscriber::with_initial_request(u64::MAX);
    Flux::range(0, 10_000).subscribe(probe.clone());

    assert_eq!(probe.item_count(), 10_000);
    assert!(probe.is_completed());
}

#[test]
fn filter_pulls_more_than_it_emits() {
    let pulled = Arc::new(AtomicU64::new(0));
    let probe = TestSubscriber::with_initial_request(3);

    Flux::range(1, 1_000)
        .do_on_next({
            let pulled = Arc::clone(&pulled);
            move |_| {
                pulled.fetch_add(1, Ordering::Relaxed);
            }
        })
        .filter(|x| x % 7 == 0)
        .subscribe(probe.clone());

    assert_eq!(probe.items(), vec![7, 14, 21]);
    assert_eq!(pulled.load(Ordering::Relaxed), 21);
    assert_eq!(probe.state(), Lifecycle::AwaitingDemand);

    probe.cancel();
}

#[test]
fn cancel_after_some_items_stops_delivery() {
    let probe = TestSubscriber::with_initial_request(3);
    Flux::generate(|| "tick").subscribe(probe.clone());

    assert_eq!(probe.item_count(), 3);

    probe.cancel();
    probe.cancel();
    probe.request(10);

    assert_eq!(probe.item_count(), 3);
    assert!(!probe.is_completed());
    assert!(probe.error().is_none());
    assert_eq!(probe.state(), Lifecycle::Terminated(Termination::Cancelled));
}

#[test]
fn zero_request_terminates_with_invalid_demand() {
    let probe = TestSubscriber::with_initial_request(0);
    Flux::range(0, 10).map(|x| x + 1).subscribe(probe.clone());

    probe.request(0);

    assert!(matches!(
        probe.error(),
        Some(Error::InvalidDemand { requested: 0 })
    ));
    assert!(probe.items().is_empty());
}

#[cfg_attr(miri, ignore)]
#[test]
fn concurrent_requests_are_neither_lost_nor_reordered() {
    with_watchdog(|| {
        const THREADS: u64 = 4;
        const REQUESTS_PER_THREAD: u64 = 2_500;

        let probe = TestSubscriber::with_initial_request(0);
        Flux::range(0, THREADS * REQUESTS_PER_THREAD).subscribe(probe.clone());

        let requesters: Vec<_> = (0..THREADS)
            .map(|_| {
                let probe = probe.clone();
                thread::spawn(move || {
                    for _ in 0..REQUESTS_PER_THREAD {
                        probe.request(1);
                    }
                })
            })
            .collect();

        for requester in requesters {
            requester.join().unwrap();
        }

        assert!(probe.await_terminal(Duration::from_secs(5)));

        let expected: Vec<i64> = (0..10_000).collect();
        assert_eq!(probe.items(), expected);
        assert!(probe.is_completed());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn cancel_from_another_thread_stops_infinite_source() {
    with_watchdog(|| {
        let probe = TestSubscriber::with_initial_request(0);
        Flux::generate(|| 1_u32).subscribe(probe.clone());

        let requester = thread::spawn({
            let probe = probe.clone();
            move || {
                for _ in 0..1_000 {
                    probe.request(1);
                }
            }
        });

        requester.join().unwrap();
        probe.cancel();

        let received = probe.item_count();
        assert_eq!(received, 1_000);

        probe.request(5);
        assert_eq!(probe.item_count(), received);
    });
}
