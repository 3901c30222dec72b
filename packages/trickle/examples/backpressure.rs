//! Subscribers that pull items at their own pace.

use std::sync::Arc;

use parking_lot::Mutex;
use trickle::{Error, Flux, Subscriber, SubscriptionHandle, UNBOUNDED};

/// Requests `batch` more items every time the previous batch has arrived.
struct Batched {
    batch: u64,
    received_in_batch: u64,
    subscription: Option<SubscriptionHandle>,
    items: Arc<Mutex<Vec<i64>>>,
}

impl Subscriber<i64> for Batched {
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        subscription.request(self.batch);
        self.subscription = Some(subscription);
    }

    fn on_next(&mut self, item: i64) {
        self.items.lock().push(item);
        self.received_in_batch += 1;

        if self.received_in_batch == self.batch {
            self.received_in_batch = 0;

            if let Some(subscription) = &self.subscription {
                subscription.request(self.batch);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        println!("batched subscriber failed: {error}");
    }

    fn on_complete(&mut self) {
        println!("batched subscriber completed");
    }
}

/// Starts by requesting 2 items, then requests one more than last time after every item until
/// it reaches a request of 10, after which it requests nothing more.
struct Growing {
    next_request: u64,
    subscription: Option<SubscriptionHandle>,
    items: Arc<Mutex<Vec<i64>>>,
}

impl Subscriber<i64> for Growing {
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        subscription.request(self.next_request);
        self.subscription = Some(subscription);
    }

    fn on_next(&mut self, item: i64) {
        self.items.lock().push(item);
        self.next_request += 1;

        if self.next_request <= 10 {
            if let Some(subscription) = &self.subscription {
                subscription.request(self.next_request);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        println!("growing subscriber failed: {error}");
    }

    fn on_complete(&mut self) {
        println!("growing subscriber completed");
    }
}

fn main() {
    testing::init_tracing();

    let items = Arc::new(Mutex::new(Vec::<i64>::new()));

    // Requesting the maximum is the same as switching backpressure off.
    Flux::just([1, 2, 3, 4, 5, 6])
        .log("unbounded")
        .for_each({
            let items = Arc::clone(&items);
            move |item| items.lock().push(item)
        });
    println!("unbounded demand is {UNBOUNDED}, received {:?}", items.lock());

    items.lock().clear();
    Flux::range(1, 6).log("batched").subscribe(Batched {
        batch: 2,
        received_in_batch: 0,
        subscription: None,
        items: Arc::clone(&items),
    });
    println!("batches of two received {:?}", items.lock());

    items.lock().clear();
    Flux::range(10, 90).log("growing").subscribe(Growing {
        next_request: 2,
        subscription: None,
        items: Arc::clone(&items),
    });
    println!(
        "growing requests received {} of 90 items",
        items.lock().len()
    );
}
