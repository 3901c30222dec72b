//! A publisher, a hand-written subscriber and the signals that pass between them.
//!
//! Run with `RUST_LOG=info` (the default) to see every signal logged by the `log()` operator:
//! one `onSubscribe`, a series of `onNext` and a single `onComplete`.

use std::fmt::Debug;

use trickle::{Error, Flux, Subscriber, SubscriptionHandle};

/// Asks for three items and then stays silent, so the sequence never gets to complete.
struct FirstThree {
    name: &'static str,
}

impl<T> Subscriber<T> for FirstThree
where
    T: Debug,
{
    fn on_subscribe(&mut self, subscription: SubscriptionHandle) {
        subscription.request(3);
    }

    fn on_next(&mut self, item: T) {
        println!("{}: received {item:?}", self.name);
    }

    fn on_error(&mut self, error: Error) {
        println!("{}: failed with {error}", self.name);
    }

    fn on_complete(&mut self) {
        println!("{}: completed", self.name);
    }
}

fn main() {
    testing::init_tracing();

    // Consumed with unbounded demand.
    Flux::just([1, 2, 3, 4, 5, 6]).log("numbers").consume();
    Flux::just(["Jon", "Mary", "Tina", "Ave"]).log("names").consume();

    // Consumed three at a time by a subscriber that never asks for more.
    Flux::just([11, 12, 13, 14, 15, 16])
        .log("numbers")
        .subscribe(FirstThree { name: "numbers" });

    Flux::just(["Jon", "Mary", "Tina", "Ave"])
        .log("names")
        .subscribe(FirstThree { name: "names" });
}
