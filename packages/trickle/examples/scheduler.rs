//! Moving a pipeline onto a pool of workers or onto a single serial worker.

use std::time::Duration;

use trickle::{Flux, Pool, TestSubscriber};

fn main() {
    testing::init_tracing();

    let parallel = Pool::parallel();
    println!("parallel pool has {} workers", parallel.worker_count());

    let doubled = TestSubscriber::new();
    Flux::just([1, 2, 3, 4])
        .log("parallel")
        .map(|i| i * 2)
        .subscribe_on(parallel.scheduler())
        .subscribe(doubled.clone());

    let names = TestSubscriber::new();
    Flux::from_iterable(vec!["jon", "peter", "john", "mary"])
        .map(|name| {
            let mut chars = name.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .subscribe_on(parallel.scheduler())
        .subscribe(names.clone());

    let single = Pool::single();
    let serial = TestSubscriber::new();
    Flux::just([1, 2, 3, 4])
        .log("single")
        .map(|i| i * 2)
        .subscribe_on(single.scheduler())
        .subscribe(serial.clone());

    // `subscribe_on()` returns immediately, the work happens on the pools.
    for (label, probe) in [("parallel", &doubled), ("single", &serial)] {
        if probe.await_terminal(Duration::from_secs(10)) {
            println!("{label}: {:?}", probe.items());
        } else {
            println!("{label}: timed out");
        }
    }

    if names.await_terminal(Duration::from_secs(10)) {
        println!("capitalized: {:?}", names.items());
    }
}
