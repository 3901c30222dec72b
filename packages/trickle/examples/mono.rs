//! Sequences of at most one item.

use futures::executor::block_on;
use trickle::{Error, Mono};

fn main() {
    Mono::just("Trickle")
        .map(|word| word.to_uppercase())
        .map(|word| format!("{word} makes backpressure visible!"))
        .for_each(|text| println!("{text}"));

    Mono::just(10)
        .map(|number| number * number)
        .for_each(|square| println!("{square}"));

    Mono::<String>::error(Error::msg("some state error"))
        .do_on_error(|_| println!("caught Mono error"))
        .for_each_with(|item| println!("{item}"), |_| {}, || {});

    Mono::empty()
        .default_if_empty("empty Mono is handled via default_if_empty")
        .for_each(|text| println!("{text}"));

    Mono::empty()
        .switch_if_empty(Mono::just("empty Mono is handled via switch_if_empty"))
        .for_each(|text| println!("{text}"));

    // A Mono is also a future.
    match block_on(Mono::just(6).flat_map(|n| Mono::just(n * 7)).into_future()) {
        Ok(answer) => println!("awaited: {answer:?}"),
        Err(error) => println!("failed: {error}"),
    }
}
