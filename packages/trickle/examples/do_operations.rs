//! Side effects attached to signals, fallbacks for empty sequences, timers and disposal.

use std::thread;
use std::time::{Duration, Instant};

use trickle::{Error, Flux};

fn main() {
    testing::init_tracing();

    Flux::just(["four", "five", "six"])
        .do_on_next(|word| println!("{} via do_on_next", word.to_uppercase()))
        .do_on_complete(|| println!("completed via do_on_complete"))
        .consume();

    Flux::range(5, 5)
        .do_on_next(|number| println!("{} via do_on_next", number * number))
        .do_on_complete(|| println!("no more numbers"))
        .consume();

    Flux::just(["four", "five", "six"]).for_each_with(
        |word| println!("{} via subscribe", word.to_uppercase()),
        |error| println!("unexpected: {error}"),
        || println!("completed via subscribe"),
    );

    Flux::<String>::error(Error::msg("some state error"))
        .do_on_error(|_| println!("caught error using do_on_error"))
        .for_each_with(|item| println!("{item}"), |_| {}, || {});

    Flux::range(5, 5)
        .try_map(|number| {
            if number == 9 {
                Err(Error::msg("Number 9 cannot be used"))
            } else {
                Ok(number)
            }
        })
        .do_on_error(|error| println!("{error}"))
        .for_each_with(|number| println!("{number}"), |_| {}, || {});

    Flux::<String>::error(Error::msg("some state error")).for_each_with(
        |item| println!("{item}"),
        |_| println!("caught error using subscribe"),
        || {},
    );

    Flux::empty()
        .switch_if_empty(Flux::just(["empty flux via switch_if_empty"]))
        .for_each(|text| println!("{text}"));

    Flux::empty()
        .default_if_empty("empty flux via default_if_empty")
        .for_each(|text| println!("{text}"));

    // Interval ticks arrive on a timer thread.
    let ticks = Flux::interval(Duration::from_millis(100))
        .map(|tick| format!("tick: {tick}"))
        .take(5)
        .into_blocking_iter();

    for tick in ticks {
        match tick {
            Ok(tick) => println!("{tick}"),
            Err(error) => println!("timer failed: {error}"),
        }
    }

    let started = Instant::now();
    Flux::generate(move || started.elapsed())
        .take(6)
        .for_each(|elapsed| println!("generated after {elapsed:?}"));

    // Disposing cancels a sequence that would otherwise run forever.
    let disposable = Flux::interval(Duration::from_millis(10))
        .for_each(|tick| println!("to be disposed: {tick}"));
    thread::sleep(Duration::from_millis(50));
    disposable.dispose();
    println!("disposed: {}", disposable.is_disposed());
}
