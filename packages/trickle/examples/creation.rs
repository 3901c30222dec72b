//! The ways of creating a `Flux` and of combining two of them.

use trickle::{Error, Flux};

fn main() {
    Flux::just(["red", "white", "pink"]).for_each(|color| println!("{color}"));

    Flux::from_iterable("1,2,3,4,5,6,7".split(',').map(str::to_string).collect::<Vec<_>>())
        .try_map(|text| text.parse::<i32>().map_err(Error::upstream))
        .filter(|number| number % 2 == 0)
        .for_each(|number| println!("even: {number}"));

    Flux::just(["jon", "peter", "john", "mary"])
        .filter(|name| name.starts_with('j'))
        .for_each(|name| println!("starts with j: {name}"));

    let collected = testing::Collected::new();
    Flux::just([10, 20, 30, 40]).for_each(collected.sink());
    Flux::from_iterable(collected.snapshot()).for_each(|number| println!("collected: {number}"));

    Flux::from_iterable((1..=5).map(|n| n * 100)).for_each(|number| println!("{number}"));

    Flux::from_iterable(["jon", "peter", "john", "mary"])
        .map(str::to_uppercase)
        .filter(|name| name.len() == 4)
        .for_each(|name| println!("four letters: {name}"));

    // Zipping stops at the end of the shorter side.
    Flux::range(10, 20)
        .zip_with(Flux::just(["one", "two", "three", "four"]), |n, word| {
            format!("{n} {word}")
        })
        .for_each(|pair| println!("{pair}"));

    Flux::zip(Flux::range(100, 10), Flux::range(1000, 10))
        .for_each(|(left, right)| println!("({left}, {right})"));
}
