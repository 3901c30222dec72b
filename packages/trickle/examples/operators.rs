//! Transforming, flattening, de-duplicating and collecting sequences.

use trickle::Flux;

fn main() {
    Flux::just(["one", "two", "three"])
        .map(str::to_uppercase)
        .for_each(|word| println!("{word}"));

    Flux::from_iterable(["jon", "peter", "john"])
        .map(|name| {
            let mut chars = name.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .for_each(|name| println!("{name}"));

    Flux::just(["four", "five", "six"])
        .flat_map(|word| Flux::just([word.to_uppercase()]))
        .for_each(|word| println!("{word}"));

    // Every distinct letter used in the words, numbered in alphabetical order.
    Flux::from_iterable(["one", "two", "three"])
        .flat_map(|word| Flux::from_iterable(word.chars().collect::<Vec<_>>()))
        .distinct()
        .sort()
        .zip_with(Flux::range(1, u64::MAX), |letter, count| {
            format!("{count:2}. {letter}")
        })
        .for_each(|line| println!("{line}"));

    for number in Flux::just([1, 2, 3, 4]).into_blocking_iter() {
        match number {
            Ok(number) => println!("iterated: {number}"),
            Err(error) => println!("failed: {error}"),
        }
    }

    match Flux::just(["red", "white", "blue"]).collect_list().block() {
        Ok(Some(colors)) => println!("collected: {colors:?}"),
        Ok(None) => println!("nothing collected"),
        Err(error) => println!("failed: {error}"),
    }

    match Flux::range(10, 10).block_last() {
        Ok(last) => println!("last of range: {last:?}"),
        Err(error) => println!("failed: {error}"),
    }
}
