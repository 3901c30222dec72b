//! A movie repository whose every operation is a reactive sequence, backed by an in-memory map.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use trickle::{Flux, Mono};

#[derive(Clone, Debug, Eq, PartialEq)]
struct Movie {
    title: String,
    genre: String,
}

impl Movie {
    fn new(title: &str, genre: &str) -> Self {
        Self {
            title: title.to_string(),
            genre: genre.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct MovieRepository {
    movies: Arc<Mutex<BTreeMap<u32, Movie>>>,
}

impl MovieRepository {
    fn new() -> Self {
        let movies = BTreeMap::from([
            (1, Movie::new("avengers", "action")),
            (2, Movie::new("jaws", "other")),
            (3, Movie::new("iron man", "action")),
        ]);

        Self {
            movies: Arc::new(Mutex::new(movies)),
        }
    }

    fn get_movie(&self, id: u32) -> Mono<Movie> {
        match self.movies.lock().get(&id) {
            Some(movie) => Mono::just(movie.clone()),
            None => Mono::empty(),
        }
    }

    /// A snapshot of all movies, taken when the sequence is subscribed to.
    fn all_movies(&self) -> Flux<Movie> {
        let movies = Arc::clone(&self.movies);
        Flux::defer(move || Flux::from_iterable(movies.lock().values().cloned().collect::<Vec<_>>()))
    }

    /// Stores the movie under the next free id and emits that id.
    fn save_movie(&self, movie: Mono<Movie>) -> Mono<u32> {
        let movies = Arc::clone(&self.movies);

        movie.map(move |movie| {
            let mut movies = movies.lock();
            let id = movies.keys().next_back().map_or(1, |last| last.saturating_add(1));
            println!("saved {movie:?} with id {id}");
            movies.insert(id, movie);
            id
        })
    }

    fn update_movie(&self, id: u32, movie: Mono<Movie>) -> Mono<Movie> {
        let movies = Arc::clone(&self.movies);

        movie.do_on_next(move |movie| {
            movies.lock().insert(id, movie.clone());
            println!("updated {movie:?} with id {id}");
        })
    }

    /// Emits the removed movie, or nothing if there was no movie with this id.
    fn delete_movie(&self, id: u32) -> Mono<Movie> {
        match self.movies.lock().remove(&id) {
            Some(movie) => Mono::just(movie),
            None => Mono::empty(),
        }
    }
}

fn main() {
    testing::init_tracing();

    let repository = MovieRepository::new();

    repository
        .get_movie(1)
        .for_each(|movie| println!("movie 1 is {movie:?}"));

    repository
        .get_movie(42)
        .map(|movie| movie.title)
        .default_if_empty("<no such movie>".to_string())
        .for_each(|title| println!("movie 42 is {title}"));

    repository
        .all_movies()
        .filter(|movie| movie.genre == "action")
        .map(|movie| movie.title)
        .for_each(|title| println!("action movie: {title}"));

    repository
        .save_movie(Mono::just(Movie::new("matrix", "sci-fi")))
        .for_each(|id| println!("matrix got id {id}"));

    repository
        .update_movie(2, Mono::just(Movie::new("jaws 2", "horror")))
        .log("update")
        .consume();

    repository
        .delete_movie(1)
        .for_each(|movie| println!("deleted {movie:?}"));

    match repository.all_movies().collect_list().block() {
        Ok(movies) => println!("remaining: {:?}", movies.unwrap_or_default()),
        Err(error) => println!("failed to list movies: {error}"),
    }
}
