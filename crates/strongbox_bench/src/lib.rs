//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use strongbox_core::{ReadStrategy, StoreConfig};
use strongbox_testkit::{Event, Note, Tag, TestStore};

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate unsaved events with random payloads.
pub fn generate_events(count: usize, payload_size: usize) -> Vec<Event> {
    (0..count as u64)
        .map(|seq| Event::new("bench", seq).with_payload(random_data(payload_size)))
        .collect()
}

/// Generate `count` unsaved tags.
pub fn generate_tags(count: usize) -> Vec<Tag> {
    (0..count).map(|i| Tag::new(&format!("tag-{i}"))).collect()
}

/// An unsaved note carrying `tags`.
pub fn note_with(tags: Vec<Tag>) -> Note {
    Note::new("bench").with_tags(tags)
}

/// Random lookup ids in `1..=max`, with roughly one in `miss_every` above
/// `max` and therefore missing.
pub fn lookup_ids(count: usize, max: u64, miss_every: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            if miss_every > 0 && rng.gen_range(0..miss_every) == 0 {
                max + rng.gen_range(1..=max.max(1))
            } else {
                rng.gen_range(1..=max.max(1))
            }
        })
        .collect()
}

/// A store with the given bulk read strategy and chunk size.
pub fn store_with(strategy: ReadStrategy, chunk_size: usize) -> TestStore {
    TestStore::with_config(
        StoreConfig::new()
            .read_strategy(strategy)
            .chunk_size(chunk_size),
    )
}
