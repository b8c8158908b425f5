//! Stress tests for Strongbox.
//!
//! These helpers drive a store under heavy load and concurrent access and
//! report throughput.

use crate::fixtures::{Event, EventBinding, Note, NoteBinding, Tag, NOTE_TAGS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strongbox_core::Store;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per run (or per thread for concurrent runs).
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Payload size of generated events in bytes.
    pub payload_size: usize,
    /// Objects per bulk put.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            payload_size: 256,
            batch_size: 500,
        }
    }
}

fn event(seq: usize, config: &StressConfig) -> Event {
    Event::new("stress", seq as u64).with_payload(vec![0xAB; config.payload_size])
}

/// Puts `operations` events one by one.
pub fn stress_sequential_puts(store: &Store, config: &StressConfig) -> StressTestResult {
    let events = store.box_for::<EventBinding>().expect("Failed to open box");
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for seq in 0..config.operations {
        match events.put(&mut event(seq, config)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Puts `operations` events in bulk batches of `batch_size`. Each event
/// counts as one operation.
pub fn stress_bulk_puts(store: &Store, config: &StressConfig) -> StressTestResult {
    let events = store.box_for::<EventBinding>().expect("Failed to open box");
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let mut seq = 0;
    while seq < config.operations {
        let n = config.batch_size.min(config.operations - seq);
        let mut batch: Vec<Event> = (seq..seq + n).map(|s| event(s, config)).collect();
        match events.put_many(&mut batch) {
            Ok(_) => successful += n,
            Err(_) => failed += n,
        }
        seq += n;
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Runs `threads` writer threads and as many reader threads against one
/// store. Writers bulk-put events; readers read everything and check that
/// every snapshot is complete batches only.
pub fn stress_concurrent_readers_writers(
    store: &Arc<Store>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let batches_per_writer = (config.operations / config.batch_size.max(1)).max(1);
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..config.threads {
        let writer = {
            let store = Arc::clone(store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();
            thread::spawn(move || {
                let events = store.box_for::<EventBinding>().expect("Failed to open box");
                for _ in 0..batches_per_writer {
                    let mut batch: Vec<Event> = (0..config.batch_size)
                        .map(|s| event(s, &config))
                        .collect();
                    match events.put_many(&mut batch) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        };
        handles.push(writer);

        let reader = {
            let store = Arc::clone(store);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let batch_size = config.batch_size.max(1);
            thread::spawn(move || {
                let events = store.box_for::<EventBinding>().expect("Failed to open box");
                for _ in 0..batches_per_writer {
                    match events.get_all() {
                        Ok(all) if all.len() % batch_size == 0 => {
                            successful.fetch_add(1, Ordering::Relaxed)
                        }
                        _ => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        };
        handles.push(reader);
    }

    for handle in handles {
        handle.join().expect("Stress thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Queues `operations` async puts and waits for the queue to drain.
pub fn stress_async_puts(store: &Store, config: &StressConfig) -> StressTestResult {
    let events = store.box_for::<EventBinding>().expect("Failed to open box");
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for seq in 0..config.operations {
        match events.async_box().put(&mut event(seq, config)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    store.await_async_completion();
    failed += store.take_async_failures().len();
    successful = successful.saturating_sub(failed);

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Repeatedly replaces the tags of one note, alternating between two
/// overlapping tag sets.
pub fn stress_relation_churn(store: &Store, config: &StressConfig) -> StressTestResult {
    let notes = store.box_for::<NoteBinding>().expect("Failed to open box");
    let mut tags: Vec<Tag> = (0..8).map(|i| Tag::new(&format!("t{i}"))).collect();
    let mut note = Note::new("churn").with_tags(tags.clone());
    notes.put(&mut note).expect("Failed to put note");
    tags = note.tags.clone().unwrap_or_default();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    for round in 0..config.operations {
        let mut desired = if round % 2 == 0 {
            tags[..6].to_vec()
        } else {
            tags[2..].to_vec()
        };
        match notes.relation_replace(&NOTE_TAGS, note.id, &note, Some(&mut desired)) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    fn small() -> StressConfig {
        StressConfig {
            operations: 200,
            threads: 2,
            payload_size: 32,
            batch_size: 20,
        }
    }

    #[test]
    fn test_sequential_puts() {
        let store = TestStore::memory();
        let result = stress_sequential_puts(&store, &small());
        assert_eq!(result.successful_ops, 200);
        assert_eq!(result.failed_ops, 0);
    }

    #[test]
    fn test_bulk_puts() {
        let store = TestStore::memory();
        let result = stress_bulk_puts(&store, &small());
        assert_eq!(result.successful_ops, 200);
        assert_eq!(store.box_for::<EventBinding>().unwrap().count().unwrap(), 200);
    }

    #[test]
    fn test_concurrent_readers_writers() {
        let store = Arc::new(TestStore::memory().store);
        let result = stress_concurrent_readers_writers(&store, &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(
            store.box_for::<EventBinding>().unwrap().count().unwrap(),
            2 * 10 * 20
        );
    }

    #[test]
    fn test_async_puts() {
        let store = TestStore::memory();
        let result = stress_async_puts(&store, &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(store.box_for::<EventBinding>().unwrap().count().unwrap(), 200);
    }

    #[test]
    fn test_relation_churn() {
        let store = TestStore::memory();
        let result = stress_relation_churn(&store, &small());
        assert_eq!(result.failed_ops, 0);
    }
}
