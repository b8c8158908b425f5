//! Cross-crate integration test helpers.
//!
//! [`IntegrationHarness`] drives an event box and mirrors every write in
//! a plain map, so tests can check the store against the expected state
//! after any sequence of operations.

use crate::fixtures::{Event, EventBinding, TestStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use strongbox_core::{EntityBox, StoreConfig};
use strongbox_engine::ObjectId;

/// A store plus the events it is expected to hold.
pub struct IntegrationHarness {
    /// The store under test.
    pub store: TestStore,
    events: Arc<EntityBox<EventBinding>>,
    expected: BTreeMap<ObjectId, Event>,
}

impl IntegrationHarness {
    /// Creates a harness over a full-featured memory engine.
    pub fn new() -> Self {
        Self::over(TestStore::memory())
    }

    /// Creates a harness with `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::over(TestStore::with_config(config))
    }

    /// Creates a harness over a visitor-only engine.
    pub fn visitor_only() -> Self {
        Self::over(TestStore::visitor_only())
    }

    fn over(store: TestStore) -> Self {
        let events = store
            .box_for::<EventBinding>()
            .expect("Failed to open event box");
        Self {
            store,
            events,
            expected: BTreeMap::new(),
        }
    }

    /// The event box.
    pub fn events(&self) -> &EntityBox<EventBinding> {
        &self.events
    }

    /// Puts an event and tracks it.
    pub fn put(&mut self, mut event: Event) -> ObjectId {
        let id = self.events.put(&mut event).expect("Failed to put event");
        self.expected.insert(id, event);
        id
    }

    /// Bulk-puts events and tracks them.
    pub fn put_many(&mut self, mut batch: Vec<Event>) -> Vec<ObjectId> {
        let ids = self
            .events
            .put_many(&mut batch)
            .expect("Failed to put events");
        for event in batch {
            self.expected.insert(event.id, event);
        }
        ids
    }

    /// Removes an event by id and updates tracking. Returns whether the
    /// harness expected it to exist.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let tracked = self.expected.remove(&id).is_some();
        let result = self.events.remove_id(id);
        assert_eq!(result.is_ok(), tracked, "remove({id}) disagrees with tracking");
        tracked
    }

    /// Ids the harness expects to be stored, ascending.
    pub fn expected_ids(&self) -> Vec<ObjectId> {
        self.expected.keys().copied().collect()
    }

    /// Checks count, `get_all` and single reads against the tracked state.
    pub fn verify(&self) {
        assert_eq!(
            self.events.count().expect("Failed to count"),
            self.expected.len() as u64,
            "count mismatch"
        );
        let all = self.events.get_all().expect("Failed to read all");
        let expected: Vec<&Event> = self.expected.values().collect();
        assert_eq!(all.iter().collect::<Vec<_>>(), expected, "get_all mismatch");

        for (id, event) in &self.expected {
            let stored = self.events.get(*id).expect("Failed to get event");
            assert_eq!(stored.as_ref(), Some(event), "event {id} mismatch");
        }
    }

    /// Checks `get_many` of `ids` against the tracked state, position by
    /// position.
    pub fn verify_lookup(&self, ids: &[ObjectId]) {
        let found = self.events.get_many(ids).expect("Failed to get many");
        assert_eq!(found.len(), ids.len());
        for (id, stored) in ids.iter().zip(&found) {
            assert_eq!(stored.as_ref(), self.expected.get(id), "lookup of {id} mismatch");
        }

        let existing = self
            .events
            .get_many_existing(ids)
            .expect("Failed to get existing");
        let expected: Vec<&Event> = ids.iter().filter_map(|id| self.expected.get(id)).collect();
        assert_eq!(existing.iter().collect::<Vec<_>>(), expected);
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_tracks_writes() {
        let mut harness = IntegrationHarness::new();
        let a = harness.put(Event::new("a", 1));
        harness.put_many(vec![Event::new("b", 2), Event::new("c", 3)]);
        harness.verify();

        assert!(harness.remove(a));
        assert!(!harness.remove(a));
        harness.verify();
        harness.verify_lookup(&[a, 2, 3, 99]);
    }

    #[test]
    fn test_visitor_harness() {
        let mut harness = IntegrationHarness::visitor_only();
        harness.put_many((0..5).map(|i| Event::new("v", i)).collect());
        harness.verify();
        harness.verify_lookup(&[5, 1, 42]);
    }
}
