//! Property-based test generators using proptest.
//!
//! Generated objects are unsaved (id 0) unless stated otherwise.

use crate::fixtures::{Event, Note, Tag};
use proptest::prelude::*;
use strongbox_engine::ObjectId;

/// Strategy for event source names.
pub fn source_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for payloads, including empty ones.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for a single unsaved event.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (source_strategy(), any::<u64>(), payload_strategy())
        .prop_map(|(source, seq, payload)| Event::new(&source, seq).with_payload(payload))
}

/// Strategy for a batch of up to `max` unsaved events.
pub fn events_strategy(max: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(event_strategy(), 0..=max)
}

/// Strategy for an unsaved tag.
pub fn tag_strategy() -> impl Strategy<Value = Tag> {
    prop::string::string_regex("[a-z]{1,8}")
        .expect("Invalid regex")
        .prop_map(|name| Tag::new(&name))
}

/// Strategy for an unsaved note with up to `max_tags` unsaved tags.
pub fn note_strategy(max_tags: usize) -> impl Strategy<Value = Note> {
    (
        any::<String>(),
        prop::collection::vec(tag_strategy(), 0..=max_tags),
    )
        .prop_map(|(text, tags)| Note::new(&text).with_tags(tags))
}

/// Strategy picking a subset of `0..count` as indices, in random order.
pub fn subset_strategy(count: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..count).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(move |shuffled| (0..=count).prop_map(move |n| shuffled[..n].to_vec()))
}

/// Strategy for lookup lists mixing `known` ids with ids above
/// `max_known` that are never stored.
pub fn lookup_ids_strategy(
    known: Vec<ObjectId>,
    max_known: ObjectId,
) -> impl Strategy<Value = Vec<ObjectId>> {
    let missing = (max_known + 1)..(max_known + 1000);
    let pick = if known.is_empty() {
        missing.clone().boxed()
    } else {
        prop_oneof![prop::sample::select(known), missing.clone()].boxed()
    };
    prop::collection::vec(pick, 0..32)
}
