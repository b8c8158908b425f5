//! Fixture entity types and store helpers.
//!
//! Three entity types cover the box pipeline:
//! - [`Event`]: a plain entity without relations
//! - [`Note`]: an entity with a many-to-many link to [`Tag`]
//! - [`Tag`]: the relation target

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strongbox_codec::{decode_record, RecordEncoder};
use strongbox_core::{
    Model, ObjectBinding, RelatedContext, RelationToMany, Store, StoreConfig, StoreResult,
};
use strongbox_engine::{Capabilities, EntityTypeId, MemoryEngine, ObjectId};

/// Entity type id of [`Event`].
pub const EVENT_ENTITY: EntityTypeId = 10;
/// Entity type id of [`Note`].
pub const NOTE_ENTITY: EntityTypeId = 11;
/// Entity type id of [`Tag`].
pub const TAG_ENTITY: EntityTypeId = 12;

/// Links a note to its tags.
pub const NOTE_TAGS: RelationToMany<TagBinding> = RelationToMany::new(20, NOTE_ENTITY, TAG_ENTITY);

/// A timestamped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Object id; 0 until stored.
    #[serde(skip)]
    pub id: ObjectId,
    /// Event source.
    pub source: String,
    /// Sequence number within the source.
    pub seq: u64,
    /// Raw payload.
    pub payload: Vec<u8>,
}

impl Event {
    /// Creates an unsaved event with an empty payload.
    pub fn new(source: &str, seq: u64) -> Self {
        Self {
            id: 0,
            source: source.to_string(),
            seq,
            payload: Vec::new(),
        }
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

/// Binding of [`Event`].
#[derive(Debug, Default)]
pub struct EventBinding;

impl ObjectBinding for EventBinding {
    type Object = Event;

    fn entity_id(&self) -> EntityTypeId {
        EVENT_ENTITY
    }

    fn entity_name(&self) -> &str {
        "Event"
    }

    fn id(&self, event: &Event) -> StoreResult<ObjectId> {
        Ok(event.id)
    }

    fn set_id(&self, event: &mut Event, id: ObjectId) -> StoreResult<()> {
        event.id = id;
        Ok(())
    }

    fn encode(&self, event: &Event, id: ObjectId, encoder: &mut RecordEncoder) -> StoreResult<()> {
        encoder.encode(id, event)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Event> {
        let (id, mut event): (ObjectId, Event) = decode_record(bytes)?;
        event.id = id;
        Ok(event)
    }
}

/// A note with tags.
///
/// `tags` is `None` until loaded or assigned. Putting a note with `None`
/// tags leaves its stored links untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Object id; 0 until stored.
    #[serde(skip)]
    pub id: ObjectId,
    /// Note text.
    pub text: String,
    /// Linked tags.
    #[serde(skip)]
    pub tags: Option<Vec<Tag>>,
}

impl Note {
    /// Creates an unsaved note without loaded tags.
    pub fn new(text: &str) -> Self {
        Self {
            id: 0,
            text: text.to_string(),
            tags: None,
        }
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Ids of the loaded tags.
    pub fn tag_ids(&self) -> Vec<ObjectId> {
        self.tags
            .iter()
            .flatten()
            .map(|tag| tag.id)
            .collect()
    }
}

/// Binding of [`Note`].
#[derive(Debug, Default)]
pub struct NoteBinding;

impl ObjectBinding for NoteBinding {
    type Object = Note;

    fn entity_id(&self) -> EntityTypeId {
        NOTE_ENTITY
    }

    fn entity_name(&self) -> &str {
        "Note"
    }

    fn has_relations(&self) -> bool {
        true
    }

    fn id(&self, note: &Note) -> StoreResult<ObjectId> {
        Ok(note.id)
    }

    fn set_id(&self, note: &mut Note, id: ObjectId) -> StoreResult<()> {
        note.id = id;
        Ok(())
    }

    fn encode(&self, note: &Note, id: ObjectId, encoder: &mut RecordEncoder) -> StoreResult<()> {
        encoder.encode(id, note)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Note> {
        let (id, mut note): (ObjectId, Note) = decode_record(bytes)?;
        note.id = id;
        Ok(note)
    }

    fn put_related(
        &self,
        ctx: &RelatedContext<'_>,
        note: &mut Note,
        id: ObjectId,
    ) -> StoreResult<()> {
        match note.tags.as_deref_mut() {
            Some(tags) => ctx.replace_relation(&NOTE_TAGS, id, note.id, Some(tags)),
            None => Ok(()),
        }
    }

    fn load_related(&self, ctx: &RelatedContext<'_>, note: &mut Note) -> StoreResult<()> {
        note.tags = Some(ctx.related_objects(&NOTE_TAGS, note.id)?);
        Ok(())
    }
}

/// A tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Object id; 0 until stored.
    #[serde(skip)]
    pub id: ObjectId,
    /// Tag name.
    pub name: String,
}

impl Tag {
    /// Creates an unsaved tag.
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }
}

/// Binding of [`Tag`].
#[derive(Debug, Default)]
pub struct TagBinding;

impl ObjectBinding for TagBinding {
    type Object = Tag;

    fn entity_id(&self) -> EntityTypeId {
        TAG_ENTITY
    }

    fn entity_name(&self) -> &str {
        "Tag"
    }

    fn id(&self, tag: &Tag) -> StoreResult<ObjectId> {
        Ok(tag.id)
    }

    fn set_id(&self, tag: &mut Tag, id: ObjectId) -> StoreResult<()> {
        tag.id = id;
        Ok(())
    }

    fn encode(&self, tag: &Tag, id: ObjectId, encoder: &mut RecordEncoder) -> StoreResult<()> {
        encoder.encode(id, tag)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Tag> {
        let (id, mut tag): (ObjectId, Tag) = decode_record(bytes)?;
        tag.id = id;
        Ok(tag)
    }
}

/// The model of all fixture types.
pub fn fixture_model() -> Model {
    Model::builder()
        .entity(EventBinding)
        .entity(NoteBinding)
        .entity(TagBinding)
        .relation(&NOTE_TAGS)
        .build()
        .expect("fixture model is valid")
}

/// A store over a fresh memory engine, keeping the engine reachable for
/// inspection.
pub struct TestStore {
    /// The store.
    pub store: Store,
    /// The engine behind the store.
    pub engine: Arc<MemoryEngine>,
}

impl TestStore {
    /// Full-featured engine, default settings.
    pub fn memory() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Full-featured engine with `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::open(Arc::new(MemoryEngine::new()), config)
    }

    /// Engine without result arrays: visitor reads and one-by-one puts.
    pub fn visitor_only() -> Self {
        Self::open(
            Arc::new(MemoryEngine::with_capabilities(Capabilities::visitor_only())),
            StoreConfig::default(),
        )
    }

    fn open(engine: Arc<MemoryEngine>, config: StoreConfig) -> Self {
        let store = Store::open(engine.clone(), fixture_model(), config)
            .expect("Failed to open test store");
        Self { store, engine }
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A store holding `count` events from source `"sensor"` with sequence
    /// numbers `0..count`.
    pub fn populated_store(count: usize) -> (TestStore, Vec<ObjectId>) {
        let test_store = TestStore::memory();
        let events = test_store
            .box_for::<EventBinding>()
            .expect("Failed to open event box");
        let mut batch: Vec<Event> = (0..count as u64)
            .map(|seq| Event::new("sensor", seq))
            .collect();
        let ids = events.put_many(&mut batch).expect("Failed to put events");
        (test_store, ids)
    }

    /// A store with `notes` notes, each tagged with every one of `tags`
    /// shared tags.
    pub fn tagged_notes(notes: usize, tags: usize) -> (TestStore, Vec<Note>) {
        let test_store = TestStore::memory();
        let tag_box = test_store
            .box_for::<TagBinding>()
            .expect("Failed to open tag box");
        let mut shared: Vec<Tag> = (0..tags).map(|i| Tag::new(&format!("tag-{i}"))).collect();
        tag_box.put_many(&mut shared).expect("Failed to put tags");

        let note_box = test_store
            .box_for::<NoteBinding>()
            .expect("Failed to open note box");
        let mut batch: Vec<Note> = (0..notes)
            .map(|i| Note::new(&format!("note-{i}")).with_tags(shared.clone()))
            .collect();
        note_box.put_many(&mut batch).expect("Failed to put notes");
        (test_store, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let test_store = TestStore::memory();
        assert!(test_store.box_for::<EventBinding>().unwrap().is_empty().unwrap());
        assert_eq!(test_store.engine.open_transactions(), 0);
    }

    #[test]
    fn test_populated_scenario() {
        let (test_store, ids) = scenarios::populated_store(10);
        let events = test_store.box_for::<EventBinding>().unwrap();
        assert_eq!(events.count().unwrap(), 10);
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_tagged_notes_scenario() {
        let (test_store, notes) = scenarios::tagged_notes(3, 2);
        let note_box = test_store.box_for::<NoteBinding>().unwrap();
        for note in &notes {
            let loaded = note_box.get(note.id).unwrap().unwrap();
            assert_eq!(loaded.tag_ids(), note.tag_ids());
        }
        assert_eq!(test_store.box_for::<TagBinding>().unwrap().count().unwrap(), 2);
    }
}
