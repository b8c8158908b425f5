//! Relation synchronization through note and tag boxes.

use strongbox_core::StoreError;
use strongbox_testkit::prelude::*;

#[test]
fn put_with_unsaved_tags_stores_and_links_them() {
    let store = TestStore::memory();
    let notes = store.box_for::<NoteBinding>().unwrap();
    let tags = store.box_for::<TagBinding>().unwrap();

    let mut note = Note::new("groceries").with_tags(vec![Tag::new("home"), Tag::new("todo")]);
    let id = notes.put(&mut note).unwrap();

    assert_eq!(tags.count().unwrap(), 2);
    assert_eq!(notes.relation_ids(&NOTE_TAGS, id).unwrap(), note.tag_ids());
    assert_eq!(notes.get(id).unwrap().unwrap(), note);
}

#[test]
fn replace_is_idempotent() {
    let (store, notes_batch) = scenarios::tagged_notes(1, 4);
    let notes = store.box_for::<NoteBinding>().unwrap();
    let note = &notes_batch[0];

    let before = store.engine.relation_writes();
    let mut same = note.tags.clone().unwrap();
    notes
        .relation_replace(&NOTE_TAGS, note.id, note, Some(&mut same))
        .unwrap();
    assert_eq!(store.engine.relation_writes(), before);

    let mut reordered: Vec<Tag> = same.into_iter().rev().collect();
    notes
        .relation_replace(&NOTE_TAGS, note.id, note, Some(&mut reordered))
        .unwrap();
    assert_eq!(store.engine.relation_writes(), before);
}

#[test]
fn empty_targets_clear_and_none_is_rejected() {
    let (store, notes_batch) = scenarios::tagged_notes(1, 3);
    let notes = store.box_for::<NoteBinding>().unwrap();
    let note = &notes_batch[0];

    let err = notes
        .relation_replace(&NOTE_TAGS, note.id, note, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation { .. }));
    assert_eq!(notes.relation_ids(&NOTE_TAGS, note.id).unwrap().len(), 3);

    notes
        .relation_replace(&NOTE_TAGS, note.id, note, Some(&mut []))
        .unwrap();
    assert!(notes.relation_ids(&NOTE_TAGS, note.id).unwrap().is_empty());
    assert_eq!(store.box_for::<TagBinding>().unwrap().count().unwrap(), 3);
}

#[test]
fn none_targets_on_new_source_are_ignored() {
    let store = TestStore::memory();
    let notes = store.box_for::<NoteBinding>().unwrap();
    let unsaved = Note::new("fresh");
    notes
        .relation_replace(&NOTE_TAGS, 1, &unsaved, None)
        .unwrap();
    assert_eq!(store.engine.relation_writes(), 0);
}

#[test]
fn bulk_put_links_each_note() {
    let store = TestStore::with_config(strongbox_core::StoreConfig::new().chunk_size(2));
    let notes = store.box_for::<NoteBinding>().unwrap();

    let mut batch: Vec<Note> = (0..5)
        .map(|i| Note::new(&format!("n{i}")).with_tags(vec![Tag::new(&format!("t{i}"))]))
        .collect();
    let ids = notes.put_many(&mut batch).unwrap();

    for (note, id) in batch.iter().zip(&ids) {
        assert_eq!(notes.relation_ids(&NOTE_TAGS, *id).unwrap(), note.tag_ids());
    }
    let loaded = notes.get_many_existing(&ids).unwrap();
    assert_eq!(loaded, batch);
}

#[test]
fn aborted_put_rolls_back_tags_and_links() {
    let (store, notes_batch) = scenarios::tagged_notes(1, 2);
    let notes = store.box_for::<NoteBinding>().unwrap();
    let tags = store.box_for::<TagBinding>().unwrap();
    let original = &notes_batch[0];

    let mut note = original.clone();
    note.text = "edited".into();
    note.tags = Some(vec![Tag::new("ghost")]);
    let result: strongbox_core::StoreResult<()> = store.run_in_write(|txn| {
        notes.put_in_txn(txn, &mut note)?;
        Err(StoreError::invalid_operation("abort"))
    });
    assert!(result.is_err());

    assert_eq!(tags.count().unwrap(), 2);
    let stored = notes.get(original.id).unwrap().unwrap();
    assert_eq!(stored, *original);

    let result = store.run_in_read(|txn| notes.put_in_txn(txn, &mut note));
    assert_eq!(result.unwrap_err().status(), Some(strongbox_core::Status::ReadOnlyTxn));
}

#[test]
fn single_link_calls() {
    let store = TestStore::memory();
    let notes = store.box_for::<NoteBinding>().unwrap();
    let tags = store.box_for::<TagBinding>().unwrap();

    let note_id = notes.put(&mut Note::new("n")).unwrap();
    let tag_id = tags.put(&mut Tag::new("t")).unwrap();

    notes.relation_put(&NOTE_TAGS, note_id, tag_id).unwrap();
    assert_eq!(notes.get(note_id).unwrap().unwrap().tag_ids(), vec![tag_id]);
    notes.relation_remove(&NOTE_TAGS, note_id, tag_id).unwrap();
    assert!(notes.get(note_id).unwrap().unwrap().tag_ids().is_empty());
}
