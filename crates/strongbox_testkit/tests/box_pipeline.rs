//! Box CRUD and bulk put behavior against the memory engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strongbox_codec::{decode_record, CodecError, RecordEncoder};
use strongbox_core::{Model, ObjectBinding, Store, StoreConfig, StoreError, StoreResult};
use strongbox_engine::{EntityTypeId, MemoryEngine, ObjectId, Status};
use strongbox_testkit::prelude::*;

#[test]
fn put_get_update_remove() {
    init_test_logging();
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();

    let mut event = Event::new("boot", 1).with_payload(vec![1, 2, 3]);
    let id = events.put(&mut event).unwrap();
    assert_eq!(event.id, id);
    assert_eq!(events.get(id).unwrap(), Some(event.clone()));

    event.seq = 2;
    events.update(&mut event).unwrap();
    assert_eq!(events.get(id).unwrap().unwrap().seq, 2);

    events.remove(&event).unwrap();
    assert_eq!(events.get(id).unwrap(), None);
    let err = events.remove(&event).unwrap_err();
    assert_eq!(err.status(), Some(Status::NotFound));
}

#[test]
fn sequence_continues_after_explicit_ids() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();

    let mut fixed = Event::new("fixed", 0);
    fixed.id = 100;
    assert_eq!(events.put(&mut fixed).unwrap(), 100);

    let mut batch = vec![Event::new("a", 1), Event::new("b", 2)];
    let ids = events.put_many(&mut batch).unwrap();
    assert!(ids.iter().all(|id| *id > 100));
}

#[test]
fn bulk_put_spans_chunks_in_order() {
    let store = TestStore::with_config(StoreConfig::new().chunk_size(4));
    let events = store.box_for::<EventBinding>().unwrap();

    let mut batch: Vec<Event> = (0..10).map(|seq| Event::new("bulk", seq)).collect();
    let ids = events.put_many(&mut batch).unwrap();

    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    let stored = events.get_many(&ids).unwrap();
    for (seq, event) in stored.into_iter().enumerate() {
        assert_eq!(event.unwrap().seq, seq as u64);
    }
}

#[test]
fn chunk_with_stored_object_is_written_as_overwrite() {
    let store = TestStore::with_config(StoreConfig::new().chunk_size(3));
    let events = store.box_for::<EventBinding>().unwrap();

    let mut stored = Event::new("stored", 0);
    events.put(&mut stored).unwrap();
    stored.seq = 99;

    let mut batch = vec![Event::new("n", 1), stored.clone(), Event::new("n", 2)];
    let ids = events.put_many(&mut batch).unwrap();

    assert_eq!(ids[1], stored.id);
    assert_eq!(events.count().unwrap(), 3);
    assert_eq!(events.get(stored.id).unwrap().unwrap().seq, 99);
}

#[test]
fn bulk_put_of_one_object_uses_one_transaction() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();
    let mut batch = vec![Event::new("solo", 1)];
    assert_eq!(events.put_many(&mut batch).unwrap(), vec![1]);
    assert_eq!(store.engine.open_transactions(), 0);
}

#[test]
fn degraded_engine_puts_one_by_one() {
    let store = TestStore::visitor_only();
    let events = store.box_for::<EventBinding>().unwrap();

    let mut batch: Vec<Event> = (0..5).map(|seq| Event::new("slow", seq)).collect();
    let ids = events.put_many(&mut batch).unwrap();
    assert_eq!(ids.len(), 5);
    assert!(batch.iter().zip(&ids).all(|(e, id)| e.id == *id));
    assert_eq!(events.count().unwrap(), 5);
}

#[test]
fn insert_rejects_stored_id() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();

    let mut event = Event::new("once", 0);
    events.insert(&mut event).unwrap();
    let err = events.insert(&mut event).unwrap_err();
    assert_eq!(err.status(), Some(Status::IdAlreadyExists));
}

#[test]
fn caller_transaction_sees_its_own_writes() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();

    let id = store
        .run_in_write(|txn| {
            let id = events.put_in_txn(txn, &mut Event::new("txn", 1))?;
            assert!(events.get_in_txn(txn, id)?.is_some());
            assert_eq!(events.count_in_txn(txn)?, 1);
            Ok(id)
        })
        .unwrap();
    assert!(events.contains(id).unwrap());
}

#[test]
fn implicit_write_inside_own_transaction_is_rejected() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();

    let txn = store.begin_write().unwrap();
    let err = events.put(&mut Event::new("nested", 1)).unwrap_err();
    assert_eq!(err.status(), Some(Status::IllegalState));
    txn.abort().unwrap();
}

/// Binding whose encoder refuses events with `seq == u64::MAX`.
struct PickyBinding;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reading {
    #[serde(skip)]
    id: ObjectId,
    value: u64,
}

impl ObjectBinding for PickyBinding {
    type Object = Reading;

    fn entity_id(&self) -> EntityTypeId {
        1
    }

    fn entity_name(&self) -> &str {
        "Reading"
    }

    fn id(&self, reading: &Reading) -> StoreResult<ObjectId> {
        Ok(reading.id)
    }

    fn set_id(&self, reading: &mut Reading, id: ObjectId) -> StoreResult<()> {
        reading.id = id;
        Ok(())
    }

    fn encode(
        &self,
        reading: &Reading,
        id: ObjectId,
        encoder: &mut RecordEncoder,
    ) -> StoreResult<()> {
        if reading.value == u64::MAX {
            return Err(CodecError::encoding_failed("value out of range").into());
        }
        encoder.encode(id, reading)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Reading> {
        let (id, mut reading): (ObjectId, Reading) = decode_record(bytes)?;
        reading.id = id;
        Ok(reading)
    }
}

#[test]
fn failing_chunk_rolls_back_whole_bulk_put() {
    let model = Model::builder().entity(PickyBinding).build().unwrap();
    let store = Store::open(
        Arc::new(MemoryEngine::new()),
        model,
        StoreConfig::new().chunk_size(2),
    )
    .unwrap();
    let readings = store.box_for::<PickyBinding>().unwrap();

    let mut batch: Vec<Reading> = (0..6).map(|value| Reading { id: 0, value }).collect();
    batch[5].value = u64::MAX;

    let err = readings.put_many(&mut batch).unwrap_err();
    assert!(matches!(err, StoreError::Codec(_)));
    assert_eq!(readings.count().unwrap(), 0);
    assert!(batch.iter().all(|r| r.id == 0));

    batch[5].value = 5;
    let ids = readings.put_many(&mut batch).unwrap();
    assert_eq!(readings.count().unwrap(), 6);
    assert!(ids.iter().all(|id| *id != 0));
}

#[test]
fn closed_store_rejects_operations() {
    let store = TestStore::memory();
    let events = store.box_for::<EventBinding>().unwrap();
    store.close();

    assert!(matches!(events.count(), Err(StoreError::StoreClosed)));
    assert!(matches!(
        events.put(&mut Event::new("late", 0)),
        Err(StoreError::StoreClosed)
    ));
}
