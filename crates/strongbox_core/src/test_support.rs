//! Bindings shared by the unit tests.

use crate::binding::{ObjectBinding, RelatedContext};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::model::{Model, RelationToMany};
use crate::store::Store;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use strongbox_codec::{decode_record, CodecError, RecordEncoder};
use strongbox_engine::{
    set_last_error, Capabilities, Engine, EngineResult, EntityTypeId, MemoryEngine, ObjectId,
    PutMode, RelationId, Status, TxnHandle, TxnMode, Visitor,
};

pub(crate) const ITEM_LABELS: RelationToMany<LabelBinding> = RelationToMany::new(1, 1, 2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Item {
    #[serde(skip)]
    pub id: ObjectId,
    pub name: String,
    #[serde(skip)]
    pub labels: Option<Vec<Label>>,
}

impl Item {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            labels: None,
        }
    }
}

pub(crate) struct ItemBinding;

impl ObjectBinding for ItemBinding {
    type Object = Item;

    fn entity_id(&self) -> EntityTypeId {
        1
    }

    fn entity_name(&self) -> &str {
        "Item"
    }

    fn has_relations(&self) -> bool {
        true
    }

    fn id(&self, item: &Item) -> StoreResult<ObjectId> {
        Ok(item.id)
    }

    fn set_id(&self, item: &mut Item, id: ObjectId) -> StoreResult<()> {
        item.id = id;
        Ok(())
    }

    fn encode(&self, item: &Item, id: ObjectId, encoder: &mut RecordEncoder) -> StoreResult<()> {
        encoder.encode(id, item)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Item> {
        let (id, mut item): (ObjectId, Item) = decode_record(bytes)?;
        item.id = id;
        Ok(item)
    }

    fn put_related(
        &self,
        ctx: &RelatedContext<'_>,
        item: &mut Item,
        id: ObjectId,
    ) -> StoreResult<()> {
        if let Some(labels) = item.labels.as_deref_mut() {
            ctx.replace_relation(&ITEM_LABELS, id, item.id, Some(labels))?;
        }
        Ok(())
    }

    fn load_related(&self, ctx: &RelatedContext<'_>, item: &mut Item) -> StoreResult<()> {
        item.labels = Some(ctx.related_objects(&ITEM_LABELS, item.id)?);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Label {
    #[serde(skip)]
    pub id: ObjectId,
    pub text: String,
}

impl Label {
    pub fn new(text: &str) -> Self {
        Self {
            id: 0,
            text: text.to_string(),
        }
    }
}

pub(crate) struct LabelBinding;

impl LabelBinding {
    /// Text that makes `encode` fail.
    pub const UNENCODABLE: &'static str = "<unencodable>";
    /// Text that encodes fine but makes `decode` fail.
    pub const UNDECODABLE: &'static str = "<undecodable>";
}

impl ObjectBinding for LabelBinding {
    type Object = Label;

    fn entity_id(&self) -> EntityTypeId {
        2
    }

    fn entity_name(&self) -> &str {
        "Label"
    }

    fn id(&self, label: &Label) -> StoreResult<ObjectId> {
        Ok(label.id)
    }

    fn set_id(&self, label: &mut Label, id: ObjectId) -> StoreResult<()> {
        label.id = id;
        Ok(())
    }

    fn encode(&self, label: &Label, id: ObjectId, encoder: &mut RecordEncoder) -> StoreResult<()> {
        if label.text == Self::UNENCODABLE {
            return Err(CodecError::encoding_failed("label text rejected").into());
        }
        encoder.encode(id, label)?;
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Label> {
        let (id, mut label): (ObjectId, Label) = decode_record(bytes)?;
        if label.text == Self::UNDECODABLE {
            return Err(CodecError::decoding_failed("label text rejected").into());
        }
        label.id = id;
        Ok(label)
    }
}

pub(crate) fn item_model() -> Model {
    Model::builder()
        .entity(ItemBinding)
        .entity(LabelBinding)
        .relation(&ITEM_LABELS)
        .build()
        .unwrap()
}

pub(crate) fn item_store(config: StoreConfig) -> Store {
    Store::open(Arc::new(MemoryEngine::new()), item_model(), config).unwrap()
}

/// A [`MemoryEngine`] that can be told to fail selected calls.
#[derive(Default)]
pub(crate) struct FaultyEngine {
    pub inner: MemoryEngine,
    /// Number of `id_for_put` failures still to inject.
    pub failing_id_lookups: AtomicUsize,
    pub id_for_put_calls: AtomicUsize,
    /// Rejects every commit, aborting the transaction instead.
    pub fail_commits: AtomicBool,
}

impl FaultyEngine {
    pub fn failing_commits() -> Self {
        let engine = Self::default();
        engine.fail_commits.store(true, Ordering::SeqCst);
        engine
    }

    pub fn failing_id_lookups(count: usize) -> Self {
        let engine = Self::default();
        engine.failing_id_lookups.store(count, Ordering::SeqCst);
        engine
    }
}

impl Engine for FaultyEngine {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn define_entity(&self, entity: EntityTypeId, name: &str) -> EngineResult<()> {
        self.inner.define_entity(entity, name)
    }

    fn define_relation(
        &self,
        relation: RelationId,
        source: EntityTypeId,
        target: EntityTypeId,
    ) -> EngineResult<()> {
        self.inner.define_relation(relation, source, target)
    }

    fn begin(&self, mode: TxnMode) -> EngineResult<TxnHandle> {
        self.inner.begin(mode)
    }

    fn commit(&self, txn: TxnHandle) -> EngineResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            self.inner.abort(txn)?;
            set_last_error(Status::Error, "commit rejected");
            return Err(Status::Error);
        }
        self.inner.commit(txn)
    }

    fn abort(&self, txn: TxnHandle) -> EngineResult<()> {
        self.inner.abort(txn)
    }

    fn id_for_put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        candidate: ObjectId,
    ) -> ObjectId {
        self.id_for_put_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failing_id_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            set_last_error(Status::Error, "transient");
            return 0;
        }
        self.inner.id_for_put(txn, entity, candidate)
    }

    fn ids_for_put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        count: u64,
    ) -> EngineResult<ObjectId> {
        self.inner.ids_for_put(txn, entity, count)
    }

    fn put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
        data: &[u8],
        mode: PutMode,
    ) -> EngineResult<()> {
        self.inner.put(txn, entity, id, data, mode)
    }

    fn put_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        data: &[Vec<u8>],
        mode: PutMode,
    ) -> EngineResult<()> {
        self.inner.put_many(txn, entity, ids, data, mode)
    }

    fn get(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<Bytes> {
        self.inner.get(txn, entity, id)
    }

    fn get_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<Vec<Option<Bytes>>> {
        self.inner.get_many(txn, entity, ids)
    }

    fn get_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<Vec<Bytes>> {
        self.inner.get_all(txn, entity)
    }

    fn visit_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()> {
        self.inner.visit_many(txn, entity, ids, visitor)
    }

    fn visit_all(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()> {
        self.inner.visit_all(txn, entity, visitor)
    }

    fn remove(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<()> {
        self.inner.remove(txn, entity, id)
    }

    fn remove_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<u64> {
        self.inner.remove_many(txn, entity, ids)
    }

    fn remove_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<u64> {
        self.inner.remove_all(txn, entity)
    }

    fn count(&self, txn: Option<TxnHandle>, entity: EntityTypeId, limit: u64) -> EngineResult<u64> {
        self.inner.count(txn, entity, limit)
    }

    fn is_empty(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<bool> {
        self.inner.is_empty(txn, entity)
    }

    fn contains(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<bool> {
        self.inner.contains(txn, entity, id)
    }

    fn contains_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<bool> {
        self.inner.contains_many(txn, entity, ids)
    }

    fn rel_put(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()> {
        self.inner.rel_put(txn, relation, source, target)
    }

    fn rel_remove(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()> {
        self.inner.rel_remove(txn, relation, source, target)
    }

    fn rel_get_ids(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
    ) -> EngineResult<Vec<ObjectId>> {
        self.inner.rel_get_ids(txn, relation, source)
    }
}
