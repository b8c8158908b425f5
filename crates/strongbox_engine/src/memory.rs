//! In-memory transactional engine.

use crate::engine::{Engine, Visitor};
use crate::status::{set_last_error, EngineResult, Status};
use crate::types::{
    Capabilities, EntityTypeId, ObjectId, PutMode, RelationId, TxnHandle, TxnMode,
    MAX_IDS_PER_BLOCK,
};
use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

type Records = BTreeMap<ObjectId, Bytes>;
type Links = BTreeMap<ObjectId, BTreeSet<ObjectId>>;

/// A consistent view of all collections and relation links.
///
/// Collections are shared between snapshots and copied on first write.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    records: HashMap<EntityTypeId, Arc<Records>>,
    links: HashMap<RelationId, Arc<Links>>,
}

impl Snapshot {
    fn records(&self, entity: EntityTypeId) -> Option<&Records> {
        self.records.get(&entity).map(Arc::as_ref)
    }

    fn records_mut(&mut self, entity: EntityTypeId) -> &mut Records {
        Arc::make_mut(self.records.entry(entity).or_default())
    }

    fn record(&self, entity: EntityTypeId, id: ObjectId) -> Option<&Bytes> {
        self.records(entity).and_then(|r| r.get(&id))
    }

    fn contains(&self, entity: EntityTypeId, id: ObjectId) -> bool {
        self.record(entity, id).is_some()
    }

    fn len(&self, entity: EntityTypeId) -> usize {
        self.records(entity).map_or(0, BTreeMap::len)
    }

    fn links(&self, relation: RelationId) -> Option<&Links> {
        self.links.get(&relation).map(Arc::as_ref)
    }

    fn links_mut(&mut self, relation: RelationId) -> &mut Links {
        Arc::make_mut(self.links.entry(relation).or_default())
    }

    fn unlink(&mut self, relation: RelationId, source: ObjectId, target: ObjectId) -> bool {
        let linked = self
            .links(relation)
            .and_then(|l| l.get(&source))
            .is_some_and(|t| t.contains(&target));
        if !linked {
            return false;
        }
        let links = self.links_mut(relation);
        if let Some(targets) = links.get_mut(&source) {
            targets.remove(&target);
            if targets.is_empty() {
                links.remove(&source);
            }
        }
        true
    }

    /// Drops every link in which a removed object takes part.
    fn unlink_object(&mut self, touching: &RelationsTouching, id: ObjectId) {
        for relation in &touching.as_source {
            if self
                .links(*relation)
                .is_some_and(|l| l.contains_key(&id))
            {
                self.links_mut(*relation).remove(&id);
            }
        }
        for relation in &touching.as_target {
            let sources: Vec<ObjectId> = self
                .links(*relation)
                .map(|l| {
                    l.iter()
                        .filter(|(_, targets)| targets.contains(&id))
                        .map(|(source, _)| *source)
                        .collect()
                })
                .unwrap_or_default();
            for source in sources {
                self.unlink(*relation, source, id);
            }
        }
    }
}

/// Relations whose source or target is a given entity type.
#[derive(Debug, Default)]
struct RelationsTouching {
    as_source: Vec<RelationId>,
    as_target: Vec<RelationId>,
}

#[derive(Debug, Default)]
struct Schema {
    entities: HashMap<EntityTypeId, String>,
    relations: HashMap<RelationId, (EntityTypeId, EntityTypeId)>,
}

#[derive(Debug)]
struct OpenTxn {
    mode: TxnMode,
    state: Mutex<Snapshot>,
}

/// An in-memory engine with snapshot isolation and a single writer.
///
/// - Read transactions see the committed state as of `begin`.
/// - One write transaction at a time; its writes become visible on commit.
/// - Calls without a transaction run in an implicit transaction of their
///   own.
/// - Id sequences live outside transactions: ids handed out inside a
///   transaction that is later aborted are not handed out again.
///
/// # Thread Safety
///
/// The engine is `Send + Sync` and is meant to be shared behind an `Arc`.
/// A thread holding an open write transaction must pass its handle to
/// write calls; an implicit write on that thread fails with
/// [`Status::IllegalState`] instead of waiting on itself.
///
/// # Example
///
/// ```rust
/// use strongbox_engine::{Engine, MemoryEngine, PutMode, Status, TxnMode};
///
/// let engine = MemoryEngine::new();
/// engine.define_entity(1, "Event").unwrap();
///
/// let txn = engine.begin(TxnMode::Write).unwrap();
/// engine.put(Some(txn), 1, 7, b"x", PutMode::Insert).unwrap();
/// assert_eq!(engine.get(None, 1, 7), Err(Status::NotFound));
/// engine.commit(txn).unwrap();
/// assert!(engine.contains(None, 1, 7).unwrap());
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    capabilities: Capabilities,
    schema: RwLock<Schema>,
    committed: RwLock<Snapshot>,
    sequences: Mutex<HashMap<EntityTypeId, ObjectId>>,
    txns: Mutex<HashMap<TxnHandle, Arc<OpenTxn>>>,
    next_txn: AtomicU64,
    writer: Mutex<Option<ThreadId>>,
    writer_released: Condvar,
    relation_writes: AtomicU64,
}

impl MemoryEngine {
    /// Creates an empty engine with all capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::full())
    }

    /// Creates an empty engine that reports the given capabilities.
    ///
    /// Array calls fail with [`Status::NotSupported`] when
    /// `result_arrays` is off.
    #[must_use]
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            schema: RwLock::new(Schema::default()),
            committed: RwLock::new(Snapshot::default()),
            sequences: Mutex::new(HashMap::new()),
            txns: Mutex::new(HashMap::new()),
            next_txn: AtomicU64::new(1),
            writer: Mutex::new(None),
            writer_released: Condvar::new(),
            relation_writes: AtomicU64::new(0),
        }
    }

    /// Number of `rel_put` / `rel_remove` calls served so far.
    #[must_use]
    pub fn relation_writes(&self) -> u64 {
        self.relation_writes.load(Ordering::Relaxed)
    }

    /// Number of transactions currently open.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.txns.lock().len()
    }

    fn claim_writer(&self) -> EngineResult<()> {
        let me = thread::current().id();
        let mut writer = self.writer.lock();
        loop {
            match *writer {
                None => {
                    *writer = Some(me);
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    return Err(set_last_error(
                        Status::IllegalState,
                        "a write transaction is already open on this thread; pass its handle instead",
                    ));
                }
                Some(_) => self.writer_released.wait(&mut writer),
            }
        }
    }

    fn release_writer(&self) {
        *self.writer.lock() = None;
        self.writer_released.notify_all();
    }

    fn open_txn(&self, handle: TxnHandle) -> EngineResult<Arc<OpenTxn>> {
        self.txns.lock().get(&handle).cloned().ok_or_else(|| {
            set_last_error(
                Status::TxnClosed,
                format!("transaction {} is not open", handle.as_raw()),
            )
        })
    }

    fn ensure_writable(&self, handle: TxnHandle) -> EngineResult<Arc<OpenTxn>> {
        let open = self.open_txn(handle)?;
        if open.mode == TxnMode::Read {
            return Err(set_last_error(
                Status::ReadOnlyTxn,
                format!("transaction {} is read-only", handle.as_raw()),
            ));
        }
        Ok(open)
    }

    fn ensure_entity(&self, entity: EntityTypeId) -> EngineResult<()> {
        if self.schema.read().entities.contains_key(&entity) {
            Ok(())
        } else {
            Err(set_last_error(
                Status::UnknownEntity,
                format!("entity type {entity} is not defined"),
            ))
        }
    }

    fn ensure_arrays(&self, call: &str) -> EngineResult<()> {
        if self.capabilities.result_arrays {
            Ok(())
        } else {
            Err(set_last_error(
                Status::NotSupported,
                format!("{call} requires result array support"),
            ))
        }
    }

    fn relation_endpoints(
        &self,
        relation: RelationId,
    ) -> EngineResult<(EntityTypeId, EntityTypeId)> {
        self.schema
            .read()
            .relations
            .get(&relation)
            .copied()
            .ok_or_else(|| {
                set_last_error(
                    Status::UnknownRelation,
                    format!("relation {relation} is not defined"),
                )
            })
    }

    fn relations_touching(&self, entity: EntityTypeId) -> RelationsTouching {
        let schema = self.schema.read();
        let mut touching = RelationsTouching::default();
        for (relation, (source, target)) in &schema.relations {
            if *source == entity {
                touching.as_source.push(*relation);
            }
            if *target == entity {
                touching.as_target.push(*relation);
            }
        }
        touching
    }

    fn read<R>(
        &self,
        txn: Option<TxnHandle>,
        f: impl FnOnce(&Snapshot) -> EngineResult<R>,
    ) -> EngineResult<R> {
        match txn {
            Some(handle) => {
                let open = self.open_txn(handle)?;
                let state = open.state.lock();
                f(&state)
            }
            None => f(&self.committed.read()),
        }
    }

    /// Applies `f` to the transaction's working state.
    ///
    /// `f` must validate before mutating so that a failed call leaves the
    /// state untouched.
    fn write<R>(
        &self,
        txn: Option<TxnHandle>,
        f: impl FnOnce(&mut Snapshot) -> EngineResult<R>,
    ) -> EngineResult<R> {
        match txn {
            Some(handle) => {
                let open = self.ensure_writable(handle)?;
                let mut state = open.state.lock();
                f(&mut state)
            }
            None => {
                self.claim_writer()?;
                let result = f(&mut self.committed.write());
                self.release_writer();
                result
            }
        }
    }

    /// Moves the sequence past ids written explicitly.
    fn observe_ids(&self, entity: EntityTypeId, ids: &[ObjectId]) {
        if let Some(max) = ids.iter().copied().max() {
            let mut sequences = self.sequences.lock();
            let last = sequences.entry(entity).or_insert(0);
            if max > *last {
                *last = max;
            }
        }
    }

    fn reserve_id(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        candidate: ObjectId,
    ) -> EngineResult<ObjectId> {
        self.ensure_entity(entity)?;
        if let Some(handle) = txn {
            self.ensure_writable(handle)?;
        }

        let mut sequences = self.sequences.lock();
        let last = sequences.entry(entity).or_insert(0);
        if candidate == 0 {
            if *last == ObjectId::MAX {
                return Err(set_last_error(
                    Status::IllegalState,
                    format!("id sequence of entity type {entity} is exhausted"),
                ));
            }
            *last += 1;
            Ok(*last)
        } else {
            if candidate > *last {
                *last = candidate;
            }
            Ok(candidate)
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_put_mode(
    mode: PutMode,
    entity: EntityTypeId,
    id: ObjectId,
    exists: bool,
) -> EngineResult<()> {
    if id == 0 {
        return Err(set_last_error(
            Status::IllegalArgument,
            format!("cannot store entity type {entity} under the reserved id 0"),
        ));
    }
    match mode {
        PutMode::Insert | PutMode::PutIdGuaranteedToBeNew if exists => Err(set_last_error(
            Status::IdAlreadyExists,
            format!("object {id} of entity type {entity} already exists"),
        )),
        PutMode::Update if !exists => Err(set_last_error(
            Status::IdNotFound,
            format!("object {id} of entity type {entity} does not exist"),
        )),
        _ => Ok(()),
    }
}

impl Engine for MemoryEngine {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn define_entity(&self, entity: EntityTypeId, name: &str) -> EngineResult<()> {
        self.schema
            .write()
            .entities
            .insert(entity, name.to_string());
        Ok(())
    }

    fn define_relation(
        &self,
        relation: RelationId,
        source: EntityTypeId,
        target: EntityTypeId,
    ) -> EngineResult<()> {
        self.ensure_entity(source)?;
        self.ensure_entity(target)?;
        self.schema
            .write()
            .relations
            .insert(relation, (source, target));
        Ok(())
    }

    fn begin(&self, mode: TxnMode) -> EngineResult<TxnHandle> {
        if mode == TxnMode::Write {
            self.claim_writer()?;
        }
        let snapshot = self.committed.read().clone();
        let handle = TxnHandle::from_raw(self.next_txn.fetch_add(1, Ordering::SeqCst));
        self.txns.lock().insert(
            handle,
            Arc::new(OpenTxn {
                mode,
                state: Mutex::new(snapshot),
            }),
        );
        trace!(txn = handle.as_raw(), ?mode, "transaction started");
        Ok(handle)
    }

    fn commit(&self, txn: TxnHandle) -> EngineResult<()> {
        let open = self.txns.lock().remove(&txn).ok_or_else(|| {
            set_last_error(
                Status::TxnClosed,
                format!("transaction {} is not open", txn.as_raw()),
            )
        })?;
        if open.mode == TxnMode::Write {
            let state = std::mem::take(&mut *open.state.lock());
            *self.committed.write() = state;
            self.release_writer();
        }
        trace!(txn = txn.as_raw(), "transaction committed");
        Ok(())
    }

    fn abort(&self, txn: TxnHandle) -> EngineResult<()> {
        let open = self.txns.lock().remove(&txn).ok_or_else(|| {
            set_last_error(
                Status::TxnClosed,
                format!("transaction {} is not open", txn.as_raw()),
            )
        })?;
        if open.mode == TxnMode::Write {
            self.release_writer();
        }
        trace!(txn = txn.as_raw(), "transaction aborted");
        Ok(())
    }

    fn id_for_put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        candidate: ObjectId,
    ) -> ObjectId {
        self.reserve_id(txn, entity, candidate).unwrap_or(0)
    }

    fn ids_for_put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        count: u64,
    ) -> EngineResult<ObjectId> {
        if count == 0 || count > MAX_IDS_PER_BLOCK {
            return Err(set_last_error(
                Status::IllegalArgument,
                format!("id block size must be within 1..={MAX_IDS_PER_BLOCK}, got {count}"),
            ));
        }
        self.ensure_entity(entity)?;
        if let Some(handle) = txn {
            self.ensure_writable(handle)?;
        }

        let mut sequences = self.sequences.lock();
        let last = sequences.entry(entity).or_insert(0);
        let first = last.checked_add(1).filter(|f| f.checked_add(count - 1).is_some());
        match first {
            Some(first) => {
                *last = first + (count - 1);
                Ok(first)
            }
            None => Err(set_last_error(
                Status::IllegalState,
                format!("id sequence of entity type {entity} is exhausted"),
            )),
        }
    }

    fn put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
        data: &[u8],
        mode: PutMode,
    ) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        self.write(txn, |state| {
            check_put_mode(mode, entity, id, state.contains(entity, id))?;
            state
                .records_mut(entity)
                .insert(id, Bytes::copy_from_slice(data));
            Ok(())
        })?;
        self.observe_ids(entity, &[id]);
        Ok(())
    }

    fn put_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        data: &[Vec<u8>],
        mode: PutMode,
    ) -> EngineResult<()> {
        self.ensure_arrays("put_many")?;
        self.ensure_entity(entity)?;
        if ids.len() != data.len() {
            return Err(set_last_error(
                Status::IllegalArgument,
                format!("{} ids given for {} records", ids.len(), data.len()),
            ));
        }
        self.write(txn, |state| {
            let mut seen = HashSet::with_capacity(ids.len());
            for id in ids {
                let exists = state.contains(entity, *id) || !seen.insert(*id);
                check_put_mode(mode, entity, *id, exists)?;
            }
            let records = state.records_mut(entity);
            for (id, bytes) in ids.iter().zip(data) {
                records.insert(*id, Bytes::copy_from_slice(bytes));
            }
            Ok(())
        })?;
        self.observe_ids(entity, ids);
        Ok(())
    }

    fn get(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<Bytes> {
        self.ensure_entity(entity)?;
        self.read(txn, |state| {
            state.record(entity, id).cloned().ok_or(Status::NotFound)
        })
    }

    fn get_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<Vec<Option<Bytes>>> {
        self.ensure_arrays("get_many")?;
        self.ensure_entity(entity)?;
        self.read(txn, |state| {
            Ok(ids
                .iter()
                .map(|id| state.record(entity, *id).cloned())
                .collect())
        })
    }

    fn get_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<Vec<Bytes>> {
        self.ensure_arrays("get_all")?;
        self.ensure_entity(entity)?;
        self.read(txn, |state| {
            Ok(state
                .records(entity)
                .map(|r| r.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn visit_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        // Collected first so the visitor runs without engine locks held.
        let records: Vec<Option<Bytes>> = self.read(txn, |state| {
            Ok(ids
                .iter()
                .map(|id| state.record(entity, *id).cloned())
                .collect())
        })?;
        for record in &records {
            if !visitor(record.as_deref()) {
                break;
            }
        }
        Ok(())
    }

    fn visit_all(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        let records: Vec<Bytes> = self.read(txn, |state| {
            Ok(state
                .records(entity)
                .map(|r| r.values().cloned().collect())
                .unwrap_or_default())
        })?;
        for record in &records {
            if !visitor(Some(record)) {
                break;
            }
        }
        Ok(())
    }

    fn remove(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<()> {
        self.ensure_entity(entity)?;
        let touching = self.relations_touching(entity);
        self.write(txn, |state| {
            if !state.contains(entity, id) {
                return Err(Status::NotFound);
            }
            state.records_mut(entity).remove(&id);
            state.unlink_object(&touching, id);
            Ok(())
        })
    }

    fn remove_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<u64> {
        self.ensure_entity(entity)?;
        let touching = self.relations_touching(entity);
        self.write(txn, |state| {
            let existing: Vec<ObjectId> = ids
                .iter()
                .copied()
                .filter(|id| state.contains(entity, *id))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if existing.is_empty() {
                return Ok(0);
            }
            let records = state.records_mut(entity);
            for id in &existing {
                records.remove(id);
            }
            for id in &existing {
                state.unlink_object(&touching, *id);
            }
            Ok(existing.len() as u64)
        })
    }

    fn remove_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<u64> {
        self.ensure_entity(entity)?;
        let touching = self.relations_touching(entity);
        self.write(txn, |state| {
            let ids: Vec<ObjectId> = state
                .records(entity)
                .map(|r| r.keys().copied().collect())
                .unwrap_or_default();
            if ids.is_empty() {
                return Ok(0);
            }
            state.records_mut(entity).clear();
            for id in &ids {
                state.unlink_object(&touching, *id);
            }
            Ok(ids.len() as u64)
        })
    }

    fn count(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        limit: u64,
    ) -> EngineResult<u64> {
        self.ensure_entity(entity)?;
        self.read(txn, |state| {
            let count = state.len(entity) as u64;
            Ok(if limit > 0 { count.min(limit) } else { count })
        })
    }

    fn is_empty(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<bool> {
        self.ensure_entity(entity)?;
        self.read(txn, |state| Ok(state.len(entity) == 0))
    }

    fn contains(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
    ) -> EngineResult<bool> {
        self.ensure_entity(entity)?;
        self.read(txn, |state| Ok(state.contains(entity, id)))
    }

    fn contains_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<bool> {
        self.ensure_entity(entity)?;
        self.read(txn, |state| {
            Ok(ids.iter().all(|id| state.contains(entity, *id)))
        })
    }

    fn rel_put(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()> {
        self.relation_endpoints(relation)?;
        if source == 0 || target == 0 {
            return Err(set_last_error(
                Status::IllegalArgument,
                format!("cannot link {source} -> {target} in relation {relation}: id 0 is reserved"),
            ));
        }
        self.write(txn, |state| {
            state
                .links_mut(relation)
                .entry(source)
                .or_default()
                .insert(target);
            Ok(())
        })?;
        self.relation_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rel_remove(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()> {
        self.relation_endpoints(relation)?;
        self.write(txn, |state| {
            state.unlink(relation, source, target);
            Ok(())
        })?;
        self.relation_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rel_get_ids(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
    ) -> EngineResult<Vec<ObjectId>> {
        self.relation_endpoints(relation)?;
        self.read(txn, |state| {
            Ok(state
                .links(relation)
                .and_then(|l| l.get(&source))
                .map(|targets| targets.iter().copied().collect())
                .unwrap_or_default())
        })
    }
}
