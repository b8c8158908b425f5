//! Engine trait definition.

use crate::status::EngineResult;
use crate::types::{Capabilities, EntityTypeId, ObjectId, PutMode, RelationId, TxnHandle, TxnMode};
use bytes::Bytes;

/// Callback handed to the visitor based reads.
///
/// Called once per visited record; `None` marks a requested id that is not
/// stored. Returning `false` stops the iteration.
pub type Visitor<'a> = dyn FnMut(Option<&[u8]>) -> bool + 'a;

/// A transactional record store.
///
/// Records are opaque bytes addressed by `(entity, id)`. Engines do not
/// interpret record contents.
///
/// # Transactions
///
/// Every data call takes an optional transaction handle. `Some(handle)`
/// runs the call inside that transaction; `None` lets the engine wrap the
/// single call in its own implicit transaction. Write calls through a read
/// transaction fail with [`crate::Status::ReadOnlyTxn`].
///
/// # Errors
///
/// Failures return a [`crate::Status`] and record a detail message with
/// [`crate::set_last_error`] on the calling thread. `NotFound` from lookups
/// is a regular outcome and does not touch the last-error slot.
///
/// # Implementors
///
/// - [`crate::MemoryEngine`]
pub trait Engine: Send + Sync {
    /// Features of this engine build.
    fn capabilities(&self) -> Capabilities;

    /// Declares an entity type. Repeating a definition is a no-op.
    fn define_entity(&self, entity: EntityTypeId, name: &str) -> EngineResult<()>;

    /// Declares a many-to-many relation between two defined entity types.
    fn define_relation(
        &self,
        relation: RelationId,
        source: EntityTypeId,
        target: EntityTypeId,
    ) -> EngineResult<()>;

    /// Begins a transaction.
    ///
    /// Write transactions are exclusive; beginning one waits until the
    /// current writer finishes.
    fn begin(&self, mode: TxnMode) -> EngineResult<TxnHandle>;

    /// Commits a transaction, making its writes visible.
    fn commit(&self, txn: TxnHandle) -> EngineResult<()>;

    /// Aborts a transaction, discarding its writes.
    fn abort(&self, txn: TxnHandle) -> EngineResult<()>;

    /// Resolves the id for a single put.
    ///
    /// A `candidate` of 0 takes the next id of the entity's sequence; any
    /// other value is validated and reserved. Returns 0 on failure.
    fn id_for_put(&self, txn: Option<TxnHandle>, entity: EntityTypeId, candidate: ObjectId)
        -> ObjectId;

    /// Reserves `count` consecutive ids and returns the first.
    fn ids_for_put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        count: u64,
    ) -> EngineResult<ObjectId>;

    /// Writes one record.
    fn put(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        id: ObjectId,
        data: &[u8],
        mode: PutMode,
    ) -> EngineResult<()>;

    /// Writes parallel arrays of ids and records. All or nothing.
    fn put_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        data: &[Vec<u8>],
        mode: PutMode,
    ) -> EngineResult<()>;

    /// Reads one record; `Err(Status::NotFound)` if absent.
    fn get(&self, txn: Option<TxnHandle>, entity: EntityTypeId, id: ObjectId)
        -> EngineResult<Bytes>;

    /// Reads several records; missing ids yield `None` at their position.
    fn get_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<Vec<Option<Bytes>>>;

    /// Reads every record of an entity type in engine order.
    fn get_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<Vec<Bytes>>;

    /// Calls `visitor` for each requested id, in request order.
    fn visit_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()>;

    /// Calls `visitor` for every stored record, in engine order.
    fn visit_all(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        visitor: &mut Visitor<'_>,
    ) -> EngineResult<()>;

    /// Removes one record; `Err(Status::NotFound)` if absent.
    fn remove(&self, txn: Option<TxnHandle>, entity: EntityTypeId, id: ObjectId)
        -> EngineResult<()>;

    /// Removes the stored subset of `ids` and returns how many existed.
    fn remove_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<u64>;

    /// Removes every record of an entity type and returns how many existed.
    fn remove_all(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<u64>;

    /// Counts records, stopping at `limit` unless it is 0.
    fn count(&self, txn: Option<TxnHandle>, entity: EntityTypeId, limit: u64)
        -> EngineResult<u64>;

    /// Returns true if no record of the type is stored.
    fn is_empty(&self, txn: Option<TxnHandle>, entity: EntityTypeId) -> EngineResult<bool>;

    /// Returns true if `id` is stored.
    fn contains(&self, txn: Option<TxnHandle>, entity: EntityTypeId, id: ObjectId)
        -> EngineResult<bool>;

    /// Returns true if every id in `ids` is stored.
    fn contains_many(
        &self,
        txn: Option<TxnHandle>,
        entity: EntityTypeId,
        ids: &[ObjectId],
    ) -> EngineResult<bool>;

    /// Links `source` to `target`. Linking twice is a no-op.
    fn rel_put(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()>;

    /// Unlinks `source` from `target`. Missing links are ignored.
    fn rel_remove(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
        target: ObjectId,
    ) -> EngineResult<()>;

    /// Returns the target ids linked from `source`, ascending.
    fn rel_get_ids(
        &self,
        txn: Option<TxnHandle>,
        relation: RelationId,
        source: ObjectId,
    ) -> EngineResult<Vec<ObjectId>>;
}
