//! Per-type boxes.
//!
//! An [`EntityBox`] turns typed CRUD, bulk and relation calls into engine
//! calls: it resolves ids, encodes through the store's encoder pool and
//! brackets multi-step work in one transaction.
//!
//! - [`put`](EntityBox::put) pipeline and bulk puts live in `put`
//! - bulk reads and their two engine strategies live in `read`
//! - relation link reconciliation lives in `relation`

mod async_box;
mod put;
mod read;
pub(crate) mod relation;

pub use async_box::AsyncBox;

use crate::allocator::IdAllocator;
use crate::binding::{ObjectBinding, RelatedContext};
use crate::error::{EngineResultExt, StoreError, StoreResult};
use crate::model::EntityDescriptor;
use crate::store::StoreCore;
use crate::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use strongbox_engine::{EntityTypeId, ObjectId, Status, TxnHandle};

fn handle(txn: Option<&Transaction>) -> Option<TxnHandle> {
    txn.map(Transaction::handle)
}

/// Typed access to the objects of one entity type.
///
/// Obtained from [`Store::box_for`](crate::Store::box_for). Methods without
/// a transaction argument run in their own transaction; the `_in_txn`
/// variants join a transaction the caller already holds, so several calls
/// can commit or roll back together.
pub struct EntityBox<B: ObjectBinding> {
    core: Arc<StoreCore>,
    descriptor: Arc<EntityDescriptor>,
    binding: Arc<B>,
    async_box: AsyncBox<B>,
}

impl<B: ObjectBinding> EntityBox<B> {
    pub(crate) fn new(
        core: Arc<StoreCore>,
        descriptor: Arc<EntityDescriptor>,
        binding: Arc<B>,
    ) -> Self {
        let async_box = AsyncBox::new(
            Arc::clone(&core),
            Arc::clone(&descriptor),
            Arc::clone(&binding),
        );
        Self {
            core,
            descriptor,
            binding,
            async_box,
        }
    }

    /// Entity type id.
    pub fn entity_id(&self) -> EntityTypeId {
        self.descriptor.entity_id()
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The binding of this box.
    pub fn binding(&self) -> &B {
        &self.binding
    }

    /// Fire-and-forget variants of the write operations.
    pub fn async_box(&self) -> &AsyncBox<B> {
        &self.async_box
    }

    fn allocator(&self) -> IdAllocator<'_> {
        IdAllocator::new(self.core.engine.as_ref(), self.entity_id())
    }

    fn load_related(&self, txn: &Transaction, object: &mut B::Object) -> StoreResult<()> {
        self.binding
            .load_related(&RelatedContext::new(&self.core, txn), object)
    }

    /// Removes an object by its id.
    ///
    /// # Errors
    ///
    /// An engine error with [`Status::NotFound`] if no such object is stored.
    pub fn remove(&self, object: &B::Object) -> StoreResult<()> {
        let id = self.binding.id(object)?;
        self.remove_id_with(None, id)
    }

    /// Removes the object with `id`.
    pub fn remove_id(&self, id: ObjectId) -> StoreResult<()> {
        self.remove_id_with(None, id)
    }

    /// Removes the object with `id` inside `txn`.
    pub fn remove_id_in_txn(&self, txn: &Transaction, id: ObjectId) -> StoreResult<()> {
        self.remove_id_with(Some(txn), id)
    }

    fn remove_id_with(&self, txn: Option<&Transaction>, id: ObjectId) -> StoreResult<()> {
        self.core.ensure_open()?;
        match self.core.engine.remove(handle(txn), self.entity_id(), id) {
            Ok(()) => Ok(()),
            Err(Status::NotFound) => Err(StoreError::engine_with_message(
                "remove",
                Status::NotFound,
                format!("object {id} of {} does not exist", self.name()),
            )),
            Err(status) => Err(StoreError::engine("remove", status)),
        }
    }

    /// Removes the stored objects among `ids` and returns how many there
    /// were. Missing ids are not an error.
    pub fn remove_ids(&self, ids: &[ObjectId]) -> StoreResult<u64> {
        self.remove_ids_with(None, ids)
    }

    /// [`remove_ids`](Self::remove_ids) inside `txn`.
    pub fn remove_ids_in_txn(&self, txn: &Transaction, ids: &[ObjectId]) -> StoreResult<u64> {
        self.remove_ids_with(Some(txn), ids)
    }

    fn remove_ids_with(&self, txn: Option<&Transaction>, ids: &[ObjectId]) -> StoreResult<u64> {
        self.core.ensure_open()?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.core
            .engine
            .remove_many(handle(txn), self.entity_id(), ids)
            .op("remove_many")
    }

    /// Removes the given objects by their ids and returns how many were
    /// stored.
    pub fn remove_many(&self, objects: &[B::Object]) -> StoreResult<u64> {
        let ids = objects
            .iter()
            .map(|o| self.binding.id(o))
            .collect::<StoreResult<Vec<_>>>()?;
        self.remove_ids(&ids)
    }

    /// Removes every object of this type and returns how many there were.
    pub fn remove_all(&self) -> StoreResult<u64> {
        self.core.ensure_open()?;
        self.core
            .engine
            .remove_all(None, self.entity_id())
            .op("remove_all")
    }

    /// Number of stored objects.
    pub fn count(&self) -> StoreResult<u64> {
        self.count_max(0)
    }

    /// Number of stored objects, counting at most `limit`; 0 means no
    /// limit.
    pub fn count_max(&self, limit: u64) -> StoreResult<u64> {
        self.core.ensure_open()?;
        self.core
            .engine
            .count(None, self.entity_id(), limit)
            .op("count")
    }

    /// [`count`](Self::count) inside `txn`.
    pub fn count_in_txn(&self, txn: &Transaction) -> StoreResult<u64> {
        self.core.ensure_open()?;
        self.core
            .engine
            .count(Some(txn.handle()), self.entity_id(), 0)
            .op("count")
    }

    /// Returns true if no object of this type is stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.core.ensure_open()?;
        self.core
            .engine
            .is_empty(None, self.entity_id())
            .op("is_empty")
    }

    /// Returns true if an object with `id` is stored.
    pub fn contains(&self, id: ObjectId) -> StoreResult<bool> {
        self.core.ensure_open()?;
        self.core
            .engine
            .contains(None, self.entity_id(), id)
            .op("contains")
    }

    /// Returns true if every id is stored; true for no ids.
    pub fn contains_ids(&self, ids: &[ObjectId]) -> StoreResult<bool> {
        self.core.ensure_open()?;
        self.core
            .engine
            .contains_many(None, self.entity_id(), ids)
            .op("contains_many")
    }
}

impl<B: ObjectBinding> fmt::Debug for EntityBox<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBox")
            .field("entity", &self.descriptor)
            .finish_non_exhaustive()
    }
}
