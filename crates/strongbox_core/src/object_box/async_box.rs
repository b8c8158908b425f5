//! Fire-and-forget writes.

use crate::allocator::IdAllocator;
use crate::async_queue::AsyncOp;
use crate::binding::{ObjectBinding, RelatedContext};
use crate::error::{StoreError, StoreResult};
use crate::model::EntityDescriptor;
use crate::store::StoreCore;
use std::fmt;
use std::sync::Arc;
use strongbox_engine::{ObjectId, PutMode};

/// Async companion of an [`EntityBox`](super::EntityBox).
///
/// Ids are resolved and written back before a call returns; the record
/// write itself is queued on the store's worker. Writes are applied in
/// submission order. Failures are logged and collected by the queue, see
/// [`Store::take_async_failures`](crate::Store::take_async_failures).
pub struct AsyncBox<B: ObjectBinding> {
    core: Arc<StoreCore>,
    descriptor: Arc<EntityDescriptor>,
    binding: Arc<B>,
}

impl<B: ObjectBinding> AsyncBox<B> {
    pub(crate) fn new(
        core: Arc<StoreCore>,
        descriptor: Arc<EntityDescriptor>,
        binding: Arc<B>,
    ) -> Self {
        Self {
            core,
            descriptor,
            binding,
        }
    }

    /// Queues an insert-or-overwrite and returns the object's id.
    pub fn put(&self, object: &mut B::Object) -> StoreResult<ObjectId> {
        self.enqueue_put(object, PutMode::Put)
    }

    /// Queues an insert and returns the object's id.
    pub fn insert(&self, object: &mut B::Object) -> StoreResult<ObjectId> {
        self.enqueue_put(object, PutMode::Insert)
    }

    /// Queues an overwrite of a stored object.
    pub fn update(&self, object: &mut B::Object) -> StoreResult<()> {
        self.enqueue_put(object, PutMode::Update).map(|_| ())
    }

    /// Queues the removal of `object`.
    pub fn remove(&self, object: &B::Object) -> StoreResult<()> {
        let id = self.binding.id(object)?;
        self.remove_id(id)
    }

    /// Queues the removal of the object with `id`.
    pub fn remove_id(&self, id: ObjectId) -> StoreResult<()> {
        self.core.ensure_open()?;
        self.core.queue.submit(AsyncOp::Remove {
            entity: self.descriptor.entity_id(),
            id,
        })
    }

    /// Blocks until every queued write of the store has been applied.
    pub fn await_completion(&self) {
        self.core.queue.await_completion();
    }

    fn enqueue_put(&self, object: &mut B::Object, mode: PutMode) -> StoreResult<ObjectId> {
        self.core.ensure_open()?;
        let current = self.binding.id(object)?;
        let id = match mode {
            PutMode::Update if current == 0 => {
                return Err(StoreError::invalid_operation(format!(
                    "cannot update an object of {} with id 0; insert it first",
                    self.descriptor.name()
                )))
            }
            PutMode::Update => current,
            _ => IdAllocator::new(self.core.engine.as_ref(), self.descriptor.entity_id())
                .allocate_one(None, current)?,
        };

        if self.descriptor.has_relations() {
            self.core.run_in_write(|txn| {
                self.binding
                    .put_related(&RelatedContext::new(&self.core, txn), object, id)
            })?;
        }

        let data = {
            let mut encoder = self.core.pool.acquire();
            self.binding.encode(object, id, &mut encoder)?;
            encoder.to_vec()
        };
        self.core.queue.submit(AsyncOp::Put {
            entity: self.descriptor.entity_id(),
            id,
            data,
            mode,
        })?;

        if id != current {
            self.binding.set_id(object, id)?;
        }
        Ok(id)
    }
}

impl<B: ObjectBinding> fmt::Debug for AsyncBox<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBox")
            .field("entity", &self.descriptor)
            .finish_non_exhaustive()
    }
}
