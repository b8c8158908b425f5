//! Identifier allocation.

use crate::error::{EngineResultExt, StoreError, StoreResult};
use strongbox_engine::{Engine, EntityTypeId, ErrorScope, ObjectId, Status, TxnHandle};

/// Hands out object ids for one entity type.
pub(crate) struct IdAllocator<'a> {
    engine: &'a dyn Engine,
    entity: EntityTypeId,
}

impl<'a> IdAllocator<'a> {
    pub(crate) fn new(engine: &'a dyn Engine, entity: EntityTypeId) -> Self {
        Self { engine, entity }
    }

    /// Resolves the id for one put.
    ///
    /// A `candidate` of 0 takes the next id of the sequence; anything else
    /// is validated and reserved by the engine. Ids are consumed even if the
    /// enclosing transaction rolls back.
    pub(crate) fn allocate_one(
        &self,
        txn: Option<TxnHandle>,
        candidate: ObjectId,
    ) -> StoreResult<ObjectId> {
        let id = self.engine.id_for_put(txn, self.entity, candidate);
        if id != 0 {
            return Ok(id);
        }

        // Retry pinned to this thread; the detail read afterwards is ours.
        let scope = ErrorScope::pin();
        let id = self.engine.id_for_put(txn, self.entity, candidate);
        if id != 0 {
            return Ok(id);
        }
        Err(match scope.take_error() {
            Some(detail) => {
                StoreError::engine_with_message("id_for_put", detail.status, detail.message)
            }
            None => StoreError::engine_with_message(
                "id_for_put",
                Status::Error,
                format!(
                    "no id for entity type {} (candidate {candidate})",
                    self.entity
                ),
            ),
        })
    }

    /// Reserves `count` consecutive ids and returns the first; 0 for an
    /// empty block.
    pub(crate) fn allocate_block(
        &self,
        txn: Option<TxnHandle>,
        count: u64,
    ) -> StoreResult<ObjectId> {
        if count == 0 {
            return Ok(0);
        }
        self.engine
            .ids_for_put(txn, self.entity, count)
            .op("ids_for_put")
    }
}
