//! Single and bulk put pipelines.

use super::{handle, EntityBox};
use crate::binding::{ObjectBinding, RelatedContext};
use crate::error::{EngineResultExt, StoreError, StoreResult};
use crate::transaction::Transaction;
use strongbox_engine::{ObjectId, PutMode};
use tracing::trace;

impl<B: ObjectBinding> EntityBox<B> {
    /// Inserts or overwrites an object and returns its id.
    ///
    /// An object with id 0 gets the next id of the sequence; any other id
    /// is reserved and used as is. The id is written back onto the object
    /// after the write succeeded. A failed put may still consume an id.
    pub fn put(&self, object: &mut B::Object) -> StoreResult<ObjectId> {
        self.put_object(None, object, PutMode::Put)
    }

    /// [`put`](Self::put) inside `txn`.
    pub fn put_in_txn(&self, txn: &Transaction, object: &mut B::Object) -> StoreResult<ObjectId> {
        self.put_object(Some(txn), object, PutMode::Put)
    }

    /// Stores a new object; fails if its id is already stored.
    pub fn insert(&self, object: &mut B::Object) -> StoreResult<ObjectId> {
        self.put_object(None, object, PutMode::Insert)
    }

    /// [`insert`](Self::insert) inside `txn`.
    pub fn insert_in_txn(
        &self,
        txn: &Transaction,
        object: &mut B::Object,
    ) -> StoreResult<ObjectId> {
        self.put_object(Some(txn), object, PutMode::Insert)
    }

    /// Overwrites a stored object.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidOperation`] for an object with id 0, checked
    /// before the engine is called; an engine error if no object with the
    /// id is stored.
    pub fn update(&self, object: &mut B::Object) -> StoreResult<()> {
        self.put_object(None, object, PutMode::Update).map(|_| ())
    }

    /// [`update`](Self::update) inside `txn`.
    pub fn update_in_txn(&self, txn: &Transaction, object: &mut B::Object) -> StoreResult<()> {
        self.put_object(Some(txn), object, PutMode::Update)
            .map(|_| ())
    }

    pub(super) fn put_object(
        &self,
        txn: Option<&Transaction>,
        object: &mut B::Object,
        mode: PutMode,
    ) -> StoreResult<ObjectId> {
        self.core.ensure_open()?;
        let current = self.binding.id(object)?;
        if mode == PutMode::Update && current == 0 {
            return Err(StoreError::invalid_operation(format!(
                "cannot update an object of {} with id 0; insert it first",
                self.name()
            )));
        }

        let id = match txn {
            None if self.descriptor.has_relations() => self
                .core
                .run_in_write(|txn| self.write_object(Some(txn), object, current, mode))?,
            _ => self.write_object(txn, object, current, mode)?,
        };
        if id != current {
            self.binding.set_id(object, id)?;
        }
        Ok(id)
    }

    /// Writes `object` under its resolved id without touching the object's
    /// own id field.
    fn write_object(
        &self,
        txn: Option<&Transaction>,
        object: &mut B::Object,
        current: ObjectId,
        mode: PutMode,
    ) -> StoreResult<ObjectId> {
        let id = match mode {
            PutMode::Update => current,
            _ => self.allocator().allocate_one(handle(txn), current)?,
        };

        if let Some(txn) = txn {
            if self.descriptor.has_relations() {
                self.binding
                    .put_related(&RelatedContext::new(&self.core, txn), object, id)?;
            }
        }

        let mut encoder = self.core.pool.acquire();
        self.binding.encode(object, id, &mut encoder)?;
        self.core
            .engine
            .put(handle(txn), self.entity_id(), id, encoder.as_bytes(), mode)
            .op("put")?;
        Ok(id)
    }

    /// Puts all objects in one write transaction and returns their ids in
    /// input order.
    ///
    /// Objects are written in chunks of [`StoreConfig::chunk_size`]; new
    /// objects of a chunk get one contiguous id block. If any chunk fails,
    /// nothing is stored and no id is written back.
    ///
    /// [`StoreConfig::chunk_size`]: crate::StoreConfig::chunk_size
    pub fn put_many(&self, objects: &mut [B::Object]) -> StoreResult<Vec<ObjectId>> {
        self.core.ensure_open()?;
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let (ids, fresh) = self
            .core
            .run_in_write(|txn| self.write_many(txn, objects))?;
        self.write_back(objects, &ids, &fresh)?;
        Ok(ids)
    }

    /// [`put_many`](Self::put_many) inside `txn`.
    ///
    /// Ids are written back when this call returns `Ok`, before `txn`
    /// commits.
    pub fn put_many_in_txn(
        &self,
        txn: &Transaction,
        objects: &mut [B::Object],
    ) -> StoreResult<Vec<ObjectId>> {
        self.core.ensure_open()?;
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let (ids, fresh) = self.write_many(txn, objects)?;
        self.write_back(objects, &ids, &fresh)?;
        Ok(ids)
    }

    /// Writes every object and returns the ids in input order plus the
    /// positions whose id was newly assigned. Objects keep their ids.
    fn write_many(
        &self,
        txn: &Transaction,
        objects: &mut [B::Object],
    ) -> StoreResult<(Vec<ObjectId>, Vec<usize>)> {
        let mut ids = Vec::with_capacity(objects.len());
        let mut fresh = Vec::new();

        if !self.core.capabilities.result_arrays {
            for (index, object) in objects.iter_mut().enumerate() {
                let current = self.binding.id(object)?;
                let id = self.write_object(Some(txn), object, current, PutMode::Put)?;
                if id != current {
                    fresh.push(index);
                }
                ids.push(id);
            }
            return Ok((ids, fresh));
        }

        for chunk in objects.chunks_mut(self.core.config.chunk_size) {
            self.put_chunk(txn, chunk, &mut ids, &mut fresh)?;
        }
        Ok((ids, fresh))
    }

    fn write_back(
        &self,
        objects: &mut [B::Object],
        ids: &[ObjectId],
        fresh: &[usize],
    ) -> StoreResult<()> {
        for &index in fresh {
            self.binding.set_id(&mut objects[index], ids[index])?;
        }
        Ok(())
    }

    /// Writes one chunk with a single engine call, appending its ids to
    /// `ids` and the positions of newly assigned ones to `fresh`.
    fn put_chunk(
        &self,
        txn: &Transaction,
        chunk: &mut [B::Object],
        ids: &mut Vec<ObjectId>,
        fresh: &mut Vec<usize>,
    ) -> StoreResult<()> {
        let start = ids.len();
        let mut mode = PutMode::PutIdGuaranteedToBeNew;
        let mut unassigned = Vec::new();
        for (offset, object) in chunk.iter().enumerate() {
            let id = self.binding.id(object)?;
            if id == 0 {
                unassigned.push(offset);
            } else {
                mode = PutMode::Put;
            }
            ids.push(id);
        }

        let first = self
            .allocator()
            .allocate_block(Some(txn.handle()), unassigned.len() as u64)?;
        for (n, offset) in unassigned.iter().enumerate() {
            ids[start + offset] = first + n as u64;
            fresh.push(start + offset);
        }

        let chunk_ids = &ids[start..];
        let ctx = RelatedContext::new(&self.core, txn);
        let mut data = Vec::with_capacity(chunk.len());
        for (object, id) in chunk.iter_mut().zip(chunk_ids) {
            if self.descriptor.has_relations() {
                self.binding.put_related(&ctx, object, *id)?;
            }
            let mut encoder = self.core.pool.acquire();
            self.binding.encode(object, *id, &mut encoder)?;
            data.push(encoder.to_vec());
        }

        self.core
            .engine
            .put_many(Some(txn.handle()), self.entity_id(), chunk_ids, &data, mode)
            .op("put_many")?;
        trace!(
            entity = self.name(),
            objects = chunk.len(),
            new = unassigned.len(),
            ?mode,
            "chunk written"
        );
        Ok(())
    }
}
