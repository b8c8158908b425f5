//! Single and bulk reads.

use super::EntityBox;
use crate::binding::ObjectBinding;
use crate::config::ReadStrategy;
use crate::error::{EngineResultExt, StoreError, StoreResult};
use crate::transaction::Transaction;
use strongbox_engine::{ObjectId, Status};

/// Which records a bulk read fetches.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selection<'a> {
    Ids(&'a [ObjectId]),
    All,
}

impl<B: ObjectBinding> EntityBox<B> {
    /// Reads one object; `None` if it is not stored.
    pub fn get(&self, id: ObjectId) -> StoreResult<Option<B::Object>> {
        self.core.run_in_read(|txn| self.get_in_txn(txn, id))
    }

    /// [`get`](Self::get) inside `txn`; sees the transaction's own writes.
    pub fn get_in_txn(&self, txn: &Transaction, id: ObjectId) -> StoreResult<Option<B::Object>> {
        self.core.ensure_open()?;
        let bytes = match self
            .core
            .engine
            .get(Some(txn.handle()), self.entity_id(), id)
        {
            Ok(bytes) => bytes,
            Err(Status::NotFound) => return Ok(None),
            Err(status) => return Err(StoreError::engine("get", status)),
        };
        let mut object = self.binding.decode(&bytes)?;
        if self.descriptor.has_relations() {
            self.load_related(txn, &mut object)?;
        }
        Ok(Some(object))
    }

    /// Reads several objects in request order, with `None` at the position
    /// of each id that is not stored.
    pub fn get_many(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<B::Object>>> {
        self.core
            .run_in_read(|txn| self.read_many(txn, Selection::Ids(ids), false))
    }

    /// [`get_many`](Self::get_many) inside `txn`.
    pub fn get_many_in_txn(
        &self,
        txn: &Transaction,
        ids: &[ObjectId],
    ) -> StoreResult<Vec<Option<B::Object>>> {
        self.read_many(txn, Selection::Ids(ids), false)
    }

    /// Reads the stored objects among `ids`, in request order.
    pub fn get_many_existing(&self, ids: &[ObjectId]) -> StoreResult<Vec<B::Object>> {
        self.core
            .run_in_read(|txn| self.get_many_existing_in_txn(txn, ids))
    }

    /// [`get_many_existing`](Self::get_many_existing) inside `txn`.
    pub fn get_many_existing_in_txn(
        &self,
        txn: &Transaction,
        ids: &[ObjectId],
    ) -> StoreResult<Vec<B::Object>> {
        let objects = self.read_many(txn, Selection::Ids(ids), true)?;
        Ok(objects.into_iter().flatten().collect())
    }

    /// Reads every object of this type in engine order.
    pub fn get_all(&self) -> StoreResult<Vec<B::Object>> {
        self.core.run_in_read(|txn| self.get_all_in_txn(txn))
    }

    /// [`get_all`](Self::get_all) inside `txn`.
    pub fn get_all_in_txn(&self, txn: &Transaction) -> StoreResult<Vec<B::Object>> {
        let objects = self.read_many(txn, Selection::All, true)?;
        Ok(objects.into_iter().flatten().collect())
    }

    /// Decodes the selected records with the store's read strategy.
    ///
    /// Missing ids become `None` unless `existing_only`. A decode error
    /// ends the read and is returned instead of a partial result.
    pub(crate) fn read_many(
        &self,
        txn: &Transaction,
        selection: Selection<'_>,
        existing_only: bool,
    ) -> StoreResult<Vec<Option<B::Object>>> {
        self.core.ensure_open()?;
        if let Selection::Ids(ids) = selection {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut objects = match self.core.read_strategy {
            ReadStrategy::ResultArray => self.read_with_arrays(txn, selection, existing_only)?,
            ReadStrategy::Visitor => self.read_with_visitor(txn, selection, existing_only)?,
        };

        if self.descriptor.has_relations() {
            for object in objects.iter_mut().flatten() {
                self.load_related(txn, object)?;
            }
        }
        Ok(objects)
    }

    fn read_with_arrays(
        &self,
        txn: &Transaction,
        selection: Selection<'_>,
        existing_only: bool,
    ) -> StoreResult<Vec<Option<B::Object>>> {
        let handle = Some(txn.handle());
        let records = match selection {
            Selection::Ids(ids) => self
                .core
                .engine
                .get_many(handle, self.entity_id(), ids)
                .op("get_many")?,
            Selection::All => self
                .core
                .engine
                .get_all(handle, self.entity_id())
                .op("get_all")?
                .into_iter()
                .map(Some)
                .collect(),
        };

        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Some(bytes) => objects.push(Some(self.binding.decode(&bytes)?)),
                None if !existing_only => objects.push(None),
                None => {}
            }
        }
        Ok(objects)
    }

    fn read_with_visitor(
        &self,
        txn: &Transaction,
        selection: Selection<'_>,
        existing_only: bool,
    ) -> StoreResult<Vec<Option<B::Object>>> {
        let handle = Some(txn.handle());
        let mut objects = Vec::new();
        let mut failure = None;

        let (operation, result) = {
            let mut visit = |record: Option<&[u8]>| -> bool {
                match record {
                    Some(bytes) => match self.binding.decode(bytes) {
                        Ok(object) => {
                            objects.push(Some(object));
                            true
                        }
                        Err(e) => {
                            failure = Some(e);
                            false
                        }
                    },
                    None => {
                        if !existing_only {
                            objects.push(None);
                        }
                        true
                    }
                }
            };
            match selection {
                Selection::Ids(ids) => (
                    "visit_many",
                    self.core
                        .engine
                        .visit_many(handle, self.entity_id(), ids, &mut visit),
                ),
                Selection::All => (
                    "visit_all",
                    self.core
                        .engine
                        .visit_all(handle, self.entity_id(), &mut visit),
                ),
            }
        };

        // The callback's error is the cause of whatever the engine reports.
        if let Some(e) = failure {
            return Err(e);
        }
        result.op(operation)?;
        Ok(objects)
    }
}
