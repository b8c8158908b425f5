//! Many-to-many link reconciliation.

use super::{handle, EntityBox};
use crate::binding::ObjectBinding;
use crate::error::{EngineResultExt, StoreError, StoreResult};
use crate::model::RelationToMany;
use crate::store::StoreCore;
use crate::transaction::Transaction;
use std::collections::BTreeSet;
use std::sync::Arc;
use strongbox_engine::{ObjectId, RelationId};
use tracing::debug;

/// Makes the links of `relation` from `source_id` equal the ids of
/// `targets`, storing unsaved targets first.
///
/// Only the difference between the stored and the desired set is written.
pub(crate) fn replace_links<T: ObjectBinding>(
    core: &Arc<StoreCore>,
    txn: &Transaction,
    relation: &RelationToMany<T>,
    source_id: ObjectId,
    stored_id: ObjectId,
    targets: Option<&mut [T::Object]>,
) -> StoreResult<()> {
    let Some(targets) = targets else {
        if stored_id == 0 {
            return Ok(());
        }
        return Err(missing_targets(relation.id(), stored_id));
    };
    let engine = &core.engine;

    let mut to_remove = BTreeSet::new();
    if stored_id != 0 {
        to_remove.extend(
            engine
                .rel_get_ids(Some(txn.handle()), relation.id(), stored_id)
                .op("rel_get_ids")?,
        );
    }

    let target_box = core.box_for::<T>()?;
    let mut linked = 0usize;
    for target in targets.iter_mut() {
        let mut target_id = target_box.binding().id(target)?;
        if target_id == 0 {
            target_id = target_box.put_in_txn(txn, target)?;
        }
        if !to_remove.remove(&target_id) {
            engine
                .rel_put(Some(txn.handle()), relation.id(), source_id, target_id)
                .op("rel_put")?;
            linked += 1;
        }
    }

    for target_id in &to_remove {
        engine
            .rel_remove(Some(txn.handle()), relation.id(), source_id, *target_id)
            .op("rel_remove")?;
    }

    debug!(
        relation = relation.id(),
        source = source_id,
        linked,
        unlinked = to_remove.len(),
        "relation replaced"
    );
    Ok(())
}

/// Loads the stored targets linked from `source_id`, ascending by id.
pub(crate) fn related_objects<T: ObjectBinding>(
    core: &Arc<StoreCore>,
    txn: &Transaction,
    relation: &RelationToMany<T>,
    source_id: ObjectId,
) -> StoreResult<Vec<T::Object>> {
    let ids = core
        .engine
        .rel_get_ids(Some(txn.handle()), relation.id(), source_id)
        .op("rel_get_ids")?;
    let target_box = core.box_for::<T>()?;
    target_box.get_many_existing_in_txn(txn, &ids)
}

fn missing_targets(relation: RelationId, source: ObjectId) -> StoreError {
    StoreError::invalid_operation(format!(
        "relation {relation}: targets of stored object {source} were not loaded; \
         pass an empty list to remove all links"
    ))
}

impl<B: ObjectBinding> EntityBox<B> {
    fn check_source<T: ObjectBinding>(&self, relation: &RelationToMany<T>) -> StoreResult<()> {
        if relation.source() != self.entity_id() {
            return Err(StoreError::invalid_operation(format!(
                "relation {} starts at entity type {}, not {}",
                relation.id(),
                relation.source(),
                self.name()
            )));
        }
        Ok(())
    }

    /// Target ids linked from `source_id`, ascending.
    pub fn relation_ids<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        self.relation_ids_with(None, relation, source_id)
    }

    /// [`relation_ids`](Self::relation_ids) inside `txn`.
    pub fn relation_ids_in_txn<T: ObjectBinding>(
        &self,
        txn: &Transaction,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        self.relation_ids_with(Some(txn), relation, source_id)
    }

    fn relation_ids_with<T: ObjectBinding>(
        &self,
        txn: Option<&Transaction>,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        self.core.ensure_open()?;
        self.check_source(relation)?;
        self.core
            .engine
            .rel_get_ids(handle(txn), relation.id(), source_id)
            .op("rel_get_ids")
    }

    /// Makes the links from `source_id` match `targets` in one write
    /// transaction.
    ///
    /// `source` is the object the links belong to; its current id decides
    /// whether stored links exist. Unsaved targets are put first. Targets
    /// already linked cause no engine write.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidOperation`] for `None` targets when `source` is
    /// stored, before anything is written.
    pub fn relation_replace<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
        source: &B::Object,
        targets: Option<&mut [T::Object]>,
    ) -> StoreResult<()> {
        self.core.ensure_open()?;
        self.check_source(relation)?;
        let stored_id = self.binding.id(source)?;
        match targets {
            None if stored_id != 0 => Err(missing_targets(relation.id(), stored_id)),
            None => Ok(()),
            Some(targets) => self.core.run_in_write(|txn| {
                replace_links(&self.core, txn, relation, source_id, stored_id, Some(targets))
            }),
        }
    }

    /// [`relation_replace`](Self::relation_replace) inside `txn`.
    pub fn relation_replace_in_txn<T: ObjectBinding>(
        &self,
        txn: &Transaction,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
        source: &B::Object,
        targets: Option<&mut [T::Object]>,
    ) -> StoreResult<()> {
        self.core.ensure_open()?;
        self.check_source(relation)?;
        let stored_id = self.binding.id(source)?;
        replace_links(&self.core, txn, relation, source_id, stored_id, targets)
    }

    /// Links `source_id` to `target_id`.
    pub fn relation_put<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
        target_id: ObjectId,
    ) -> StoreResult<()> {
        self.core.ensure_open()?;
        self.check_source(relation)?;
        self.core
            .engine
            .rel_put(None, relation.id(), source_id, target_id)
            .op("rel_put")
    }

    /// Unlinks `source_id` from `target_id`.
    pub fn relation_remove<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
        target_id: ObjectId,
    ) -> StoreResult<()> {
        self.core.ensure_open()?;
        self.check_source(relation)?;
        self.core
            .engine
            .rel_remove(None, relation.id(), source_id, target_id)
            .op("rel_remove")
    }
}
