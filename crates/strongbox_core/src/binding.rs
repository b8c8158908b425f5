//! Object bindings: how one application type maps to stored records.

use crate::error::{StoreError, StoreResult};
use crate::model::RelationToMany;
use crate::object_box::{relation, EntityBox};
use crate::store::StoreCore;
use crate::transaction::Transaction;
use std::sync::Arc;
use strongbox_codec::RecordEncoder;
use strongbox_engine::{EntityTypeId, ObjectId};

/// Encoding and identifier access for one object type.
///
/// A binding is registered once per entity type in the
/// [`ModelBuilder`](crate::ModelBuilder) and shared by the box of that type.
/// Bindings decide how fields are serialized; the usual implementation
/// writes a `serde` body through [`RecordEncoder::encode`] and reads it back
/// with [`strongbox_codec::decode_record`].
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use strongbox_codec::{decode_record, RecordEncoder};
/// use strongbox_core::{ObjectBinding, StoreResult};
/// use strongbox_engine::{EntityTypeId, ObjectId};
///
/// #[derive(Serialize, Deserialize)]
/// struct Task {
///     #[serde(skip)]
///     id: ObjectId,
///     title: String,
/// }
///
/// struct TaskBinding;
///
/// impl ObjectBinding for TaskBinding {
///     type Object = Task;
///
///     fn entity_id(&self) -> EntityTypeId {
///         1
///     }
///
///     fn entity_name(&self) -> &str {
///         "Task"
///     }
///
///     fn id(&self, task: &Task) -> StoreResult<ObjectId> {
///         Ok(task.id)
///     }
///
///     fn set_id(&self, task: &mut Task, id: ObjectId) -> StoreResult<()> {
///         task.id = id;
///         Ok(())
///     }
///
///     fn encode(
///         &self,
///         task: &Task,
///         id: ObjectId,
///         encoder: &mut RecordEncoder,
///     ) -> StoreResult<()> {
///         encoder.encode(id, task)?;
///         Ok(())
///     }
///
///     fn decode(&self, bytes: &[u8]) -> StoreResult<Task> {
///         let (id, mut task): (ObjectId, Task) = decode_record(bytes)?;
///         task.id = id;
///         Ok(task)
///     }
/// }
/// ```
pub trait ObjectBinding: Send + Sync + 'static {
    /// The application type stored by this binding.
    type Object;

    /// Numeric entity type id.
    fn entity_id(&self) -> EntityTypeId;

    /// Entity type name, used in logs and error messages.
    fn entity_name(&self) -> &str;

    /// Whether puts of this type write related objects too.
    ///
    /// When true, every put runs inside one write transaction together
    /// with [`put_related`](Self::put_related).
    fn has_relations(&self) -> bool {
        false
    }

    /// Reads the object's id; 0 means not stored yet.
    fn id(&self, object: &Self::Object) -> StoreResult<ObjectId>;

    /// Writes the id assigned by the store back onto the object.
    fn set_id(&self, object: &mut Self::Object, id: ObjectId) -> StoreResult<()>;

    /// Serializes the object under its final id.
    fn encode(
        &self,
        object: &Self::Object,
        id: ObjectId,
        encoder: &mut RecordEncoder,
    ) -> StoreResult<()>;

    /// Deserializes a stored record.
    fn decode(&self, bytes: &[u8]) -> StoreResult<Self::Object>;

    /// Writes related objects and links for `object`, which is being
    /// stored under `id`. The object's own id field is not updated yet.
    fn put_related(
        &self,
        ctx: &RelatedContext<'_>,
        object: &mut Self::Object,
        id: ObjectId,
    ) -> StoreResult<()> {
        let _ = (ctx, object, id);
        Ok(())
    }

    /// Loads related objects into a freshly decoded object.
    fn load_related(&self, ctx: &RelatedContext<'_>, object: &mut Self::Object) -> StoreResult<()> {
        let _ = (ctx, object);
        Ok(())
    }
}

/// Access to the store from inside [`ObjectBinding::put_related`] and
/// [`ObjectBinding::load_related`].
///
/// Everything done through the context runs in the transaction of the
/// operation that called the binding.
pub struct RelatedContext<'a> {
    core: &'a Arc<StoreCore>,
    txn: &'a Transaction,
}

impl<'a> RelatedContext<'a> {
    pub(crate) fn new(core: &'a Arc<StoreCore>, txn: &'a Transaction) -> Self {
        Self { core, txn }
    }

    /// The enclosing transaction.
    pub fn transaction(&self) -> &Transaction {
        self.txn
    }

    /// Returns the box of another entity type.
    pub fn box_for<T: ObjectBinding>(&self) -> StoreResult<Arc<EntityBox<T>>> {
        self.core.box_for::<T>()
    }

    /// Makes the links of `relation` from `source_id` equal `targets`,
    /// storing unsaved targets first.
    ///
    /// `stored_id` is the id currently held by the source object; 0 means
    /// the source is new and has no links yet. `None` targets are rejected
    /// for a stored source; pass an empty slice to remove all links.
    pub fn replace_relation<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
        stored_id: ObjectId,
        targets: Option<&mut [T::Object]>,
    ) -> StoreResult<()> {
        relation::replace_links(self.core, self.txn, relation, source_id, stored_id, targets)
    }

    /// Loads the target objects linked from `source_id`, ascending by id.
    pub fn related_objects<T: ObjectBinding>(
        &self,
        relation: &RelationToMany<T>,
        source_id: ObjectId,
    ) -> StoreResult<Vec<T::Object>> {
        if source_id == 0 {
            return Err(StoreError::invalid_operation(format!(
                "cannot load relation {} of an object with id 0",
                relation.id()
            )));
        }
        relation::related_objects(self.core, self.txn, relation, source_id)
    }
}
