//! Entity and relation metadata.

use crate::binding::ObjectBinding;
use crate::error::{StoreError, StoreResult};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use strongbox_engine::{EntityTypeId, RelationId};

/// Immutable metadata of one entity type.
pub struct EntityDescriptor {
    type_id: EntityTypeId,
    name: String,
    has_relations: bool,
    binding: Arc<dyn Any + Send + Sync>,
}

impl EntityDescriptor {
    /// Numeric entity type id.
    pub fn entity_id(&self) -> EntityTypeId {
        self.type_id
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether puts write related objects.
    pub fn has_relations(&self) -> bool {
        self.has_relations
    }

    pub(crate) fn binding<B: ObjectBinding>(&self) -> StoreResult<Arc<B>> {
        Arc::clone(&self.binding).downcast::<B>().map_err(|_| {
            StoreError::invalid_operation(format!(
                "entity type {} is not bound to {}",
                self.name,
                type_name::<B>()
            ))
        })
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("has_relations", &self.has_relations)
            .finish_non_exhaustive()
    }
}

/// A standalone many-to-many relation whose targets are bound by `T`.
pub struct RelationToMany<T: ObjectBinding> {
    id: RelationId,
    source: EntityTypeId,
    target: EntityTypeId,
    _target: PhantomData<fn() -> T>,
}

impl<T: ObjectBinding> RelationToMany<T> {
    /// Creates a relation descriptor.
    pub const fn new(id: RelationId, source: EntityTypeId, target: EntityTypeId) -> Self {
        Self {
            id,
            source,
            target,
            _target: PhantomData,
        }
    }

    /// Relation id.
    pub const fn id(&self) -> RelationId {
        self.id
    }

    /// Entity type the links start from.
    pub const fn source(&self) -> EntityTypeId {
        self.source
    }

    /// Entity type the links point to.
    pub const fn target(&self) -> EntityTypeId {
        self.target
    }
}

impl<T: ObjectBinding> Clone for RelationToMany<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ObjectBinding> Copy for RelationToMany<T> {}

impl<T: ObjectBinding> fmt::Debug for RelationToMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationToMany")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// Untyped relation metadata kept by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Relation id.
    pub id: RelationId,
    /// Source entity type.
    pub source: EntityTypeId,
    /// Target entity type.
    pub target: EntityTypeId,
}

/// The entity types and relations a store knows.
#[derive(Debug, Default)]
pub struct Model {
    entities: HashMap<EntityTypeId, Arc<EntityDescriptor>>,
    by_binding: HashMap<TypeId, EntityTypeId>,
    relations: HashMap<RelationId, RelationDescriptor>,
}

impl Model {
    /// Starts building a model.
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// Looks up an entity type by id.
    pub fn entity(&self, type_id: EntityTypeId) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(&type_id)
    }

    /// Iterates all entity types.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    /// Looks up a relation by id.
    pub fn relation(&self, id: RelationId) -> Option<&RelationDescriptor> {
        self.relations.get(&id)
    }

    /// Iterates all relations.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values()
    }

    pub(crate) fn descriptor_for<B: ObjectBinding>(&self) -> StoreResult<&Arc<EntityDescriptor>> {
        self.by_binding
            .get(&TypeId::of::<B>())
            .and_then(|type_id| self.entities.get(type_id))
            .ok_or_else(|| StoreError::entity_not_registered(type_name::<B>()))
    }
}

struct PendingRelation {
    descriptor: RelationDescriptor,
    target_binding: TypeId,
    target_name: &'static str,
}

/// Collects bindings and relations into a [`Model`].
///
/// # Example
///
/// ```rust,ignore
/// let model = Model::builder()
///     .entity(NoteBinding)
///     .entity(TagBinding)
///     .relation(&NOTE_TAGS)
///     .build()?;
/// ```
#[derive(Default)]
pub struct ModelBuilder {
    entities: Vec<(TypeId, EntityDescriptor)>,
    relations: Vec<PendingRelation>,
}

impl ModelBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type through its binding.
    #[must_use]
    pub fn entity<B: ObjectBinding>(mut self, binding: B) -> Self {
        let descriptor = EntityDescriptor {
            type_id: binding.entity_id(),
            name: binding.entity_name().to_string(),
            has_relations: binding.has_relations(),
            binding: Arc::new(binding),
        };
        self.entities.push((TypeId::of::<B>(), descriptor));
        self
    }

    /// Registers a relation.
    #[must_use]
    pub fn relation<T: ObjectBinding>(mut self, relation: &RelationToMany<T>) -> Self {
        self.relations.push(PendingRelation {
            descriptor: RelationDescriptor {
                id: relation.id(),
                source: relation.source(),
                target: relation.target(),
            },
            target_binding: TypeId::of::<T>(),
            target_name: type_name::<T>(),
        });
        self
    }

    /// Validates and builds the model.
    ///
    /// # Errors
    ///
    /// Fails on duplicate entity or relation ids, a binding registered
    /// twice, and relations that reference unknown entity types or whose
    /// target binding does not match the target entity type.
    pub fn build(self) -> StoreResult<Model> {
        let mut model = Model::default();

        for (binding_type, descriptor) in self.entities {
            if descriptor.type_id == 0 {
                return Err(StoreError::invalid_operation(format!(
                    "entity type {} uses the reserved id 0",
                    descriptor.name
                )));
            }
            if model.entities.contains_key(&descriptor.type_id) {
                return Err(StoreError::invalid_operation(format!(
                    "entity type id {} is registered twice",
                    descriptor.type_id
                )));
            }
            if model
                .by_binding
                .insert(binding_type, descriptor.type_id)
                .is_some()
            {
                return Err(StoreError::invalid_operation(format!(
                    "binding of {} is registered twice",
                    descriptor.name
                )));
            }
            model
                .entities
                .insert(descriptor.type_id, Arc::new(descriptor));
        }

        for pending in self.relations {
            let relation = pending.descriptor;
            for endpoint in [relation.source, relation.target] {
                if !model.entities.contains_key(&endpoint) {
                    return Err(StoreError::invalid_operation(format!(
                        "relation {} references unknown entity type {endpoint}",
                        relation.id
                    )));
                }
            }
            if model.by_binding.get(&pending.target_binding) != Some(&relation.target) {
                return Err(StoreError::invalid_operation(format!(
                    "relation {} targets entity type {} but is typed by {}",
                    relation.id, relation.target, pending.target_name
                )));
            }
            if model.relations.insert(relation.id, relation).is_some() {
                return Err(StoreError::invalid_operation(format!(
                    "relation id {} is registered twice",
                    relation.id
                )));
            }
        }

        Ok(model)
    }
}
