//! The store: engine, model and the boxes built on them.

use crate::async_queue::AsyncQueue;
use crate::binding::ObjectBinding;
use crate::config::{ReadStrategy, StoreConfig};
use crate::error::{EngineResultExt, StoreError, StoreResult};
use crate::model::Model;
use crate::object_box::EntityBox;
use crate::pool::EncoderPool;
use crate::transaction::{run_in, Transaction};
use parking_lot::RwLock;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strongbox_engine::{Capabilities, Engine, EntityTypeId, MemoryEngine, TxnMode};
use tracing::debug;

/// State shared by a store and all of its boxes.
pub(crate) struct StoreCore {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) model: Model,
    pub(crate) config: StoreConfig,
    pub(crate) capabilities: Capabilities,
    pub(crate) read_strategy: ReadStrategy,
    pub(crate) pool: EncoderPool,
    pub(crate) queue: AsyncQueue,
    boxes: RwLock<HashMap<EntityTypeId, Arc<dyn Any + Send + Sync>>>,
    closed: AtomicBool,
}

impl StoreCore {
    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn run_in_read<R>(
        &self,
        f: impl FnOnce(&Transaction) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.ensure_open()?;
        run_in(&self.engine, TxnMode::Read, f)
    }

    pub(crate) fn run_in_write<R>(
        &self,
        f: impl FnOnce(&Transaction) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.ensure_open()?;
        run_in(&self.engine, TxnMode::Write, f)
    }

    /// Returns the cached box of `B`, creating it on first use.
    pub(crate) fn box_for<B: ObjectBinding>(self: &Arc<Self>) -> StoreResult<Arc<EntityBox<B>>> {
        self.ensure_open()?;
        let descriptor = self.model.descriptor_for::<B>()?;
        let entity_id = descriptor.entity_id();

        if let Some(cached) = self.boxes.read().get(&entity_id) {
            return downcast_box(Arc::clone(cached));
        }

        let mut boxes = self.boxes.write();
        if let Some(cached) = boxes.get(&entity_id) {
            return downcast_box(Arc::clone(cached));
        }
        let binding = descriptor.binding::<B>()?;
        let entity_box = Arc::new(EntityBox::new(
            Arc::clone(self),
            Arc::clone(descriptor),
            binding,
        ));
        boxes.insert(entity_id, entity_box.clone());
        debug!(entity = descriptor.name(), entity_id, "box created");
        Ok(entity_box)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.shutdown();
        // Boxes hold the core; dropping them breaks the cycle.
        self.boxes.write().clear();
        debug!("store closed");
    }
}

fn downcast_box<B: ObjectBinding>(
    cached: Arc<dyn Any + Send + Sync>,
) -> StoreResult<Arc<EntityBox<B>>> {
    cached.downcast::<EntityBox<B>>().map_err(|_| {
        StoreError::invalid_operation(format!("cached box is not a box of {}", type_name::<B>()))
    })
}

/// An open object store.
///
/// The store owns the engine connection, the model and one box per entity
/// type. Closing or dropping it shuts down the async queue and releases the
/// boxes; boxes still held by callers then fail with
/// [`StoreError::StoreClosed`].
///
/// # Example
///
/// ```rust,ignore
/// let store = Store::open_in_memory(model)?;
/// let events = store.box_for::<EventBinding>()?;
///
/// let mut event = Event::new("sensor-1");
/// let id = events.put(&mut event)?;
/// assert_eq!(events.get(id)?, Some(event));
/// ```
pub struct Store {
    core: Arc<StoreCore>,
}

impl Store {
    /// Opens a store over `engine`, defining the model's entity types and
    /// relations in it.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, when the engine rejects the model,
    /// or when a forced read strategy is not supported by the engine.
    pub fn open(engine: Arc<dyn Engine>, model: Model, config: StoreConfig) -> StoreResult<Self> {
        if let Some(problem) = config.invalid_setting() {
            return Err(StoreError::invalid_operation(problem));
        }

        for entity in model.entities() {
            engine
                .define_entity(entity.entity_id(), entity.name())
                .op("define_entity")?;
        }
        for relation in model.relations() {
            engine
                .define_relation(relation.id, relation.source, relation.target)
                .op("define_relation")?;
        }

        let capabilities = engine.capabilities();
        let read_strategy = match config.read_strategy {
            Some(ReadStrategy::ResultArray) if !capabilities.result_arrays => {
                return Err(StoreError::invalid_operation(
                    "engine does not support result arrays",
                ));
            }
            Some(strategy) => strategy,
            None => ReadStrategy::detect(capabilities),
        };

        let queue = AsyncQueue::start(Arc::clone(&engine), config.async_queue_capacity)?;
        let pool = EncoderPool::new(config.encoder_retain_limit, config.max_pooled_encoders);

        debug!(
            entities = model.entities().count(),
            relations = model.relations().count(),
            ?read_strategy,
            "store opened"
        );

        Ok(Self {
            core: Arc::new(StoreCore {
                engine,
                model,
                config,
                capabilities,
                read_strategy,
                pool,
                queue,
                boxes: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Opens a store over a fresh [`MemoryEngine`] with default settings.
    pub fn open_in_memory(model: Model) -> StoreResult<Self> {
        Self::open(Arc::new(MemoryEngine::new()), model, StoreConfig::default())
    }

    /// Returns the box of the entity type bound by `B`.
    ///
    /// Boxes are created on first use and cached: every call for the same
    /// binding returns the same box.
    pub fn box_for<B: ObjectBinding>(&self) -> StoreResult<Arc<EntityBox<B>>> {
        self.core.box_for::<B>()
    }

    /// Runs `f` in a read transaction.
    pub fn run_in_read<R>(&self, f: impl FnOnce(&Transaction) -> StoreResult<R>) -> StoreResult<R> {
        self.core.run_in_read(f)
    }

    /// Runs `f` in a write transaction, committing if it returns `Ok`.
    ///
    /// An error from `f` rolls everything back and is returned unchanged.
    pub fn run_in_write<R>(
        &self,
        f: impl FnOnce(&Transaction) -> StoreResult<R>,
    ) -> StoreResult<R> {
        self.core.run_in_write(f)
    }

    /// Begins a read transaction.
    pub fn begin_read(&self) -> StoreResult<Transaction> {
        self.core.ensure_open()?;
        Transaction::begin(Arc::clone(&self.core.engine), TxnMode::Read)
    }

    /// Begins a write transaction.
    pub fn begin_write(&self) -> StoreResult<Transaction> {
        self.core.ensure_open()?;
        Transaction::begin(Arc::clone(&self.core.engine), TxnMode::Write)
    }

    /// Bulk read strategy chosen at open.
    pub fn read_strategy(&self) -> ReadStrategy {
        self.core.read_strategy
    }

    /// Blocks until all queued async writes are applied.
    pub fn await_async_completion(&self) {
        self.core.queue.await_completion();
    }

    /// The queue behind every [`AsyncBox`](crate::AsyncBox) of this store.
    pub fn async_queue(&self) -> &AsyncQueue {
        &self.core.queue
    }

    /// Returns the failures of async writes since the last call.
    pub fn take_async_failures(&self) -> Vec<StoreError> {
        self.core.queue.take_failures()
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.core.config
    }

    /// The model the store was opened with.
    pub fn model(&self) -> &Model {
        &self.core.model
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.core.engine
    }

    /// Number of idle encoders in the store's pool.
    pub fn pooled_encoders(&self) -> usize {
        self.core.pool.idle()
    }

    /// Drains the async queue and closes the store.
    pub fn close(&self) {
        self.core.close();
    }

    /// Returns true once the store is closed.
    pub fn is_closed(&self) -> bool {
        self.core.ensure_open().is_err()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.core.close();
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("model", &self.core.model)
            .field("read_strategy", &self.core.read_strategy)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
