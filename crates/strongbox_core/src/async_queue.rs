//! Background queue for async box writes.
//!
//! One queue per store, shared by the async companion of every box. Writes
//! are applied by a single worker thread in submission order; each write
//! runs in its own implicit engine transaction.

use crate::error::{EngineResultExt, StoreError, StoreResult};
use parking_lot::{Condvar, Mutex};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use strongbox_engine::{Engine, EntityTypeId, ObjectId, PutMode};
use tracing::{debug, warn};

/// A queued write.
#[derive(Debug)]
pub(crate) enum AsyncOp {
    Put {
        entity: EntityTypeId,
        id: ObjectId,
        data: Vec<u8>,
        mode: PutMode,
    },
    Remove {
        entity: EntityTypeId,
        id: ObjectId,
    },
}

impl AsyncOp {
    fn apply(self, engine: &dyn Engine) -> StoreResult<()> {
        match self {
            AsyncOp::Put {
                entity,
                id,
                data,
                mode,
            } => engine.put(None, entity, id, &data, mode).op("async put"),
            AsyncOp::Remove { entity, id } => engine.remove(None, entity, id).op("async remove"),
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: Mutex<usize>,
    drained: Condvar,
    failures: Mutex<Vec<StoreError>>,
}

impl QueueState {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// FIFO write queue with one worker thread.
pub struct AsyncQueue {
    sender: Mutex<Option<SyncSender<AsyncOp>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<QueueState>,
}

impl AsyncQueue {
    /// Starts the worker.
    pub(crate) fn start(engine: Arc<dyn Engine>, capacity: usize) -> StoreResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let state = Arc::new(QueueState::default());
        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("strongbox-async".into())
            .spawn(move || run_worker(engine.as_ref(), &receiver, &worker_state))
            .map_err(|e| StoreError::async_queue(format!("cannot start worker: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            state,
        })
    }

    /// Enqueues a write, blocking while the queue is full.
    pub(crate) fn submit(&self, op: AsyncOp) -> StoreResult<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| StoreError::async_queue("queue is shut down"))?;

        *self.state.pending.lock() += 1;
        if sender.send(op).is_err() {
            self.state.finish_one();
            return Err(StoreError::async_queue("worker has stopped"));
        }
        Ok(())
    }

    /// Blocks until every submitted write has been applied.
    pub fn await_completion(&self) {
        let mut pending = self.state.pending.lock();
        while *pending > 0 {
            self.state.drained.wait(&mut pending);
        }
    }

    /// Number of writes not applied yet.
    pub fn pending(&self) -> usize {
        *self.state.pending.lock()
    }

    /// Returns the failures of background writes since the last call.
    pub fn take_failures(&self) -> Vec<StoreError> {
        std::mem::take(&mut *self.state.failures.lock())
    }

    /// Drains the queue and stops the worker. Later submissions fail.
    pub(crate) fn shutdown(&self) {
        drop(self.sender.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("async worker panicked");
            }
        }
    }
}

impl Drop for AsyncQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AsyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncQueue")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn run_worker(engine: &dyn Engine, receiver: &Receiver<AsyncOp>, state: &QueueState) {
    debug!("async worker started");
    for op in receiver {
        if let Err(e) = op.apply(engine) {
            warn!(error = %e, "async write failed");
            state.failures.lock().push(e);
        }
        state.finish_one();
    }
    debug!("async worker stopped");
}
