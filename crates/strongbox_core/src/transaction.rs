//! Transaction scopes over engine handles.

use crate::error::{EngineResultExt, StoreResult};
use std::fmt;
use std::sync::Arc;
use strongbox_engine::{Engine, TxnHandle, TxnMode};
use tracing::debug;

/// An open engine transaction.
///
/// A transaction is finished by [`commit`](Self::commit) or
/// [`abort`](Self::abort). Dropping an unfinished transaction aborts it, so
/// an early return or a panic never leaves it open.
///
/// Box methods ending in `_in_txn` run inside a transaction passed by the
/// caller instead of opening their own.
pub struct Transaction {
    engine: Arc<dyn Engine>,
    handle: TxnHandle,
    mode: TxnMode,
    finished: bool,
}

impl Transaction {
    pub(crate) fn begin(engine: Arc<dyn Engine>, mode: TxnMode) -> StoreResult<Self> {
        let handle = engine.begin(mode).op("begin")?;
        Ok(Self {
            engine,
            handle,
            mode,
            finished: false,
        })
    }

    /// The engine handle.
    pub fn handle(&self) -> TxnHandle {
        self.handle
    }

    /// Read or write.
    pub fn mode(&self) -> TxnMode {
        self.mode
    }

    /// Returns true for write transactions.
    pub fn is_write(&self) -> bool {
        self.mode == TxnMode::Write
    }

    /// Commits the transaction.
    pub fn commit(mut self) -> StoreResult<()> {
        self.finished = true;
        self.engine.commit(self.handle).op("commit")
    }

    /// Aborts the transaction, discarding its writes.
    pub fn abort(mut self) -> StoreResult<()> {
        self.finished = true;
        self.engine.abort(self.handle).op("abort")
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(status) = self.engine.abort(self.handle) {
                debug!(txn = ?self.handle, %status, "abort of dropped transaction failed");
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("handle", &self.handle)
            .field("mode", &self.mode)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Runs `f` in a new transaction, committing on `Ok` and aborting on `Err`.
///
/// The closure's error is returned unchanged.
pub(crate) fn run_in<R>(
    engine: &Arc<dyn Engine>,
    mode: TxnMode,
    f: impl FnOnce(&Transaction) -> StoreResult<R>,
) -> StoreResult<R> {
    let txn = Transaction::begin(Arc::clone(engine), mode)?;
    match f(&txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            drop(txn);
            Err(e)
        }
    }
}
