//! Native status codes and the per-thread last-error slot.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use thiserror::Error;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, Status>;

/// Status code returned by engine calls.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Status {
    /// Operation succeeded.
    #[error("success")]
    Ok = 0,
    /// Generic failure.
    #[error("engine error")]
    Error = 1,
    /// Invalid argument.
    #[error("illegal argument")]
    IllegalArgument = 2,
    /// The requested record does not exist. Not an error for lookups.
    #[error("not found")]
    NotFound = 3,
    /// Insert of an id that is already stored.
    #[error("id already exists")]
    IdAlreadyExists = 4,
    /// Update of an id that is not stored.
    #[error("id not found")]
    IdNotFound = 5,
    /// A constraint (e.g. uniqueness) was violated.
    #[error("constraint violated")]
    ConstraintViolated = 6,
    /// Call is not valid in the current state.
    #[error("illegal state")]
    IllegalState = 7,
    /// Feature not available in this engine build.
    #[error("not supported")]
    NotSupported = 8,
    /// The transaction handle is unknown or already finished.
    #[error("transaction closed")]
    TxnClosed = 9,
    /// Write attempted through a read transaction.
    #[error("read-only transaction")]
    ReadOnlyTxn = 10,
    /// Entity type was never defined.
    #[error("unknown entity type")]
    UnknownEntity = 11,
    /// Relation was never defined.
    #[error("unknown relation")]
    UnknownRelation = 12,
}

impl Status {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Returns true if the status indicates an error.
    #[must_use]
    pub fn is_err(self) -> bool {
        self != Status::Ok
    }

    /// Converts the status into a result.
    pub fn into_result(self) -> EngineResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Returns the raw code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        match code {
            0 => Status::Ok,
            2 => Status::IllegalArgument,
            3 => Status::NotFound,
            4 => Status::IdAlreadyExists,
            5 => Status::IdNotFound,
            6 => Status::ConstraintViolated,
            7 => Status::IllegalState,
            8 => Status::NotSupported,
            9 => Status::TxnClosed,
            10 => Status::ReadOnlyTxn,
            11 => Status::UnknownEntity,
            12 => Status::UnknownRelation,
            _ => Status::Error,
        }
    }
}

/// Detail recorded by the engine for the most recent failure on a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    /// Status of the failing call.
    pub status: Status,
    /// Human-readable detail.
    pub message: String,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<LastError>> = const { RefCell::new(None) };
    static PINNED: Cell<u32> = const { Cell::new(0) };
}

/// Records the failure detail for the current thread and returns `status`.
pub fn set_last_error(status: Status, message: impl Into<String>) -> Status {
    let message = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(LastError { status, message });
    });
    status
}

/// Returns a copy of the current thread's last error, if any.
#[must_use]
pub fn last_error() -> Option<LastError> {
    LAST_ERROR.with(|e| e.borrow().clone())
}

/// Removes and returns the current thread's last error.
pub fn take_last_error() -> Option<LastError> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Clears the current thread's last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Pins error reporting to the calling thread for the guard's lifetime.
///
/// Entering the scope clears the thread's last-error slot, so whatever is
/// recorded afterwards belongs to calls made inside the scope. The guard is
/// `!Send` and cannot leave the thread it was created on.
#[derive(Debug)]
pub struct ErrorScope {
    _not_send: PhantomData<*const ()>,
}

impl ErrorScope {
    /// Enters a pinned scope on the current thread.
    #[must_use]
    pub fn pin() -> Self {
        clear_last_error();
        PINNED.with(|p| p.set(p.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Returns true while at least one scope is pinned on this thread.
    #[must_use]
    pub fn is_active() -> bool {
        PINNED.with(|p| p.get() > 0)
    }

    /// Takes the error recorded inside this scope.
    pub fn take_error(&self) -> Option<LastError> {
        take_last_error()
    }
}

impl Drop for ErrorScope {
    fn drop(&mut self) {
        PINNED.with(|p| p.set(p.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        assert!(Status::Ok.is_ok());
        assert!(Status::NotFound.is_err());
        assert_eq!(Status::from(4), Status::IdAlreadyExists);
        assert_eq!(Status::from(999), Status::Error);
        assert!(Status::Ok.into_result().is_ok());
        assert_eq!(Status::IdNotFound.into_result(), Err(Status::IdNotFound));
    }

    #[test]
    fn last_error_slot() {
        clear_last_error();
        assert!(last_error().is_none());

        set_last_error(Status::IllegalArgument, "bad id");
        let err = last_error().unwrap();
        assert_eq!(err.status, Status::IllegalArgument);
        assert_eq!(err.message, "bad id");

        assert!(take_last_error().is_some());
        assert!(last_error().is_none());
    }

    #[test]
    fn last_error_is_per_thread() {
        set_last_error(Status::Error, "main thread");
        std::thread::spawn(|| assert!(last_error().is_none()))
            .join()
            .unwrap();
        assert!(last_error().is_some());
        clear_last_error();
    }

    #[test]
    fn error_scope_clears_and_tracks_pinning() {
        set_last_error(Status::Error, "stale");
        assert!(!ErrorScope::is_active());
        {
            let scope = ErrorScope::pin();
            assert!(ErrorScope::is_active());
            assert!(last_error().is_none());
            set_last_error(Status::IdNotFound, "fresh");
            assert_eq!(scope.take_error().unwrap().message, "fresh");
        }
        assert!(!ErrorScope::is_active());
    }
}
