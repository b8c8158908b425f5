//! Error types for Strongbox core.

use strongbox_codec::CodecError;
use strongbox_engine::{take_last_error, Status};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store and box operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine reported a failure.
    #[error("{operation} failed with {status} (code {}): {message}", .status.code())]
    Engine {
        /// Engine call that failed.
        operation: &'static str,
        /// Native status code.
        status: Status,
        /// Detail recorded by the engine.
        message: String,
    },

    /// Record encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Operation not permitted for the given arguments.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A box was requested for a binding the model does not know.
    #[error("entity binding {name} is not registered in the model")]
    EntityNotRegistered {
        /// Type name of the binding.
        name: String,
    },

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// The async write queue failed or is shut down.
    #[error("async queue error: {message}")]
    AsyncQueue {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an engine error, taking the detail from the thread's last
    /// error when it belongs to this status.
    pub fn engine(operation: &'static str, status: Status) -> Self {
        let message = match take_last_error() {
            Some(detail) if detail.status == status => detail.message,
            _ => status.to_string(),
        };
        Self::Engine {
            operation,
            status,
            message,
        }
    }

    /// Creates an engine error with an explicit detail message.
    pub fn engine_with_message(
        operation: &'static str,
        status: Status,
        message: impl Into<String>,
    ) -> Self {
        Self::Engine {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an entity-not-registered error.
    pub fn entity_not_registered(name: impl Into<String>) -> Self {
        Self::EntityNotRegistered { name: name.into() }
    }

    /// Creates an async queue error.
    pub fn async_queue(message: impl Into<String>) -> Self {
        Self::AsyncQueue {
            message: message.into(),
        }
    }

    /// Returns the engine status if this is an engine error.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Converts engine results into store results.
pub(crate) trait EngineResultExt<T> {
    /// Wraps a failing status with the name of the engine call.
    fn op(self, operation: &'static str) -> StoreResult<T>;
}

impl<T> EngineResultExt<T> for Result<T, Status> {
    fn op(self, operation: &'static str) -> StoreResult<T> {
        self.map_err(|status| StoreError::engine(operation, status))
    }
}
