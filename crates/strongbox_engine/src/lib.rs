//! # Strongbox Engine
//!
//! The storage-engine boundary for Strongbox.
//!
//! Strongbox treats the engine as an opaque, transactional key-value store
//! keyed by `(entity type, object id)`. Everything the object layer needs
//! from it is expressed by the [`Engine`] trait:
//!
//! - begin / commit / abort of read and write transactions
//! - identifier allocation (single id or a contiguous block)
//! - put / get / remove / count / contains on records
//! - many-to-many relation links
//!
//! Calls report a native [`Status`]. On failure the engine also records a
//! human-readable detail in a per-thread slot, retrieved with
//! [`last_error`], the same way a C engine exposes `last_error()` next to
//! its integer result codes.
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - in-memory, snapshot-isolated, single-writer engine
//!   used for tests and embedded use
//!
//! ## Example
//!
//! ```rust
//! use strongbox_engine::{Engine, MemoryEngine, PutMode};
//!
//! let engine = MemoryEngine::new();
//! engine.define_entity(1, "Event").unwrap();
//!
//! let id = engine.id_for_put(None, 1, 0);
//! engine.put(None, 1, id, b"payload", PutMode::Put).unwrap();
//! assert_eq!(&engine.get(None, 1, id).unwrap()[..], b"payload");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod memory;
mod status;
mod types;

pub use engine::{Engine, Visitor};
pub use memory::MemoryEngine;
pub use status::{
    clear_last_error, last_error, set_last_error, take_last_error, EngineResult, ErrorScope,
    LastError, Status,
};
pub use types::{
    Capabilities, EntityTypeId, ObjectId, PutMode, RelationId, TxnHandle, TxnMode,
    MAX_IDS_PER_BLOCK,
};
