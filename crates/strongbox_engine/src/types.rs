//! Identifier and mode types shared across the engine boundary.

use std::fmt;

/// Identifier of a stored object.
///
/// `0` is reserved and means "not assigned yet".
pub type ObjectId = u64;

/// Numeric identifier of an entity type (one collection per type).
pub type EntityTypeId = u32;

/// Numeric identifier of a standalone many-to-many relation.
pub type RelationId = u32;

/// Largest block of ids a single `ids_for_put` call hands out.
pub const MAX_IDS_PER_BLOCK: u64 = 10_000;

/// Opaque handle of an engine transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnHandle(u64);

impl TxnHandle {
    /// Creates a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnHandle({})", self.0)
    }
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    /// Snapshot reads only.
    Read,
    /// Exclusive writer.
    Write,
}

/// How a record write treats an existing record with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Insert or overwrite.
    Put,
    /// Fail with [`crate::Status::IdAlreadyExists`] if the id is taken.
    Insert,
    /// Fail with [`crate::Status::IdNotFound`] if the id is not stored.
    Update,
    /// The caller guarantees every id is fresh (allocated, never stored).
    PutIdGuaranteedToBeNew,
}

/// Optional features an engine build supports.
///
/// Detected once when a store opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Bulk calls (`put_many`, `get_many`, `get_all`) return or accept
    /// whole arrays. Without it only the visitor based reads and one-by-one
    /// writes are available.
    pub result_arrays: bool,
}

impl Capabilities {
    /// All features available.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            result_arrays: true,
        }
    }

    /// Only visitor reads and single record writes.
    #[must_use]
    pub const fn visitor_only() -> Self {
        Self {
            result_arrays: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}
