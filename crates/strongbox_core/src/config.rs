//! Store configuration.

use strongbox_engine::{Capabilities, MAX_IDS_PER_BLOCK};

/// How bulk reads fetch records from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// One engine call returns all requested records at once.
    ResultArray,
    /// The engine hands records to a callback one at a time.
    Visitor,
}

impl ReadStrategy {
    /// Picks the strategy an engine with `capabilities` supports best.
    #[must_use]
    pub const fn detect(capabilities: Capabilities) -> Self {
        if capabilities.result_arrays {
            Self::ResultArray
        } else {
            Self::Visitor
        }
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of objects written per engine call in bulk puts.
    pub chunk_size: usize,

    /// Encoders whose buffer grew to this many bytes are dropped instead of
    /// returned to the pool.
    pub encoder_retain_limit: usize,

    /// Maximum number of idle encoders kept in the pool.
    pub max_pooled_encoders: usize,

    /// Number of queued async writes before submission blocks.
    pub async_queue_capacity: usize,

    /// Forced bulk read strategy. `None` detects it from the engine.
    pub read_strategy: Option<ReadStrategy>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            encoder_retain_limit: 1024 * 1024, // 1 MiB
            max_pooled_encoders: 64,
            async_queue_capacity: 1024,
            read_strategy: None,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bulk put chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the encoder retention limit in bytes.
    #[must_use]
    pub const fn encoder_retain_limit(mut self, bytes: usize) -> Self {
        self.encoder_retain_limit = bytes;
        self
    }

    /// Sets the maximum number of pooled encoders.
    #[must_use]
    pub const fn max_pooled_encoders(mut self, count: usize) -> Self {
        self.max_pooled_encoders = count;
        self
    }

    /// Sets the async queue capacity.
    #[must_use]
    pub const fn async_queue_capacity(mut self, capacity: usize) -> Self {
        self.async_queue_capacity = capacity;
        self
    }

    /// Forces a bulk read strategy.
    #[must_use]
    pub const fn read_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.read_strategy = Some(strategy);
        self
    }

    /// Returns a description of the first invalid setting, if any.
    pub(crate) fn invalid_setting(&self) -> Option<&'static str> {
        if self.chunk_size == 0 {
            Some("chunk_size must be greater than zero")
        } else if self.chunk_size as u64 > MAX_IDS_PER_BLOCK {
            Some("chunk_size must not exceed MAX_IDS_PER_BLOCK")
        } else if self.async_queue_capacity == 0 {
            Some("async_queue_capacity must be greater than zero")
        } else {
            None
        }
    }
}
