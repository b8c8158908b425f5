//! # Strongbox Testkit
//!
//! Test utilities for Strongbox.
//!
//! This crate provides:
//! - Fixture entity types with ready-made bindings and a model
//! - Store helpers over a fresh [`MemoryEngine`](strongbox_engine::MemoryEngine)
//! - Property-based test generators using proptest
//! - A harness that mirrors box contents for verification
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use strongbox_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let events = store.box_for::<EventBinding>().unwrap();
//!     let id = events.put(&mut Event::new("boot", 1)).unwrap();
//!     assert!(events.contains(id).unwrap());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use logging::*;
pub use stress::*;
