//! # Strongbox Core
//!
//! Typed object boxes over a transactional storage engine.
//!
//! This crate provides:
//! - [`Model`] of entity types and many-to-many relations, checked once
//! - [`ObjectBinding`] mapping an application type to stored records
//! - [`EntityBox`] with CRUD, chunked bulk puts and bulk reads
//! - relation synchronization that writes only the changed links
//! - [`AsyncBox`] for queued writes with synchronously assigned ids
//! - [`Store`] tying an [`Engine`](strongbox_engine::Engine) to a model
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use strongbox_codec::{decode_record, RecordEncoder};
//! use strongbox_core::{Model, ObjectBinding, Store, StoreResult};
//! use strongbox_engine::{EntityTypeId, ObjectId};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Note {
//!     #[serde(skip)]
//!     id: ObjectId,
//!     text: String,
//! }
//!
//! struct NoteBinding;
//!
//! impl ObjectBinding for NoteBinding {
//!     type Object = Note;
//!     fn entity_id(&self) -> EntityTypeId { 1 }
//!     fn entity_name(&self) -> &str { "Note" }
//!     fn id(&self, note: &Note) -> StoreResult<ObjectId> { Ok(note.id) }
//!     fn set_id(&self, note: &mut Note, id: ObjectId) -> StoreResult<()> {
//!         note.id = id;
//!         Ok(())
//!     }
//!     fn encode(
//!         &self,
//!         note: &Note,
//!         id: ObjectId,
//!         encoder: &mut RecordEncoder,
//!     ) -> StoreResult<()> {
//!         encoder.encode(id, note)?;
//!         Ok(())
//!     }
//!     fn decode(&self, bytes: &[u8]) -> StoreResult<Note> {
//!         let (id, mut note): (ObjectId, Note) = decode_record(bytes)?;
//!         note.id = id;
//!         Ok(note)
//!     }
//! }
//!
//! let model = Model::builder().entity(NoteBinding).build().unwrap();
//! let store = Store::open_in_memory(model).unwrap();
//! let notes = store.box_for::<NoteBinding>().unwrap();
//!
//! let mut note = Note { id: 0, text: "hello".into() };
//! let id = notes.put(&mut note).unwrap();
//! assert_eq!(note.id, id);
//! assert_eq!(notes.get(id).unwrap().unwrap().text, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod async_queue;
mod binding;
mod config;
mod error;
mod model;
mod object_box;
mod pool;
mod store;
mod transaction;

#[cfg(test)]
mod test_support;

pub use async_queue::AsyncQueue;
pub use binding::{ObjectBinding, RelatedContext};
pub use config::{ReadStrategy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use model::{EntityDescriptor, Model, ModelBuilder, RelationDescriptor, RelationToMany};
pub use object_box::{AsyncBox, EntityBox};
pub use pool::{EncoderPool, PooledEncoder};
pub use store::Store;
pub use transaction::Transaction;

pub use strongbox_codec::{CodecError, RecordEncoder};
pub use strongbox_engine::{EntityTypeId, ObjectId, PutMode, RelationId, Status};
