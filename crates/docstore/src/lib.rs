//! Document store backend for canonstore
//!
//! This crate maps the canonical model onto a MongoDB-style document store:
//! - DocumentMarshaller / DocumentUnmarshaller: model ⇄ BSON conversion
//! - DocumentQueryTranslator: structured query → `find` or aggregation
//!   pipeline
//! - DocumentClient / Collection / DocumentCursor: the client seam, with
//!   MemoryDocumentStore as an in-process implementation
//! - DocumentStoreAdapter: the StoreAdapter tying them together
//!
//! Each entity is one document in the collection `"{namespace}__{kind}"` of
//! the project's database, keyed by its encoded key.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod client;
pub mod marshal;
pub mod memory;
pub mod translate;

pub use adapter::DocumentStoreAdapter;
pub use client::{collection_name, Collection, DocumentClient, DocumentCursor, FindRequest};
pub use marshal::{is_key_document, DocumentMarshaller, DocumentUnmarshaller, ID_FIELD, KEY_FIELD};
pub use memory::{MemoryDocumentError, MemoryDocumentStore};
pub use translate::{DocumentQueryTranslator, NativeQuery, TranslatedQuery};
