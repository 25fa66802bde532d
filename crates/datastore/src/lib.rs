//! Hierarchical-key store backend for canonstore
//!
//! This crate maps the canonical model onto a Datastore-style service:
//! - v1: the service's JSON wire types and query builder
//! - DatastoreMarshaller / DatastoreUnmarshaller: model conversion
//! - DatastoreQueryTranslator: structured query → `runQuery` request
//! - DatastoreClient: the client seam, with MemoryDatastore as an in-process
//!   implementation
//! - DatastoreAdapter: the StoreAdapter tying them together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod client;
pub mod marshal;
pub mod memory;
pub mod translate;
pub mod v1;

pub use adapter::DatastoreAdapter;
pub use client::{DatastoreClient, EntityCursor};
pub use marshal::{DatastoreMarshaller, DatastoreUnmarshaller};
pub use memory::{MemoryDatastore, MemoryDatastoreError, MAX_INDEXED_BYTES};
pub use translate::DatastoreQueryTranslator;
