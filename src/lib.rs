//! # canonstore
//!
//! One canonical key/entity/value/query model over two storage backends: a
//! hierarchical-key store and a document database.
//!
//! ## Quick Start
//!
//! ```
//! use canonstore::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let store = Store::in_memory(BackendKind::Docstore, "inventory");
//!     let factory = store.new_key_factory();
//!
//!     let key = factory.new_key_with_name("Task", "sample")?;
//!     store.put(Entity::builder().set("num", 3i64).build_entity(key.clone()))?;
//!
//!     let query = Query::key_query_builder()
//!         .kind("Task")
//!         .order_by(OrderBy::desc("num"))
//!         .build()?;
//!     for found in store.run(&query)? {
//!         assert_eq!(found?, key);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! | Backend | Batch writes | Ids for incomplete keys |
//! |---------|--------------|-------------------------|
//! | [`BackendKind::Datastore`] | atomic | allocated |
//! | [`BackendKind::Docstore`] | sequential, stop at first failure | rejected |
//!
//! Both run in-process by default; real clients plug in through
//! [`StoreBuilder::datastore_client`] and [`StoreBuilder::document_client`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod store;

pub mod prelude;

// Re-export main entry points
pub use config::{BackendKind, StoreConfig};
pub use error::{ConfigError, ConfigResult, Error, Result};
pub use store::{Store, StoreBuilder};

// Re-export the canonical model
pub use canonstore_core::{
    Atomicity, BaseEntity, Blob, CompositeFilter, CompositeOperator, Direction, Entity,
    EntityBuilder, EntityKey, Filter, FullEntity, IdOrName, IncompleteKey, Key, KeyBuilder,
    KeyFactory, KeyPath, OrderBy, PathElement, Payload, ProjectionEntity, PropertyFilter,
    PropertyOperator, Query, QueryBuilder, QueryResultKind, QueryResults, ResultType, Timestamp,
    Value, ValueKind, ValueList, MAX_PATH_LEN,
};

// Backend crates, for custom clients
pub use canonstore_core as model;
pub use canonstore_datastore as datastore;
pub use canonstore_docstore as docstore;
pub use canonstore_wire as wire;
