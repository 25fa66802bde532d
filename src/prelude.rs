//! Convenient imports for canonstore.
//!
//! ```
//! use canonstore::prelude::*;
//!
//! let store = Store::in_memory(BackendKind::Datastore, "inventory");
//! assert_eq!(store.backend_name(), "datastore");
//! ```

// Main entry point
pub use crate::config::{BackendKind, StoreConfig};
pub use crate::store::{Store, StoreBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Model
pub use canonstore_core::{
    BaseEntity, Entity, EntityKey, FullEntity, IncompleteKey, Key, KeyFactory, KeyPath, OrderBy,
    PathElement, ProjectionEntity, PropertyFilter, CompositeFilter, Query, QueryResults,
    Timestamp, Value,
};
