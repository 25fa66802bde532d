//! Canonical data model for canonstore
//!
//! This crate defines the backend-independent model every storage adapter
//! converts to and from:
//!
//! - [`Key`] / [`IncompleteKey`] / [`PathElement`]: hierarchical addresses
//! - [`Entity`] / [`FullEntity`] / [`ProjectionEntity`]: keyed property bags
//! - [`Value`]: a closed tagged union of property payloads
//! - [`Query`]: backend-agnostic structured queries
//!
//! It also defines the seams backends plug into:
//!
//! - [`Marshaller`] / [`Unmarshaller`]: canonical ⇄ native conversion
//! - [`StoreAdapter`]: put/get/delete/run over the canonical model
//! - [`QueryResults`] / [`RowSource`]: the lazy result cursor
//!
//! ## Error Model
//!
//! Every conversion or validation failure is [`Error::InvalidRequest`].
//! Transport failures from a backend client travel unchanged inside
//! [`Error::Backend`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod key;
pub mod marshal;
pub mod query;
pub mod timestamp;
pub mod value;

pub use adapter::{Atomicity, StoreAdapter};
pub use cursor::{QueryResults, RowSource};
pub use entity::{BaseEntity, Entity, EntityBuilder, FullEntity, ProjectionEntity};
pub use error::{Error, Result};
pub use key::{
    EntityKey, IdOrName, IncompleteKey, Key, KeyBuilder, KeyFactory, KeyPath, PathElement,
    MAX_PATH_LEN,
};
pub use marshal::{Marshaller, Unmarshaller};
pub use query::{
    CompositeFilter, CompositeOperator, Direction, Filter, OrderBy, PropertyFilter,
    PropertyOperator, Query, QueryBuilder, QueryResultKind, QueryRow, ResultType,
    StructuredQuery,
};
pub use timestamp::Timestamp;
pub use value::{Blob, Payload, Value, ValueKind, ValueList};
