//! Conversion contracts between the canonical model and a backend.
//!
//! Each backend provides a stateless [`Marshaller`] (canonical → native) and
//! [`Unmarshaller`] (native → canonical). The associated types name the
//! backend's native key, entity and value representations.
//!
//! ## Rules
//!
//! - Keys keep project id, namespace, every ancestor in order and the
//!   id/name discriminant
//! - Entities convert every property; values convert recursively through
//!   lists and embedded entities
//! - A direction the backend cannot represent returns
//!   [`Error::InvalidRequest`](crate::Error::InvalidRequest) instead of
//!   guessing a representation
//!
//! Converters are plain values handed to adapters at construction; nothing
//! here is global.

use crate::entity::{Entity, FullEntity, ProjectionEntity};
use crate::error::Result;
use crate::key::{IncompleteKey, Key};
use crate::value::Value;

/// Canonical → native conversion.
pub trait Marshaller {
    /// Native complete key.
    type Key;
    /// Native incomplete key.
    type IncompleteKey;
    /// Native top-level entity.
    type Entity;
    /// Native entity with an optional or incomplete key.
    type FullEntity;
    /// Native property value.
    type Value;

    /// Convert a complete key.
    fn convert_key(&self, key: &Key) -> Result<Self::Key>;

    /// Convert an incomplete key.
    fn convert_incomplete_key(&self, key: &IncompleteKey) -> Result<Self::IncompleteKey>;

    /// Convert a top-level entity.
    fn convert_entity(&self, entity: &Entity) -> Result<Self::Entity>;

    /// Convert an entity whose key may be missing or incomplete.
    fn convert_full_entity(&self, entity: &FullEntity) -> Result<Self::FullEntity>;

    /// Convert one value, recursing into lists and embedded entities.
    fn convert_value(&self, value: &Value) -> Result<Self::Value>;
}

/// Native → canonical conversion.
pub trait Unmarshaller {
    /// Native complete key.
    type Key;
    /// Native incomplete key.
    type IncompleteKey;
    /// Native top-level entity.
    type Entity;
    /// Native entity with an optional or incomplete key.
    type FullEntity;
    /// Native projection row.
    type ProjectionEntity;
    /// Native property value.
    type Value;

    /// Convert a native key; fails if the leaf has neither id nor name.
    fn convert_key(&self, key: &Self::Key) -> Result<Key>;

    /// Convert a native key that may be incomplete.
    fn convert_incomplete_key(&self, key: &Self::IncompleteKey) -> Result<IncompleteKey>;

    /// Convert a native top-level entity.
    fn convert_entity(&self, entity: &Self::Entity) -> Result<Entity>;

    /// Convert a native entity whose key may be missing or incomplete.
    fn convert_full_entity(&self, entity: &Self::FullEntity) -> Result<FullEntity>;

    /// Convert a native projection row.
    fn convert_projection_entity(&self, entity: &Self::ProjectionEntity)
        -> Result<ProjectionEntity>;

    /// Convert one native value.
    fn convert_value(&self, value: &Self::Value) -> Result<Value>;
}
