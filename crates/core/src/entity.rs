//! Entities
//!
//! An entity is an optional key plus a map from property name to [`Value`].
//! Properties live in a `BTreeMap`, so iteration and equality are by sorted
//! property name regardless of the order a backend returned them in.
//!
//! ## Entity Shapes
//!
//! | Type | Key | Produced by |
//! |------|-----|-------------|
//! | [`Entity`] | complete [`Key`] | `put`, `get`, entity queries |
//! | [`FullEntity`] | optional [`EntityKey`] | embedded entity values |
//! | [`ProjectionEntity`] | complete [`Key`] | projection queries |
//!
//! All three are built with the same [`EntityBuilder`].

use crate::error::{Error, Result};
use crate::key::{EntityKey, Key};
use crate::timestamp::Timestamp;
use crate::value::{Blob, Value, ValueKind, ValueList};
use std::collections::btree_map::Keys;
use std::collections::BTreeMap;

/// Read access shared by every entity shape.
pub trait BaseEntity {
    /// Properties, sorted by name.
    fn properties(&self) -> &BTreeMap<String, Value>;

    /// True if the property is present (possibly null).
    fn contains(&self, name: &str) -> bool {
        self.properties().contains_key(name)
    }

    /// The property value; a missing property is an error.
    fn value(&self, name: &str) -> Result<&Value> {
        self.properties()
            .get(name)
            .ok_or_else(|| Error::invalid_request(format!("No such property {}", name)))
    }

    /// Property names in sorted order.
    fn names(&self) -> Keys<'_, String, Value> {
        self.properties().keys()
    }

    /// Number of properties.
    fn len(&self) -> usize {
        self.properties().len()
    }

    /// True if there are no properties.
    fn is_empty(&self) -> bool {
        self.properties().is_empty()
    }

    /// True if the property holds null.
    fn is_null(&self, name: &str) -> Result<bool> {
        Ok(self.value(name)?.is_null())
    }

    /// String property.
    fn get_string(&self, name: &str) -> Result<&str> {
        typed(self.value(name)?, name, ValueKind::String, Value::as_str)
    }

    /// Long property.
    fn get_long(&self, name: &str) -> Result<i64> {
        typed(self.value(name)?, name, ValueKind::Long, Value::as_long)
    }

    /// Double property.
    fn get_double(&self, name: &str) -> Result<f64> {
        typed(self.value(name)?, name, ValueKind::Double, Value::as_double)
    }

    /// Boolean property.
    fn get_boolean(&self, name: &str) -> Result<bool> {
        typed(self.value(name)?, name, ValueKind::Boolean, Value::as_boolean)
    }

    /// Timestamp property.
    fn get_timestamp(&self, name: &str) -> Result<Timestamp> {
        typed(self.value(name)?, name, ValueKind::Timestamp, Value::as_timestamp)
    }

    /// Blob property.
    fn get_blob(&self, name: &str) -> Result<&Blob> {
        typed(self.value(name)?, name, ValueKind::Blob, Value::as_blob)
    }

    /// Key property.
    fn get_key(&self, name: &str) -> Result<&Key> {
        typed(self.value(name)?, name, ValueKind::Key, Value::as_key)
    }

    /// Embedded entity property.
    fn get_entity(&self, name: &str) -> Result<&FullEntity> {
        typed(self.value(name)?, name, ValueKind::Entity, Value::as_entity)
    }

    /// List property.
    fn get_list(&self, name: &str) -> Result<&ValueList> {
        typed(self.value(name)?, name, ValueKind::List, Value::as_list)
    }
}

fn typed<'a, T>(
    value: &'a Value,
    name: &str,
    expected: ValueKind,
    get: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<T> {
    get(value).ok_or_else(|| {
        Error::invalid_request(format!(
            "Property {} is {}, not {}",
            name,
            value.type_name(),
            expected.name()
        ))
    })
}

// =============================================================================
// Entity
// =============================================================================

/// An entity with a complete key; the only shape persisted at top level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Start an empty builder.
    pub fn builder() -> EntityBuilder {
        EntityBuilder::new()
    }

    /// The entity's key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Builder pre-filled with this entity's properties.
    pub fn to_builder(&self) -> EntityBuilder {
        EntityBuilder::from_entity(self)
    }

    /// View as a full entity with a complete key.
    pub fn into_full(self) -> FullEntity {
        FullEntity {
            key: Some(EntityKey::Complete(self.key)),
            properties: self.properties,
        }
    }

    /// Split into key and properties.
    pub fn into_parts(self) -> (Key, BTreeMap<String, Value>) {
        (self.key, self.properties)
    }
}

impl BaseEntity for Entity {
    fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

// =============================================================================
// FullEntity
// =============================================================================

/// An entity whose key may be absent or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullEntity {
    key: Option<EntityKey>,
    properties: BTreeMap<String, Value>,
}

impl FullEntity {
    /// The key, if any.
    pub fn key(&self) -> Option<&EntityKey> {
        self.key.as_ref()
    }

    /// Convert to an [`Entity`]; fails unless the key is complete.
    pub fn try_into_entity(self) -> Result<Entity> {
        match self.key {
            Some(EntityKey::Complete(key)) => Ok(Entity {
                key,
                properties: self.properties,
            }),
            Some(EntityKey::Incomplete(key)) => Err(Error::invalid_request(format!(
                "Entity key {} has neither id nor name",
                key
            ))),
            None => Err(Error::invalid_request("Entity has no key")),
        }
    }

    /// Split into key and properties.
    pub fn into_parts(self) -> (Option<EntityKey>, BTreeMap<String, Value>) {
        (self.key, self.properties)
    }
}

impl BaseEntity for FullEntity {
    fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

impl From<Entity> for FullEntity {
    fn from(entity: Entity) -> Self {
        entity.into_full()
    }
}

// =============================================================================
// ProjectionEntity
// =============================================================================

/// One row of a projection query.
///
/// A projection over a list property yields one row per element, so several
/// rows may share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionEntity {
    key: Key,
    properties: BTreeMap<String, Value>,
}

impl ProjectionEntity {
    /// The key of the entity this row was projected from.
    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl BaseEntity for ProjectionEntity {
    fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

// =============================================================================
// EntityBuilder
// =============================================================================

/// Builder for every entity shape.
///
/// ```
/// use canonstore_core::{BaseEntity, EntityBuilder, KeyBuilder};
///
/// let key = KeyBuilder::new("test-project", "Task").build_with_name("a").unwrap();
/// let entity = EntityBuilder::new()
///     .set("title", "write docs")
///     .set("priority", 2i64)
///     .set_null("owner")
///     .build_entity(key);
///
/// assert_eq!(entity.get_long("priority").unwrap(), 2);
/// assert!(entity.is_null("owner").unwrap());
/// assert!(entity.value("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder {
    properties: BTreeMap<String, Value>,
}

impl EntityBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder holding a copy of another entity's properties.
    pub fn from_entity<E: BaseEntity + ?Sized>(entity: &E) -> Self {
        EntityBuilder {
            properties: entity.properties().clone(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property to null.
    pub fn set_null(self, name: impl Into<String>) -> Self {
        self.set(name, Value::null())
    }

    /// Remove a property.
    pub fn remove(mut self, name: &str) -> Self {
        self.properties.remove(name);
        self
    }

    /// Remove every property.
    pub fn clear(mut self) -> Self {
        self.properties.clear();
        self
    }

    /// Finish as an [`Entity`].
    pub fn build_entity(self, key: Key) -> Entity {
        Entity {
            key,
            properties: self.properties,
        }
    }

    /// Finish as a [`FullEntity`].
    pub fn build_full_entity(self, key: Option<EntityKey>) -> FullEntity {
        FullEntity {
            key: key.map(EntityKey::normalize),
            properties: self.properties,
        }
    }

    /// Finish as a [`ProjectionEntity`].
    pub fn build_projection(self, key: Key) -> ProjectionEntity {
        ProjectionEntity {
            key,
            properties: self.properties,
        }
    }
}
