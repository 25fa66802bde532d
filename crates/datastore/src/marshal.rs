//! Canonical ⇄ native conversion for the hierarchical-key store.
//!
//! The native model has a typed value for every canonical kind, so the
//! mapping is one to one:
//!
//! | Canonical | Native |
//! |-----------|--------|
//! | `Null` | `nullValue` |
//! | `String` | `stringValue` |
//! | `Long` | `integerValue` |
//! | `Double` | `doubleValue` |
//! | `Boolean` | `booleanValue` |
//! | `Timestamp` | `timestampValue` (RFC 3339, nanoseconds) |
//! | `Blob` | `blobValue` (base64) |
//! | `Key` | `keyValue` |
//! | `Entity` | `entityValue` |
//! | `List` | `arrayValue` |
//!
//! The index flag is carried on every value. `geoPointValue` has no
//! canonical counterpart and is rejected.

use crate::v1;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use canonstore_core::{
    BaseEntity, Entity, EntityBuilder, EntityKey, Error, FullEntity, IncompleteKey, Key, KeyPath,
    Marshaller, Payload, PathElement, ProjectionEntity, Result, Timestamp, Unmarshaller, Value,
};
use std::collections::BTreeMap;

// =============================================================================
// Marshaller
// =============================================================================

/// Canonical → native converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatastoreMarshaller;

impl DatastoreMarshaller {
    fn key_path<K: KeyPath>(&self, key: &K) -> v1::Key {
        v1::Key {
            partition_id: v1::PartitionId {
                project_id: key.project_id().to_string(),
                namespace_id: key.namespace().to_string(),
            },
            path: key
                .path()
                .iter()
                .map(|element| v1::PathElement {
                    kind: element.kind().to_string(),
                    id: element.id(),
                    name: element.name().map(str::to_string),
                })
                .collect(),
        }
    }

    fn properties<'a>(
        &self,
        properties: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> Result<BTreeMap<String, v1::Value>> {
        properties
            .into_iter()
            .map(|(name, value)| Ok((name.clone(), self.convert_value(value)?)))
            .collect()
    }
}

impl Marshaller for DatastoreMarshaller {
    type Key = v1::Key;
    type IncompleteKey = v1::Key;
    type Entity = v1::Entity;
    type FullEntity = v1::Entity;
    type Value = v1::Value;

    fn convert_key(&self, key: &Key) -> Result<v1::Key> {
        Ok(self.key_path(key))
    }

    fn convert_incomplete_key(&self, key: &IncompleteKey) -> Result<v1::Key> {
        Ok(self.key_path(key))
    }

    fn convert_entity(&self, entity: &Entity) -> Result<v1::Entity> {
        Ok(v1::Entity {
            key: Some(self.convert_key(entity.key())?),
            properties: self.properties(entity.properties())?,
        })
    }

    fn convert_full_entity(&self, entity: &FullEntity) -> Result<v1::Entity> {
        Ok(v1::Entity {
            key: entity.key().map(|key| self.key_path(key)),
            properties: self.properties(entity.properties())?,
        })
    }

    fn convert_value(&self, value: &Value) -> Result<v1::Value> {
        let value_type = match value.payload() {
            Payload::Null => v1::ValueType::NullValue(()),
            Payload::String(s) => v1::ValueType::StringValue(s.clone()),
            Payload::Long(i) => v1::ValueType::IntegerValue(*i),
            Payload::Double(f) => v1::ValueType::DoubleValue(*f),
            Payload::Boolean(b) => v1::ValueType::BooleanValue(*b),
            Payload::Timestamp(ts) => v1::ValueType::TimestampValue(ts.to_string()),
            Payload::Blob(blob) => v1::ValueType::BlobValue(STANDARD.encode(blob.as_bytes())),
            Payload::Key(key) => v1::ValueType::KeyValue(self.convert_key(key)?),
            Payload::Entity(entity) => v1::ValueType::EntityValue(self.convert_full_entity(entity)?),
            Payload::List(list) => v1::ValueType::ArrayValue(v1::ArrayValue {
                values: list
                    .iter()
                    .map(|v| self.convert_value(v))
                    .collect::<Result<_>>()?,
            }),
        };
        Ok(v1::Value {
            exclude_from_indexes: value.exclude_from_indexes(),
            value_type,
        })
    }
}

// =============================================================================
// Unmarshaller
// =============================================================================

/// Native → canonical converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatastoreUnmarshaller;

impl DatastoreUnmarshaller {
    fn path(&self, key: &v1::Key) -> Result<Vec<PathElement>> {
        key.path
            .iter()
            .map(|element| match (element.id, &element.name) {
                (Some(_), Some(_)) => Err(Error::invalid_request(format!(
                    "Path element {} has both id and name",
                    element.kind
                ))),
                (Some(id), None) => Ok(PathElement::with_id(element.kind.clone(), id)),
                (None, Some(name)) => Ok(PathElement::with_name(element.kind.clone(), name.clone())),
                (None, None) => Ok(PathElement::of(element.kind.clone())),
            })
            .collect()
    }

    fn builder(&self, properties: &BTreeMap<String, v1::Value>) -> Result<EntityBuilder> {
        properties
            .iter()
            .try_fold(EntityBuilder::new(), |builder, (name, value)| {
                Ok(builder.set(name.clone(), self.convert_value(value)?))
            })
    }

    fn required_key(&self, entity: &v1::Entity) -> Result<Key> {
        match &entity.key {
            Some(key) => self.convert_key(key),
            None => Err(Error::invalid_request("Entity has no key")),
        }
    }
}

impl Unmarshaller for DatastoreUnmarshaller {
    type Key = v1::Key;
    type IncompleteKey = v1::Key;
    type Entity = v1::Entity;
    type FullEntity = v1::Entity;
    type ProjectionEntity = v1::Entity;
    type Value = v1::Value;

    fn convert_key(&self, key: &v1::Key) -> Result<Key> {
        Key::new(
            key.partition_id.project_id.clone(),
            key.partition_id.namespace_id.clone(),
            self.path(key)?,
        )
    }

    fn convert_incomplete_key(&self, key: &v1::Key) -> Result<IncompleteKey> {
        IncompleteKey::new(
            key.partition_id.project_id.clone(),
            key.partition_id.namespace_id.clone(),
            self.path(key)?,
        )
    }

    fn convert_entity(&self, entity: &v1::Entity) -> Result<Entity> {
        let key = self.required_key(entity)?;
        Ok(self.builder(&entity.properties)?.build_entity(key))
    }

    fn convert_full_entity(&self, entity: &v1::Entity) -> Result<FullEntity> {
        let key = match &entity.key {
            Some(key) => Some(EntityKey::from(self.convert_incomplete_key(key)?)),
            None => None,
        };
        Ok(self.builder(&entity.properties)?.build_full_entity(key))
    }

    fn convert_projection_entity(&self, entity: &v1::Entity) -> Result<ProjectionEntity> {
        let key = self.required_key(entity)?;
        Ok(self.builder(&entity.properties)?.build_projection(key))
    }

    fn convert_value(&self, value: &v1::Value) -> Result<Value> {
        let converted = match &value.value_type {
            v1::ValueType::NullValue(()) => Value::null(),
            v1::ValueType::BooleanValue(b) => Value::boolean(*b),
            v1::ValueType::IntegerValue(i) => Value::long(*i),
            v1::ValueType::DoubleValue(f) => Value::double(*f),
            v1::ValueType::TimestampValue(text) => Value::timestamp(Timestamp::parse(text)?),
            v1::ValueType::KeyValue(key) => Value::key(self.convert_key(key)?),
            v1::ValueType::StringValue(s) => Value::string(s.clone()),
            v1::ValueType::BlobValue(encoded) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::invalid_request(format!("Invalid blob value: {}", e)))?;
                Value::blob(bytes)
            }
            v1::ValueType::EntityValue(entity) => Value::entity(self.convert_full_entity(entity)?),
            v1::ValueType::ArrayValue(array) => Value::list(
                array
                    .values
                    .iter()
                    .map(|v| self.convert_value(v))
                    .collect::<Result<_>>()?,
            )?,
            other => {
                return Err(Error::invalid_request(format!(
                    "Unsupported value type {}",
                    other.name()
                )))
            }
        };
        Ok(converted.with_exclude_from_indexes(value.exclude_from_indexes))
    }
}
