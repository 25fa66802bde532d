//! Canonical ⇄ BSON conversion for the document store.
//!
//! ## Document Layout
//!
//! ```text
//! {
//!   "_id":     "<encoded key>",
//!   "__key__": { "type": "key", "key": "<encoded key>" },
//!   "<property>": <value>, ...
//! }
//! ```
//!
//! Key values use the same `{type, key}` sub-document. Embedded entities are
//! sub-documents carrying their own `__key__`, `null` when they have no key.
//! On the way back, a sub-document with exactly the fields `type: "key"` and
//! `key` is a key; any other sub-document is an entity.
//!
//! ## Lossy Spots
//!
//! - the index flag is not stored
//! - timestamps are BSON datetimes (milliseconds); finer values are rejected
//! - BSON `int32` reads back as a long

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Document};
use canonstore_core::{
    BaseEntity, Entity, EntityBuilder, EntityKey, Error, FullEntity, IncompleteKey, Key,
    Marshaller, Payload, ProjectionEntity, Result, Timestamp, Unmarshaller, Value,
};
use canonstore_wire::{decode_key, encode_key};

/// Field holding an entity's key.
pub const KEY_FIELD: &str = "__key__";

/// Primary id field; the encoded key.
pub const ID_FIELD: &str = "_id";

const TYPE_FIELD: &str = "type";
const KEY_STRING_FIELD: &str = "key";
const KEY_TYPE: &str = "key";

/// True for a `{type: "key", key: "..."}` sub-document.
pub fn is_key_document(document: &Document) -> bool {
    document.len() == 2
        && matches!(document.get(TYPE_FIELD), Some(Bson::String(t)) if t == KEY_TYPE)
        && matches!(document.get(KEY_STRING_FIELD), Some(Bson::String(_)))
}

fn check_name(name: &str) -> Result<()> {
    if name == KEY_FIELD || name == ID_FIELD {
        return Err(Error::invalid_request(format!(
            "Property name {} is reserved",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Marshaller
// =============================================================================

/// Canonical → BSON converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentMarshaller;

impl DocumentMarshaller {
    /// The `_id` value for a key.
    pub fn document_id(&self, key: &Key) -> Result<String> {
        Ok(encode_key(key)?)
    }

    fn append_properties<E: BaseEntity>(&self, document: &mut Document, entity: &E) -> Result<()> {
        for (name, value) in entity.properties() {
            check_name(name)?;
            document.insert(name.clone(), self.convert_value(value)?);
        }
        Ok(())
    }
}

impl Marshaller for DocumentMarshaller {
    type Key = Document;
    type IncompleteKey = Document;
    type Entity = Document;
    type FullEntity = Document;
    type Value = Bson;

    fn convert_key(&self, key: &Key) -> Result<Document> {
        let mut document = Document::new();
        document.insert(TYPE_FIELD, KEY_TYPE);
        document.insert(KEY_STRING_FIELD, encode_key(key)?);
        Ok(document)
    }

    fn convert_incomplete_key(&self, key: &IncompleteKey) -> Result<Document> {
        if !key.is_complete() {
            return Err(Error::invalid_request(format!(
                "Key {} has neither id nor name; the document store does not allocate ids",
                key
            )));
        }
        self.convert_key(&Key::from_incomplete(key.clone())?)
    }

    fn convert_entity(&self, entity: &Entity) -> Result<Document> {
        let mut document = Document::new();
        document.insert(ID_FIELD, self.document_id(entity.key())?);
        document.insert(KEY_FIELD, self.convert_key(entity.key())?);
        self.append_properties(&mut document, entity)?;
        Ok(document)
    }

    fn convert_full_entity(&self, entity: &FullEntity) -> Result<Document> {
        let mut document = Document::new();
        match entity.key() {
            Some(EntityKey::Complete(key)) => {
                document.insert(KEY_FIELD, self.convert_key(key)?);
            }
            Some(EntityKey::Incomplete(key)) => {
                document.insert(KEY_FIELD, self.convert_incomplete_key(key)?);
            }
            None => {
                document.insert(KEY_FIELD, Bson::Null);
            }
        }
        self.append_properties(&mut document, entity)?;
        Ok(document)
    }

    fn convert_value(&self, value: &Value) -> Result<Bson> {
        let converted = match value.payload() {
            Payload::Null => Bson::Null,
            Payload::String(s) => Bson::String(s.clone()),
            Payload::Long(i) => Bson::Int64(*i),
            Payload::Double(f) => Bson::Double(*f),
            Payload::Boolean(b) => Bson::Boolean(*b),
            Payload::Timestamp(ts) => {
                if !ts.is_millis_precise() {
                    return Err(Error::invalid_request(format!(
                        "Timestamp {} is finer than millisecond precision",
                        ts
                    )));
                }
                Bson::DateTime(DateTime::from_millis(ts.to_millis()))
            }
            Payload::Blob(blob) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: blob.as_bytes().to_vec(),
            }),
            Payload::Key(key) => Bson::Document(self.convert_key(key)?),
            Payload::Entity(entity) => Bson::Document(self.convert_full_entity(entity)?),
            Payload::List(list) => Bson::Array(
                list.iter()
                    .map(|v| self.convert_value(v))
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(converted)
    }
}

// =============================================================================
// Unmarshaller
// =============================================================================

/// BSON → canonical converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentUnmarshaller;

impl DocumentUnmarshaller {
    fn builder(&self, document: &Document) -> Result<EntityBuilder> {
        document
            .iter()
            .filter(|(name, _)| name.as_str() != KEY_FIELD && name.as_str() != ID_FIELD)
            .try_fold(EntityBuilder::new(), |builder, (name, value)| {
                Ok(builder.set(name.clone(), self.convert_value(value)?))
            })
    }

    /// The key stored in a document's `__key__` field.
    pub fn document_key(&self, document: &Document) -> Result<Key> {
        match document.get(KEY_FIELD) {
            Some(Bson::Document(key)) => self.convert_key(key),
            Some(other) => Err(Error::invalid_request(format!(
                "Field {} holds {:?}, not a key document",
                KEY_FIELD,
                other.element_type()
            ))),
            None => Err(Error::invalid_request(format!(
                "Document has no {} field",
                KEY_FIELD
            ))),
        }
    }
}

impl Unmarshaller for DocumentUnmarshaller {
    type Key = Document;
    type IncompleteKey = Document;
    type Entity = Document;
    type FullEntity = Document;
    type ProjectionEntity = Document;
    type Value = Bson;

    fn convert_key(&self, key: &Document) -> Result<Key> {
        if !is_key_document(key) {
            return Err(Error::invalid_request(format!(
                "Cannot read key from document {}",
                key
            )));
        }
        match key.get(KEY_STRING_FIELD) {
            Some(Bson::String(encoded)) => Ok(decode_key(encoded)?),
            _ => Err(Error::invalid_request("Key document has no key string")),
        }
    }

    fn convert_incomplete_key(&self, key: &Document) -> Result<IncompleteKey> {
        self.convert_key(key).map(Key::into_incomplete)
    }

    fn convert_entity(&self, entity: &Document) -> Result<Entity> {
        let key = self.document_key(entity)?;
        Ok(self.builder(entity)?.build_entity(key))
    }

    fn convert_full_entity(&self, entity: &Document) -> Result<FullEntity> {
        let key = match entity.get(KEY_FIELD) {
            None | Some(Bson::Null) => None,
            Some(_) => Some(EntityKey::Complete(self.document_key(entity)?)),
        };
        Ok(self.builder(entity)?.build_full_entity(key))
    }

    fn convert_projection_entity(&self, entity: &Document) -> Result<ProjectionEntity> {
        let key = self.document_key(entity)?;
        Ok(self.builder(entity)?.build_projection(key))
    }

    fn convert_value(&self, value: &Bson) -> Result<Value> {
        let converted = match value {
            Bson::Null => Value::null(),
            Bson::String(s) => Value::string(s.clone()),
            Bson::Int64(i) => Value::long(*i),
            Bson::Int32(i) => Value::long(i64::from(*i)),
            Bson::Double(f) => Value::double(*f),
            Bson::Boolean(b) => Value::boolean(*b),
            Bson::DateTime(dt) => Value::timestamp(Timestamp::from_millis(dt.timestamp_millis())?),
            Bson::Binary(binary) => Value::blob(binary.bytes.clone()),
            Bson::Array(values) => Value::list(
                values
                    .iter()
                    .map(|v| self.convert_value(v))
                    .collect::<Result<_>>()?,
            )?,
            Bson::Document(document) if is_key_document(document) => {
                Value::key(self.convert_key(document)?)
            }
            Bson::Document(document) => Value::entity(self.convert_full_entity(document)?),
            other => {
                return Err(Error::invalid_request(format!(
                    "Unsupported BSON type {:?}",
                    other.element_type()
                )))
            }
        };
        Ok(converted)
    }
}
