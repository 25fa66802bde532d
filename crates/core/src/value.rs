//! Property values
//!
//! [`Value`] is the canonical property payload every backend converts to and
//! from. It is a closed sum type ([`Payload`]) plus one flag,
//! `exclude_from_indexes`.
//!
//! ## Value Kinds
//!
//! | Kind | Payload |
//! |------|---------|
//! | `Null` | no payload |
//! | `String` | UTF-8 text |
//! | `Long` | 64-bit signed integer |
//! | `Double` | 64-bit IEEE-754 float |
//! | `Boolean` | true / false |
//! | `Timestamp` | [`Timestamp`] |
//! | `Blob` | [`Blob`] bytes |
//! | `Key` | complete [`Key`] |
//! | `Entity` | embedded [`FullEntity`] |
//! | `List` | [`ValueList`] |
//!
//! ## Equality Rules
//!
//! - Different kinds are never equal (`Long(1) != Double(1.0)`)
//! - The index flag takes part in equality
//! - Doubles compare by bit pattern, so `NaN == NaN` and `0.0 != -0.0`;
//!   this is structural equality, not numeric comparison
//! - A list never contains another list; [`ValueList::new`] enforces it

use crate::entity::{Entity, FullEntity};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::timestamp::Timestamp;
use std::hash::{Hash, Hasher};

// =============================================================================
// ValueKind
// =============================================================================

/// Tag of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Null
    Null,
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// Boolean
    Boolean,
    /// Timestamp
    Timestamp,
    /// Byte sequence
    Blob,
    /// Complete key
    Key,
    /// Embedded entity
    Entity,
    /// List of non-list values
    List,
}

impl ValueKind {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "Null",
            ValueKind::String => "String",
            ValueKind::Long => "Long",
            ValueKind::Double => "Double",
            ValueKind::Boolean => "Boolean",
            ValueKind::Timestamp => "Timestamp",
            ValueKind::Blob => "Blob",
            ValueKind::Key => "Key",
            ValueKind::Entity => "Entity",
            ValueKind::List => "List",
        }
    }
}

// =============================================================================
// Blob / ValueList
// =============================================================================

/// Immutable byte sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Blob(Vec<u8>);

impl Blob {
    /// The bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

/// Ordered list of values, none of which is itself a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ValueList(Vec<Value>);

impl ValueList {
    /// Build a list, rejecting nested lists.
    pub fn new(values: Vec<Value>) -> Result<Self> {
        if values.iter().any(|v| v.kind() == ValueKind::List) {
            return Err(Error::invalid_request("Cannot contain another list"));
        }
        Ok(ValueList(values))
    }

    /// The elements.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Iterate the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the elements.
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ValueList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Payload
// =============================================================================

/// The payload of a [`Value`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// Null
    Null,
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// Timestamp
    Timestamp(Timestamp),
    /// Byte sequence
    Blob(Blob),
    /// Complete key
    Key(Key),
    /// Embedded entity, keyed or not
    Entity(Box<FullEntity>),
    /// List of non-list values
    List(ValueList),
}

impl Payload {
    /// Tag of this payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Payload::Null => ValueKind::Null,
            Payload::String(_) => ValueKind::String,
            Payload::Long(_) => ValueKind::Long,
            Payload::Double(_) => ValueKind::Double,
            Payload::Boolean(_) => ValueKind::Boolean,
            Payload::Timestamp(_) => ValueKind::Timestamp,
            Payload::Blob(_) => ValueKind::Blob,
            Payload::Key(_) => ValueKind::Key,
            Payload::Entity(_) => ValueKind::Entity,
            Payload::List(_) => ValueKind::List,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Null, Payload::Null) => true,
            (Payload::String(a), Payload::String(b)) => a == b,
            (Payload::Long(a), Payload::Long(b)) => a == b,
            (Payload::Double(a), Payload::Double(b)) => a.to_bits() == b.to_bits(),
            (Payload::Boolean(a), Payload::Boolean(b)) => a == b,
            (Payload::Timestamp(a), Payload::Timestamp(b)) => a == b,
            (Payload::Blob(a), Payload::Blob(b)) => a == b,
            (Payload::Key(a), Payload::Key(b)) => a == b,
            (Payload::Entity(a), Payload::Entity(b)) => a == b,
            (Payload::List(a), Payload::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Payload {}

impl Hash for Payload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Payload::Null => {}
            Payload::String(s) => s.hash(state),
            Payload::Long(i) => i.hash(state),
            Payload::Double(f) => f.to_bits().hash(state),
            Payload::Boolean(b) => b.hash(state),
            Payload::Timestamp(ts) => ts.hash(state),
            Payload::Blob(b) => b.hash(state),
            Payload::Key(k) => k.hash(state),
            Payload::Entity(e) => e.hash(state),
            Payload::List(l) => l.hash(state),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A typed property value with an index-exclusion flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    payload: Payload,
    exclude_from_indexes: bool,
}

impl Value {
    /// Wrap a payload; the value is indexed.
    pub fn new(payload: Payload) -> Self {
        Value {
            payload,
            exclude_from_indexes: false,
        }
    }

    /// Null value.
    pub fn null() -> Self {
        Value::new(Payload::Null)
    }

    /// String value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::new(Payload::String(s.into()))
    }

    /// Long value.
    pub fn long(i: i64) -> Self {
        Value::new(Payload::Long(i))
    }

    /// Double value.
    pub fn double(f: f64) -> Self {
        Value::new(Payload::Double(f))
    }

    /// Boolean value.
    pub fn boolean(b: bool) -> Self {
        Value::new(Payload::Boolean(b))
    }

    /// Timestamp value.
    pub fn timestamp(ts: Timestamp) -> Self {
        Value::new(Payload::Timestamp(ts))
    }

    /// Blob value.
    pub fn blob(bytes: impl Into<Blob>) -> Self {
        Value::new(Payload::Blob(bytes.into()))
    }

    /// Key value.
    pub fn key(key: Key) -> Self {
        Value::new(Payload::Key(key))
    }

    /// Embedded entity value.
    pub fn entity(entity: FullEntity) -> Self {
        Value::new(Payload::Entity(Box::new(entity)))
    }

    /// List value. Fails if any element is itself a list.
    pub fn list(values: Vec<Value>) -> Result<Self> {
        Ok(Value::new(Payload::List(ValueList::new(values)?)))
    }

    /// Copy of this value with the index flag set.
    pub fn with_exclude_from_indexes(mut self, exclude: bool) -> Self {
        self.exclude_from_indexes = exclude;
        self
    }

    /// True if this value is left out of indexes.
    pub fn exclude_from_indexes(&self) -> bool {
        self.exclude_from_indexes
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Take the payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// The value's tag.
    pub fn kind(&self) -> ValueKind {
        self.payload.kind()
    }

    /// Tag name for error messages.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_long(&self) -> Option<i64> {
        match self.payload {
            Payload::Long(i) => Some(i),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_double(&self) -> Option<f64> {
        match self.payload {
            Payload::Double(f) => Some(f),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_boolean(&self) -> Option<bool> {
        match self.payload {
            Payload::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as timestamp
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self.payload {
            Payload::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Try to get as blob
    pub fn as_blob(&self) -> Option<&Blob> {
        match &self.payload {
            Payload::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as key
    pub fn as_key(&self) -> Option<&Key> {
        match &self.payload {
            Payload::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Try to get as embedded entity
    pub fn as_entity(&self) -> Option<&FullEntity> {
        match &self.payload {
            Payload::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Try to get as list
    pub fn as_list(&self) -> Option<&ValueList> {
        match &self.payload {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::new(payload)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::long(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::long(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::double(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::boolean(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::timestamp(ts)
    }
}

impl From<Blob> for Value {
    fn from(b: Blob) -> Self {
        Value::new(Payload::Blob(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::blob(bytes)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Value::key(key)
    }
}

impl From<FullEntity> for Value {
    fn from(entity: FullEntity) -> Self {
        Value::entity(entity)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::entity(entity.into_full())
    }
}

impl From<ValueList> for Value {
    fn from(list: ValueList) -> Self {
        Value::new(Payload::List(list))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBuilder;
    use crate::key::KeyBuilder;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    mod value_construction_tests {
        use super::*;

        #[test]
        fn test_kinds() {
            assert_eq!(Value::null().kind(), ValueKind::Null);
            assert_eq!(Value::from("a").kind(), ValueKind::String);
            assert_eq!(Value::from(1i64).kind(), ValueKind::Long);
            assert_eq!(Value::from(1.5).kind(), ValueKind::Double);
            assert_eq!(Value::from(true).kind(), ValueKind::Boolean);
            assert_eq!(Value::from(Timestamp::now()).kind(), ValueKind::Timestamp);
            assert_eq!(Value::from(vec![1u8, 2]).kind(), ValueKind::Blob);
            let key = KeyBuilder::new("p", "K").build_with_id(1).unwrap();
            assert_eq!(Value::from(key).kind(), ValueKind::Key);
            let entity = EntityBuilder::new().set("a", 1i64).build_full_entity(None);
            assert_eq!(Value::from(entity).kind(), ValueKind::Entity);
            assert_eq!(Value::list(vec![]).unwrap().kind(), ValueKind::List);
        }

        #[test]
        fn test_accessors() {
            assert_eq!(Value::from("x").as_str(), Some("x"));
            assert_eq!(Value::from(7i64).as_long(), Some(7));
            assert_eq!(Value::from(7i64).as_double(), None);
            assert_eq!(Value::from(false).as_boolean(), Some(false));
            assert!(Value::null().is_null());
            assert_eq!(Value::from(vec![9u8]).as_blob().unwrap().as_bytes(), &[9]);
        }

        #[test]
        fn test_type_name() {
            assert_eq!(Value::from(2.0).type_name(), "Double");
            assert_eq!(Value::list(vec![]).unwrap().type_name(), "List");
        }
    }

    mod list_tests {
        use super::*;

        #[test]
        fn test_nested_list_rejected() {
            let inner = Value::list(vec![Value::from(1i64)]).unwrap();
            let err = Value::list(vec![Value::from(2i64), inner]).unwrap_err();
            assert!(err.is_invalid_request());
            assert!(err.to_string().contains("Cannot contain another list"));
        }

        #[test]
        fn test_list_of_entities_accepted() {
            let e = EntityBuilder::new().set("n", 1i64).build_full_entity(None);
            let list = Value::list(vec![Value::from(e.clone()), Value::from(e)]).unwrap();
            assert_eq!(list.as_list().unwrap().len(), 2);
        }
    }

    mod value_equality_tests {
        use super::*;

        #[test]
        fn test_no_cross_kind_equality() {
            assert_ne!(Value::from(1i64), Value::from(1.0));
            assert_ne!(Value::from("a"), Value::from(vec![b'a']));
        }

        #[test]
        fn test_index_flag_participates() {
            let a = Value::from("a");
            let b = Value::from("a").with_exclude_from_indexes(true);
            assert_ne!(a, b);
            assert!(b.exclude_from_indexes());
        }

        #[test]
        fn test_double_structural_equality() {
            assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
            assert_ne!(Value::from(0.0), Value::from(-0.0));
            assert_eq!(hash_of(&Value::from(f64::NAN)), hash_of(&Value::from(f64::NAN)));
        }

        #[test]
        fn test_equal_values_hash_equal() {
            let a = Value::list(vec![Value::from("x"), Value::from(3i64)]).unwrap();
            let b = Value::list(vec![Value::from("x"), Value::from(3i64)]).unwrap();
            assert_eq!(a, b);
            assert_eq!(hash_of(&a), hash_of(&b));
        }
    }
}
