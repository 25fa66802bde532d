//! Native resource types of the hierarchical-key store.
//!
//! These mirror the store's v1 JSON resources field for field, so a request
//! built here serializes to exactly what the service expects:
//!
//! - 64-bit integers (`integerValue`, key ids) travel as decimal strings
//! - `timestampValue` is RFC 3339 with nanosecond precision
//! - `blobValue` is standard base64
//! - a value is an object with exactly one `*Value` member plus an optional
//!   `excludeFromIndexes`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

// =============================================================================
// Keys
// =============================================================================

/// Project and namespace a key or query is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionId {
    /// Project id
    pub project_id: String,
    /// Namespace, empty for the default namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_id: String,
}

/// One key path element. At most one of `id` / `name` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    /// Kind
    pub kind: String,
    /// Numeric id
    #[serde(default, with = "opt_int64", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A key; complete or not depending on its last path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// Partition
    pub partition_id: PartitionId,
    /// Ancestors then leaf
    pub path: Vec<PathElement>,
}

impl Key {
    /// True if the leaf has an id or a name.
    pub fn is_complete(&self) -> bool {
        self.path
            .last()
            .map(|leaf| leaf.id.is_some() || leaf.name.is_some())
            .unwrap_or(false)
    }

    /// Leaf kind, if the path is non-empty.
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|leaf| leaf.kind.as_str())
    }
}

// =============================================================================
// Entities and values
// =============================================================================

/// An entity: optional key plus properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Key, absent for keyless embedded entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    /// Properties by name
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Leave this value out of indexes
    #[serde(default, skip_serializing_if = "is_false")]
    pub exclude_from_indexes: bool,
    /// The typed payload
    #[serde(flatten)]
    pub value_type: ValueType,
}

impl Value {
    /// Indexed value.
    pub fn new(value_type: ValueType) -> Self {
        Value {
            exclude_from_indexes: false,
            value_type,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Typed payload of a [`Value`]; exactly one member on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// `null`
    NullValue(()),
    /// Boolean
    BooleanValue(bool),
    /// 64-bit integer as a decimal string
    IntegerValue(#[serde(with = "int64")] i64),
    /// Double
    DoubleValue(f64),
    /// RFC 3339 timestamp
    TimestampValue(String),
    /// Key
    KeyValue(Key),
    /// UTF-8 string
    StringValue(String),
    /// Standard base64 bytes
    BlobValue(String),
    /// Embedded entity
    EntityValue(Entity),
    /// Array of non-array values
    ArrayValue(ArrayValue),
    /// Geographic point
    GeoPointValue(LatLng),
}

impl ValueType {
    /// Wire member name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::NullValue(_) => "nullValue",
            ValueType::BooleanValue(_) => "booleanValue",
            ValueType::IntegerValue(_) => "integerValue",
            ValueType::DoubleValue(_) => "doubleValue",
            ValueType::TimestampValue(_) => "timestampValue",
            ValueType::KeyValue(_) => "keyValue",
            ValueType::StringValue(_) => "stringValue",
            ValueType::BlobValue(_) => "blobValue",
            ValueType::EntityValue(_) => "entityValue",
            ValueType::ArrayValue(_) => "arrayValue",
            ValueType::GeoPointValue(_) => "geoPointValue",
        }
    }
}

/// Array payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    /// Elements
    #[serde(default)]
    pub values: Vec<Value>,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Degrees latitude
    pub latitude: f64,
    /// Degrees longitude
    pub longitude: f64,
}

// =============================================================================
// Queries
// =============================================================================

/// Reference to a property by name. `__key__` names the entity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyReference {
    /// Property name
    pub name: String,
}

impl PropertyReference {
    /// Reference `name`.
    pub fn new(name: impl Into<String>) -> Self {
        PropertyReference { name: name.into() }
    }
}

/// Kind to query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindExpression {
    /// Kind name
    pub name: String,
}

/// One projected property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projection {
    /// Projected property
    pub property: PropertyReference,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyOrder {
    /// Sorted property
    pub property: PropertyReference,
    /// Direction
    pub direction: OrderDirection,
}

/// Property comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyOperator {
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equal,
}

/// Composite operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOperator {
    /// All children match
    And,
}

/// A property comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    /// Compared property
    pub property: PropertyReference,
    /// Operator
    pub op: PropertyOperator,
    /// Literal operand
    pub value: Value,
}

/// A combination of filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeFilter {
    /// Operator
    pub op: CompositeOperator,
    /// Children
    pub filters: Vec<Filter>,
}

/// A filter tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    /// Composite node
    CompositeFilter(CompositeFilter),
    /// Leaf comparison
    PropertyFilter(PropertyFilter),
}

/// A structured query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Projected properties; empty returns whole entities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projection: Vec<Projection>,
    /// Kinds (at most one)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kind: Vec<KindExpression>,
    /// Filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Sort keys in precedence order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<PropertyOrder>,
    /// Distinct-on properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distinct_on: Vec<PropertyReference>,
    /// Rows to skip
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u32,
    /// Maximum rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Query {
    /// True if this is a keys-only query.
    pub fn is_keys_only(&self) -> bool {
        self.projection.len() == 1 && self.projection[0].property.name == KEY_PROPERTY
    }
}

/// Reserved property name for the entity key.
pub const KEY_PROPERTY: &str = "__key__";

/// A `runQuery` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    /// Partition to query
    pub partition_id: PartitionId,
    /// The query
    pub query: Query,
}

/// Builder for [`RunQueryRequest`]. Sort keys apply in call order.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    partition_id: PartitionId,
    query: Query,
}

impl QueryBuilder {
    /// Query in `project_id`, default namespace.
    pub fn new(project_id: impl Into<String>) -> Self {
        QueryBuilder {
            partition_id: PartitionId {
                project_id: project_id.into(),
                namespace_id: String::new(),
            },
            query: Query::default(),
        }
    }

    /// Set the kind.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.query.kind = vec![KindExpression { name: kind.into() }];
        self
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.partition_id.namespace_id = namespace.into();
        self
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u32) -> Self {
        self.query.offset = offset;
        self
    }

    /// Append a sort key.
    pub fn add_order(mut self, property: impl Into<String>, direction: OrderDirection) -> Self {
        self.query.order.push(PropertyOrder {
            property: PropertyReference::new(property),
            direction,
        });
        self
    }

    /// Set the filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Append projected properties.
    pub fn projection<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.projection.extend(properties.into_iter().map(|p| Projection {
            property: PropertyReference::new(p),
        }));
        self
    }

    /// Append distinct-on properties.
    pub fn distinct_on<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .distinct_on
            .extend(properties.into_iter().map(PropertyReference::new));
        self
    }

    /// Finish the request.
    pub fn build(self) -> RunQueryRequest {
        RunQueryRequest {
            partition_id: self.partition_id,
            query: self.query,
        }
    }
}

// =============================================================================
// int64-as-string helpers
// =============================================================================

mod int64 {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

mod opt_int64 {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => text.parse().map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
