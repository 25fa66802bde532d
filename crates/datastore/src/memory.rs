//! In-memory hierarchical-key store.
//!
//! [`MemoryDatastore`] implements [`DatastoreClient`] over a sorted map so the
//! adapter, translator and cursor run end to end without a service. It
//! follows the service's observable rules:
//!
//! - `put` is atomic: the batch is validated and staged before any write
//! - incomplete leaf keys get an allocated id
//! - indexed strings and blobs longer than 1500 bytes are rejected
//! - unindexed values never match filters or sort keys
//! - a filter on an array property matches if any element matches
//! - range and equality filters only match values of the same type class
//! - projecting an array property yields one row per element
//! - entities missing an ordered or projected property are left out
//!
//! ## Type Ordering
//!
//! null < boolean < number < timestamp < string < blob < key < geo point
//! < array < entity. Integers and doubles compare numerically together.

use crate::client::{DatastoreClient, EntityCursor};
use crate::v1::{self, ValueType, KEY_PROPERTY};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use canonstore_core::{Error, Result, Timestamp};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Longest indexed string or blob, in bytes.
pub const MAX_INDEXED_BYTES: usize = 1500;

/// Errors raised by [`MemoryDatastore`]; surfaced as backend errors.
#[derive(Debug, Error)]
pub enum MemoryDatastoreError {
    /// Entity written without a key
    #[error("entity has no key")]
    MissingKey,

    /// Key has an empty path or an element without a kind
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Key (or one of its ancestors) lacks an id or name where one is required
    #[error("incomplete key for kind {0}")]
    IncompleteKey(String),

    /// Indexed value over the size limit
    #[error("indexed property {property} is {len} bytes, limit is 1500")]
    IndexedValueTooLong {
        /// Property name
        property: String,
        /// Actual size
        len: usize,
    },

    /// Query shape the store does not execute
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

// =============================================================================
// Storage keys
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IdOrName {
    Id(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StorageKey {
    project: String,
    namespace: String,
    path: Vec<(String, Option<IdOrName>)>,
}

impl StorageKey {
    fn kind(&self) -> &str {
        self.path.last().map(|(kind, _)| kind.as_str()).unwrap_or("")
    }
}

fn lenient_key(key: &v1::Key) -> StorageKey {
    StorageKey {
        project: key.partition_id.project_id.clone(),
        namespace: key.partition_id.namespace_id.clone(),
        path: key
            .path
            .iter()
            .map(|e| {
                let id_or_name = match (e.id, &e.name) {
                    (Some(id), _) => Some(IdOrName::Id(id)),
                    (None, Some(name)) => Some(IdOrName::Name(name.clone())),
                    (None, None) => None,
                };
                (e.kind.clone(), id_or_name)
            })
            .collect(),
    }
}

fn storage_key(key: &v1::Key) -> std::result::Result<StorageKey, MemoryDatastoreError> {
    validate_path(key)?;
    if !key.is_complete() {
        return Err(MemoryDatastoreError::IncompleteKey(
            key.kind().unwrap_or_default().to_string(),
        ));
    }
    Ok(lenient_key(key))
}

fn validate_path(key: &v1::Key) -> std::result::Result<(), MemoryDatastoreError> {
    if key.path.is_empty() {
        return Err(MemoryDatastoreError::MalformedKey("empty path".into()));
    }
    if key.path.iter().any(|e| e.kind.is_empty()) {
        return Err(MemoryDatastoreError::MalformedKey("empty kind".into()));
    }
    let ancestors = &key.path[..key.path.len() - 1];
    if let Some(e) = ancestors.iter().find(|e| e.id.is_none() && e.name.is_none()) {
        return Err(MemoryDatastoreError::IncompleteKey(e.kind.clone()));
    }
    Ok(())
}

fn validate_sizes(
    property: &str,
    value: &v1::Value,
) -> std::result::Result<(), MemoryDatastoreError> {
    let len = match &value.value_type {
        ValueType::StringValue(s) if !value.exclude_from_indexes => s.len(),
        ValueType::BlobValue(b) if !value.exclude_from_indexes => b.len() / 4 * 3,
        ValueType::ArrayValue(array) => {
            for element in &array.values {
                validate_sizes(property, element)?;
            }
            0
        }
        _ => 0,
    };
    if len > MAX_INDEXED_BYTES {
        return Err(MemoryDatastoreError::IndexedValueTooLong {
            property: property.to_string(),
            len,
        });
    }
    Ok(())
}

// =============================================================================
// MemoryDatastore
// =============================================================================

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<StorageKey, v1::Entity>,
    next_id: i64,
}

/// In-memory [`DatastoreClient`].
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    inner: RwLock<Inner>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryDatastore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities across all partitions.
    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursors issued and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(AtomicOrdering::SeqCst)
    }
}

impl DatastoreClient for MemoryDatastore {
    fn put(&self, entities: Vec<v1::Entity>) -> Result<Vec<v1::Entity>> {
        let mut inner = self.inner.write();
        let mut staged = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let key = entity
                .key
                .as_mut()
                .ok_or_else(|| Error::backend(MemoryDatastoreError::MissingKey))?;
            validate_path(key).map_err(Error::backend)?;
            for (name, value) in &entity.properties {
                validate_sizes(name, value).map_err(Error::backend)?;
            }
            if !key.is_complete() {
                inner.next_id += 1;
                if let Some(leaf) = key.path.last_mut() {
                    leaf.id = Some(inner.next_id);
                }
            }
            let storage = storage_key(key).map_err(Error::backend)?;
            staged.push((storage, entity));
        }

        debug!("memory datastore: writing {} entities", staged.len());
        let mut stored = Vec::with_capacity(staged.len());
        for (storage, entity) in staged {
            inner.entities.insert(storage, entity.clone());
            stored.push(entity);
        }
        Ok(stored)
    }

    fn get(&self, key: &v1::Key) -> Result<Option<v1::Entity>> {
        let storage = storage_key(key).map_err(Error::backend)?;
        Ok(self.inner.read().entities.get(&storage).cloned())
    }

    fn delete(&self, keys: Vec<v1::Key>) -> Result<()> {
        let storage = keys
            .iter()
            .map(storage_key)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::backend)?;
        let mut inner = self.inner.write();
        for key in &storage {
            inner.entities.remove(key);
        }
        Ok(())
    }

    fn run_query(&self, request: &v1::RunQueryRequest) -> Result<Box<dyn EntityCursor>> {
        let rows = {
            let inner = self.inner.read();
            execute(&inner, request).map_err(Error::backend)?
        };
        debug!("memory datastore: query produced {} rows", rows.len());
        self.open_cursors.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemoryCursor {
            rows: rows.into_iter(),
            open_cursors: Arc::clone(&self.open_cursors),
            closed: false,
        }))
    }
}

struct MemoryCursor {
    rows: std::vec::IntoIter<v1::Entity>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

impl EntityCursor for MemoryCursor {
    fn next_entity(&mut self) -> Result<Option<v1::Entity>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

// =============================================================================
// Query execution
// =============================================================================

fn execute(
    inner: &Inner,
    request: &v1::RunQueryRequest,
) -> std::result::Result<Vec<v1::Entity>, MemoryDatastoreError> {
    let query = &request.query;
    if query.kind.len() > 1 {
        return Err(MemoryDatastoreError::UnsupportedQuery(
            "more than one kind".into(),
        ));
    }
    let kind = query.kind.first().map(|k| k.name.as_str());
    let partition = &request.partition_id;

    let matching = inner
        .entities
        .iter()
        .filter(|(key, _)| {
            key.project == partition.project_id
                && key.namespace == partition.namespace_id
                && kind.map_or(true, |kind| key.kind() == kind)
        })
        .map(|(_, entity)| entity)
        .filter(|entity| {
            query
                .filter
                .as_ref()
                .map_or(true, |filter| matches_filter(filter, entity))
        });

    let keys_only = query.is_keys_only();
    let mut rows: Vec<Row<'_>> = if query.projection.is_empty() || keys_only {
        matching
            .map(|entity| Row {
                out: entity.clone(),
                source: entity,
            })
            .collect()
    } else {
        let names: Vec<&str> = query
            .projection
            .iter()
            .map(|p| p.property.name.as_str())
            .collect();
        matching
            .flat_map(|entity| {
                project(entity, &names)
                    .into_iter()
                    .map(move |out| Row { out, source: entity })
            })
            .collect()
    };

    for order in &query.order {
        rows.retain(|row| sort_value(row, &order.property.name, order.direction).is_some());
    }
    rows.sort_by(|a, b| compare_rows(a, b, &query.order));

    if !query.distinct_on.is_empty() {
        let mut seen: Vec<Vec<Option<v1::Value>>> = Vec::new();
        rows.retain(|row| {
            let group: Vec<Option<v1::Value>> = query
                .distinct_on
                .iter()
                .map(|p| row.value(&p.name))
                .collect();
            if seen.contains(&group) {
                false
            } else {
                seen.push(group);
                true
            }
        });
    }

    let limit = query.limit.map_or(usize::MAX, |l| l as usize);
    let rows = rows
        .into_iter()
        .skip(query.offset as usize)
        .take(limit)
        .map(|row| {
            if keys_only {
                v1::Entity {
                    key: row.out.key,
                    properties: BTreeMap::new(),
                }
            } else {
                row.out
            }
        })
        .collect();
    Ok(rows)
}

/// A result row plus the stored entity it came from. Sorting and grouping
/// read projected values from the row and everything else from the source.
struct Row<'a> {
    out: v1::Entity,
    source: &'a v1::Entity,
}

impl Row<'_> {
    fn holder(&self, property: &str) -> &v1::Entity {
        if self.out.properties.contains_key(property) {
            &self.out
        } else {
            self.source
        }
    }

    fn value(&self, property: &str) -> Option<v1::Value> {
        self.holder(property).properties.get(property).cloned()
    }
}

/// Indexed values a property contributes to filters: the value itself, or
/// each element of an array.
fn indexed_values(entity: &v1::Entity, property: &str) -> Vec<v1::Value> {
    if property == KEY_PROPERTY {
        return entity
            .key
            .iter()
            .map(|key| v1::Value::new(ValueType::KeyValue(key.clone())))
            .collect();
    }
    match entity.properties.get(property) {
        None => Vec::new(),
        Some(value) => match &value.value_type {
            ValueType::ArrayValue(array) => array
                .values
                .iter()
                .filter(|v| !v.exclude_from_indexes)
                .cloned()
                .collect(),
            _ if value.exclude_from_indexes => Vec::new(),
            _ => vec![value.clone()],
        },
    }
}

fn matches_filter(filter: &v1::Filter, entity: &v1::Entity) -> bool {
    match filter {
        v1::Filter::CompositeFilter(composite) => match composite.op {
            v1::CompositeOperator::And => composite
                .filters
                .iter()
                .all(|child| matches_filter(child, entity)),
        },
        v1::Filter::PropertyFilter(property) => indexed_values(entity, &property.property.name)
            .iter()
            .any(|value| {
                let ordering = match compare_same_class(value, &property.value) {
                    Some(ordering) => ordering,
                    None => return false,
                };
                match property.op {
                    v1::PropertyOperator::LessThan => ordering == Ordering::Less,
                    v1::PropertyOperator::LessThanOrEqual => ordering != Ordering::Greater,
                    v1::PropertyOperator::GreaterThan => ordering == Ordering::Greater,
                    v1::PropertyOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                    v1::PropertyOperator::Equal => ordering == Ordering::Equal,
                }
            }),
    }
}

/// One row per combination of projected values; arrays expand per element.
fn project(entity: &v1::Entity, names: &[&str]) -> Vec<v1::Entity> {
    let mut rows = vec![v1::Entity {
        key: entity.key.clone(),
        properties: BTreeMap::new(),
    }];
    for name in names {
        let values = indexed_values(entity, name);
        if values.is_empty() {
            return Vec::new();
        }
        rows = rows
            .into_iter()
            .flat_map(|row| {
                values.iter().map(move |value| {
                    let mut row = row.clone();
                    row.properties.insert(name.to_string(), value.clone());
                    row
                })
            })
            .collect();
    }
    rows
}

/// Value a row sorts by: smallest element ascending, largest descending.
fn sort_value(row: &Row<'_>, property: &str, direction: v1::OrderDirection) -> Option<v1::Value> {
    let values = indexed_values(row.holder(property), property).into_iter();
    match direction {
        v1::OrderDirection::Ascending => values.min_by(compare_total),
        v1::OrderDirection::Descending => values.max_by(compare_total),
    }
}

fn compare_rows(a: &Row<'_>, b: &Row<'_>, order: &[v1::PropertyOrder]) -> Ordering {
    for o in order {
        let left = sort_value(a, &o.property.name, o.direction);
        let right = sort_value(b, &o.property.name, o.direction);
        let ordering = match (left, right) {
            (Some(l), Some(r)) => compare_total(&l, &r),
            (l, r) => l.is_some().cmp(&r.is_some()),
        };
        let ordering = match o.direction {
            v1::OrderDirection::Ascending => ordering,
            v1::OrderDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let left = a.source.key.as_ref().map(lenient_key);
    let right = b.source.key.as_ref().map(lenient_key);
    left.cmp(&right)
}

fn type_class(value: &ValueType) -> u8 {
    match value {
        ValueType::NullValue(_) => 0,
        ValueType::BooleanValue(_) => 1,
        ValueType::IntegerValue(_) | ValueType::DoubleValue(_) => 2,
        ValueType::TimestampValue(_) => 3,
        ValueType::StringValue(_) => 4,
        ValueType::BlobValue(_) => 5,
        ValueType::KeyValue(_) => 6,
        ValueType::GeoPointValue(_) => 7,
        ValueType::ArrayValue(_) => 8,
        ValueType::EntityValue(_) => 9,
    }
}

fn compare_total(a: &v1::Value, b: &v1::Value) -> Ordering {
    let (ca, cb) = (type_class(&a.value_type), type_class(&b.value_type));
    if ca != cb {
        return ca.cmp(&cb);
    }
    compare_same_class(a, b).unwrap_or(Ordering::Equal)
}

/// Compare two values of the same type class; `None` across classes or for
/// values with no order.
fn compare_same_class(a: &v1::Value, b: &v1::Value) -> Option<Ordering> {
    use ValueType::*;
    match (&a.value_type, &b.value_type) {
        (NullValue(_), NullValue(_)) => Some(Ordering::Equal),
        (BooleanValue(x), BooleanValue(y)) => Some(x.cmp(y)),
        (IntegerValue(x), IntegerValue(y)) => Some(x.cmp(y)),
        (IntegerValue(x), DoubleValue(y)) => (*x as f64).partial_cmp(y),
        (DoubleValue(x), IntegerValue(y)) => x.partial_cmp(&(*y as f64)),
        (DoubleValue(x), DoubleValue(y)) => x.partial_cmp(y),
        (TimestampValue(x), TimestampValue(y)) => match (Timestamp::parse(x), Timestamp::parse(y)) {
            (Ok(x), Ok(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (StringValue(x), StringValue(y)) => Some(x.cmp(y)),
        (BlobValue(x), BlobValue(y)) => match (STANDARD.decode(x), STANDARD.decode(y)) {
            (Ok(x), Ok(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (KeyValue(x), KeyValue(y)) => Some(lenient_key(x).cmp(&lenient_key(y))),
        (x, y) if type_class(x) == type_class(y) && x == y => Some(Ordering::Equal),
        _ => None,
    }
}
