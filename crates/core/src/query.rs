//! Structured queries
//!
//! A [`Query<T>`] is a backend-agnostic description of a query over one
//! kind: filter tree, ordering, projection, distinct-on, offset and limit.
//! The type parameter fixes the row shape the cursor yields:
//!
//! | Builder | Yields |
//! |---------|--------|
//! | [`Query::entity_query_builder`] | [`Entity`] |
//! | [`Query::key_query_builder`] | [`Key`] |
//! | [`Query::projection_entity_query_builder`] | [`ProjectionEntity`] |
//!
//! Filters compose with AND only. The `HasAncestor` operator is part of the
//! operator set but no backend accepts it; translators reject it.

use crate::entity::{Entity, ProjectionEntity};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

// =============================================================================
// Result type, ordering, operators
// =============================================================================

/// Row shape a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    /// Full entities
    Entity,
    /// Keys only
    Key,
    /// Projected properties
    ProjectionEntity,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    property: String,
    direction: Direction,
}

impl OrderBy {
    /// Ascending on `property`.
    pub fn asc(property: impl Into<String>) -> Self {
        OrderBy {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    /// Descending on `property`.
    pub fn desc(property: impl Into<String>) -> Self {
        OrderBy {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    /// Sorted property.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Sort direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Comparison operator of a [`PropertyFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
    /// Key is a descendant of the given key. Not supported by any backend.
    HasAncestor,
}

impl PropertyOperator {
    /// Operator name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyOperator::LessThan => "LESS_THAN",
            PropertyOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            PropertyOperator::GreaterThan => "GREATER_THAN",
            PropertyOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            PropertyOperator::Equal => "EQUAL",
            PropertyOperator::HasAncestor => "HAS_ANCESTOR",
        }
    }
}

/// Operator combining the children of a [`CompositeFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeOperator {
    /// Every child must match
    And,
}

// =============================================================================
// Filters
// =============================================================================

/// Compare one property against a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyFilter {
    property: String,
    operator: PropertyOperator,
    value: Value,
}

impl PropertyFilter {
    fn new(property: impl Into<String>, operator: PropertyOperator, value: Value) -> Self {
        PropertyFilter {
            property: property.into(),
            operator,
            value,
        }
    }

    /// `property < value`
    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, PropertyOperator::LessThan, value.into())
    }

    /// `property <= value`
    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, PropertyOperator::LessThanOrEqual, value.into())
    }

    /// `property > value`
    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, PropertyOperator::GreaterThan, value.into())
    }

    /// `property >= value`
    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, PropertyOperator::GreaterThanOrEqual, value.into())
    }

    /// `property == value`
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, PropertyOperator::Equal, value.into())
    }

    /// `property == null`
    pub fn is_null(property: impl Into<String>) -> Self {
        Self::new(property, PropertyOperator::Equal, Value::null())
    }

    /// Entity key descends from `key`.
    pub fn has_ancestor(key: Key) -> Self {
        Self::new("__key__", PropertyOperator::HasAncestor, Value::key(key))
    }

    /// Filtered property.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Comparison operator.
    pub fn operator(&self) -> PropertyOperator {
        self.operator
    }

    /// Literal operand.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Combine child filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeFilter {
    operator: CompositeOperator,
    filters: Vec<Filter>,
}

impl CompositeFilter {
    /// AND of at least one filter.
    pub fn and(first: impl Into<Filter>, rest: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters = vec![first.into()];
        filters.extend(rest);
        CompositeFilter {
            operator: CompositeOperator::And,
            filters,
        }
    }

    /// Combining operator.
    pub fn operator(&self) -> CompositeOperator {
        self.operator
    }

    /// Children, never empty.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

/// A filter tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Combination of child filters
    Composite(CompositeFilter),
    /// Single property comparison
    Property(PropertyFilter),
}

impl From<PropertyFilter> for Filter {
    fn from(filter: PropertyFilter) -> Self {
        Filter::Property(filter)
    }
}

impl From<CompositeFilter> for Filter {
    fn from(filter: CompositeFilter) -> Self {
        Filter::Composite(filter)
    }
}

// =============================================================================
// StructuredQuery
// =============================================================================

/// The untyped body of a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuredQuery {
    result_type: ResultType,
    project_id: Option<String>,
    namespace: Option<String>,
    kind: Option<String>,
    projection: Vec<String>,
    filter: Option<Filter>,
    distinct_on: Vec<String>,
    order_by: Vec<OrderBy>,
    offset: u32,
    limit: Option<u32>,
}

impl StructuredQuery {
    fn new(result_type: ResultType) -> Self {
        StructuredQuery {
            result_type,
            project_id: None,
            namespace: None,
            kind: None,
            projection: Vec::new(),
            filter: None,
            distinct_on: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Declared row shape.
    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    /// Project override, if set.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Namespace override, if set.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Queried kind, if set.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Projected properties.
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    /// Filter tree, if any.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Distinct-on properties.
    pub fn distinct_on(&self) -> &[String] {
        &self.distinct_on
    }

    /// Sort keys in precedence order.
    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Rows to skip.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Maximum rows, if limited.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

// =============================================================================
// Typed query and builder
// =============================================================================

/// A structured query whose rows are of type `T`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query<T> {
    inner: StructuredQuery,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    /// The untyped query body.
    pub fn structured(&self) -> &StructuredQuery {
        &self.inner
    }

    /// Declared row shape.
    pub fn result_type(&self) -> ResultType {
        self.inner.result_type
    }
}

impl Query<Entity> {
    /// Builder for a query returning full entities.
    pub fn entity_query_builder() -> QueryBuilder<Entity> {
        QueryBuilder::new(ResultType::Entity)
    }
}

impl Query<Key> {
    /// Builder for a keys-only query.
    pub fn key_query_builder() -> QueryBuilder<Key> {
        QueryBuilder::new(ResultType::Key)
    }
}

impl Query<ProjectionEntity> {
    /// Builder for a projection query.
    pub fn projection_entity_query_builder() -> QueryBuilder<ProjectionEntity> {
        QueryBuilder::new(ResultType::ProjectionEntity)
    }
}

/// Builder for [`Query`].
///
/// ```
/// use canonstore_core::{Key, OrderBy, PropertyFilter, Query};
///
/// let query = Query::key_query_builder()
///     .kind("Task")
///     .filter(PropertyFilter::ge("num", 0i64))
///     .order_by(OrderBy::desc("num"))
///     .limit(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(query.structured().kind(), Some("Task"));
/// assert_eq!(query.structured().order_by().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<T> {
    query: StructuredQuery,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryBuilder<T> {
    fn new(result_type: ResultType) -> Self {
        QueryBuilder {
            query: StructuredQuery::new(result_type),
            _marker: PhantomData,
        }
    }

    /// Query a project other than the store's.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.query.project_id = Some(project_id.into());
        self
    }

    /// Query a namespace other than the store's.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.query.namespace = Some(namespace.into());
        self
    }

    /// Kind to query.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.query.kind = Some(kind.into());
        self
    }

    /// Replace the filter.
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.query.filter = Some(filter.into());
        self
    }

    /// Append a sort key; earlier keys take precedence.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.query.order_by.push(order);
        self
    }

    /// Drop every sort key set so far.
    pub fn clear_order_by(mut self) -> Self {
        self.query.order_by.clear();
        self
    }

    /// Skip the first `offset` rows.
    pub fn offset(mut self, offset: u32) -> Self {
        self.query.offset = offset;
        self
    }

    /// Return at most `limit` rows. Must be positive.
    pub fn limit(mut self, limit: u32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Validate and finish.
    ///
    /// Every distinct-on property must also be projected.
    pub fn build(self) -> Result<Query<T>> {
        if self.query.limit == Some(0) {
            return Err(Error::invalid_request("Query limit must be positive"));
        }
        if let Some(name) = self
            .query
            .distinct_on
            .iter()
            .find(|name| !self.query.projection.contains(*name))
        {
            return Err(Error::invalid_request(format!(
                "Distinct-on property {} must be projected",
                name
            )));
        }
        Ok(Query {
            inner: self.query,
            _marker: PhantomData,
        })
    }
}

impl QueryBuilder<ProjectionEntity> {
    /// Append projected properties.
    pub fn projection<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .projection
            .extend(properties.into_iter().map(Into::into));
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
            .extend(properties.into_iter().map(Into::into));
        self
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One unmarshalled row, before it is narrowed to the query's row type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRow {
    /// Full entity row
    Entity(Entity),
    /// Keys-only row
    Key(Key),
    /// Projection row
    Projection(ProjectionEntity),
}

impl QueryRow {
    fn shape(&self) -> &'static str {
        match self {
            QueryRow::Entity(_) => "Entity",
            QueryRow::Key(_) => "Key",
            QueryRow::Projection(_) => "ProjectionEntity",
        }
    }
}

/// Row types a [`Query`] can yield.
pub trait QueryResultKind: Sized {
    /// Result type tag backends use to pick the row shape.
    const RESULT_TYPE: ResultType;

    /// Narrow a row; a row of another shape is an error.
    fn from_row(row: QueryRow) -> Result<Self>;
}

fn mismatch(expected: ResultType, row: &QueryRow) -> Error {
    Error::invalid_request(format!(
        "Unexpected {} row for {:?} query",
        row.shape(),
        expected
    ))
}

impl QueryResultKind for Entity {
    const RESULT_TYPE: ResultType = ResultType::Entity;

    fn from_row(row: QueryRow) -> Result<Self> {
        match row {
            QueryRow::Entity(entity) => Ok(entity),
            other => Err(mismatch(Self::RESULT_TYPE, &other)),
        }
    }
}

impl QueryResultKind for Key {
    const RESULT_TYPE: ResultType = ResultType::Key;

    fn from_row(row: QueryRow) -> Result<Self> {
        match row {
            QueryRow::Key(key) => Ok(key),
            other => Err(mismatch(Self::RESULT_TYPE, &other)),
        }
    }
}

impl QueryResultKind for ProjectionEntity {
    const RESULT_TYPE: ResultType = ResultType::ProjectionEntity;

    fn from_row(row: QueryRow) -> Result<Self> {
        match row {
            QueryRow::Projection(entity) => Ok(entity),
            other => Err(mismatch(Self::RESULT_TYPE, &other)),
        }
    }
}
