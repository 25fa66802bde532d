//! Structured query → native query translation.
//!
//! The canonical query maps onto the native builder field by field, always
//! in this order:
//!
//! 1. kind
//! 2. namespace
//! 3. limit, offset
//! 4. order-by entries, replayed in canonical sequence
//! 5. filter tree
//! 6. projection, then distinct-on
//!
//! A keys-only query becomes a projection of `__key__`. The `HasAncestor`
//! operator is rejected.

use crate::marshal::DatastoreMarshaller;
use crate::v1::{self, QueryBuilder, KEY_PROPERTY};
use canonstore_core::{
    CompositeOperator, Direction, Error, Filter, Marshaller, PropertyOperator, Result, ResultType,
    StructuredQuery,
};
use tracing::debug;

/// Translates canonical queries into `runQuery` requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatastoreQueryTranslator {
    marshaller: DatastoreMarshaller,
}

impl DatastoreQueryTranslator {
    /// Translator using the given value marshaller.
    pub fn new(marshaller: DatastoreMarshaller) -> Self {
        DatastoreQueryTranslator { marshaller }
    }

    /// Build the native request. Project and namespace default to the
    /// adapter's when the query leaves them unset.
    pub fn translate(
        &self,
        query: &StructuredQuery,
        project_id: &str,
        namespace: &str,
    ) -> Result<v1::RunQueryRequest> {
        let mut builder = QueryBuilder::new(query.project_id().unwrap_or(project_id));
        if let Some(kind) = query.kind() {
            builder = builder.kind(kind);
        }
        builder = builder.namespace(query.namespace().unwrap_or(namespace));
        if let Some(limit) = query.limit() {
            builder = builder.limit(limit);
        }
        builder = builder.offset(query.offset());
        for order in query.order_by() {
            let direction = match order.direction() {
                Direction::Ascending => v1::OrderDirection::Ascending,
                Direction::Descending => v1::OrderDirection::Descending,
            };
            builder = builder.add_order(order.property(), direction);
        }
        if let Some(filter) = query.filter() {
            builder = builder.filter(self.translate_filter(filter)?);
        }
        match query.result_type() {
            ResultType::Entity => {}
            ResultType::Key => builder = builder.projection([KEY_PROPERTY]),
            ResultType::ProjectionEntity => {
                builder = builder
                    .projection(query.projection().iter().cloned())
                    .distinct_on(query.distinct_on().iter().cloned());
            }
        }

        debug!(
            "translated {:?} query on kind {:?} with {} sort keys",
            query.result_type(),
            query.kind(),
            query.order_by().len()
        );
        Ok(builder.build())
    }

    /// Translate one filter tree node, recursing through composites.
    pub fn translate_filter(&self, filter: &Filter) -> Result<v1::Filter> {
        match filter {
            Filter::Composite(composite) => {
                let op = match composite.operator() {
                    CompositeOperator::And => v1::CompositeOperator::And,
                };
                let filters = composite
                    .filters()
                    .iter()
                    .map(|child| self.translate_filter(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(v1::Filter::CompositeFilter(v1::CompositeFilter { op, filters }))
            }
            Filter::Property(property) => {
                let op = match property.operator() {
                    PropertyOperator::LessThan => v1::PropertyOperator::LessThan,
                    PropertyOperator::LessThanOrEqual => v1::PropertyOperator::LessThanOrEqual,
                    PropertyOperator::GreaterThan => v1::PropertyOperator::GreaterThan,
                    PropertyOperator::GreaterThanOrEqual => {
                        v1::PropertyOperator::GreaterThanOrEqual
                    }
                    PropertyOperator::Equal => v1::PropertyOperator::Equal,
                    PropertyOperator::HasAncestor => {
                        return Err(Error::invalid_request(format!(
                            "Unsupported filter operator {}",
                            property.operator().name()
                        )))
                    }
                };
                Ok(v1::Filter::PropertyFilter(v1::PropertyFilter {
                    property: v1::PropertyReference::new(property.property()),
                    op,
                    value: self.marshaller.convert_value(property.value())?,
                }))
            }
        }
    }
}
