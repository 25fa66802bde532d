//! Structured query → document store request translation.
//!
//! ## Find Path
//!
//! A query without distinct-on becomes a single [`FindRequest`]:
//!
//! | Canonical | Native |
//! |-----------|--------|
//! | AND | `{"$and": [...]}` |
//! | `=` `<` `<=` `>` `>=` | `$eq` `$lt` `$lte` `$gt` `$gte` |
//! | `= null` | `{"$eq": null}` |
//! | any other operator on null | `{"$ne": null}` |
//! | order-by | sort document, `1` / `-1`, in sequence |
//! | projection | inclusion document, always with `__key__` |
//!
//! ## Distinct Path
//!
//! Distinct-on becomes a six-stage aggregation pipeline:
//!
//! ```text
//! $match  filter
//! $match  every distinct field $ne null
//! $sort   order-by, then _id ascending
//! $project __key__ + projection + distinct fields
//! $group  _id: {f: "$f", ...}, result: {$first: "$$ROOT"}
//! $project _id: 0, f: "$result.f", ...
//! ```
//!
//! followed by `$skip` / `$limit` when the query sets them.

use crate::client::FindRequest;
use crate::marshal::{DocumentMarshaller, ID_FIELD, KEY_FIELD};
use bson::{doc, Bson, Document};
use canonstore_core::{
    CompositeOperator, Direction, Error, Filter, Marshaller, OrderBy, PropertyOperator, Result,
    ResultType, StructuredQuery,
};
use tracing::debug;

/// Native form of a translated query.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    /// Plain `find`.
    Find(FindRequest),
    /// Aggregation pipeline.
    Aggregate(Vec<Document>),
}

/// A translated query and the kind whose collection it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    /// Kind naming the collection.
    pub kind: String,
    /// Request to issue against that collection.
    pub native: NativeQuery,
}

/// Translates canonical queries into document store requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentQueryTranslator {
    marshaller: DocumentMarshaller,
}

impl DocumentQueryTranslator {
    /// Translator using the given value marshaller.
    pub fn new(marshaller: DocumentMarshaller) -> Self {
        DocumentQueryTranslator { marshaller }
    }

    /// Translate a query; kindless queries are rejected.
    pub fn translate(&self, query: &StructuredQuery) -> Result<TranslatedQuery> {
        let kind = query
            .kind()
            .ok_or_else(|| Error::invalid_request("Query has no kind; cannot pick a collection"))?
            .to_string();
        let filter = match query.filter() {
            Some(filter) => self.translate_filter(filter)?,
            None => Document::new(),
        };

        let native = if query.distinct_on().is_empty() {
            debug!("translated {:?} query on {} to find", query.result_type(), kind);
            NativeQuery::Find(self.find_request(query, filter))
        } else {
            debug!(
                "translated {:?} query on {} to pipeline, distinct on {:?}",
                query.result_type(),
                kind,
                query.distinct_on()
            );
            NativeQuery::Aggregate(self.pipeline(query, filter))
        };
        Ok(TranslatedQuery { kind, native })
    }

    /// Translate one filter tree node, recursing through composites.
    pub fn translate_filter(&self, filter: &Filter) -> Result<Document> {
        match filter {
            Filter::Composite(composite) => {
                let op = match composite.operator() {
                    CompositeOperator::And => "$and",
                };
                let children = composite
                    .filters()
                    .iter()
                    .map(|child| self.translate_filter(child).map(Bson::Document))
                    .collect::<Result<Vec<_>>>()?;
                let mut document = Document::new();
                document.insert(op, children);
                Ok(document)
            }
            Filter::Property(property) => {
                let condition = if property.value().is_null() {
                    match property.operator() {
                        PropertyOperator::Equal => doc! { "$eq": Bson::Null },
                        _ => doc! { "$ne": Bson::Null },
                    }
                } else {
                    let op = match property.operator() {
                        PropertyOperator::Equal => "$eq",
                        PropertyOperator::LessThan => "$lt",
                        PropertyOperator::LessThanOrEqual => "$lte",
                        PropertyOperator::GreaterThan => "$gt",
                        PropertyOperator::GreaterThanOrEqual => "$gte",
                        PropertyOperator::HasAncestor => {
                            return Err(Error::invalid_request(format!(
                                "Unsupported filter operator {}",
                                property.operator().name()
                            )))
                        }
                    };
                    let mut condition = Document::new();
                    condition.insert(op, self.marshaller.convert_value(property.value())?);
                    condition
                };
                let mut document = Document::new();
                document.insert(property.property(), condition);
                Ok(document)
            }
        }
    }

    fn find_request(&self, query: &StructuredQuery, filter: Document) -> FindRequest {
        let projection = match query.result_type() {
            ResultType::Entity => None,
            ResultType::Key => Some(doc! { KEY_FIELD: 1 }),
            ResultType::ProjectionEntity if query.projection().is_empty() => None,
            ResultType::ProjectionEntity => {
                let mut projection = doc! { KEY_FIELD: 1 };
                for name in query.projection() {
                    projection.insert(name.clone(), 1);
                }
                Some(projection)
            }
        };
        FindRequest {
            filter,
            sort: if query.order_by().is_empty() {
                None
            } else {
                Some(sort_document(query.order_by()))
            },
            projection,
            skip: u64::from(query.offset()),
            limit: query.limit().map(i64::from),
        }
    }

    fn pipeline(&self, query: &StructuredQuery, filter: Document) -> Vec<Document> {
        let distinct = query.distinct_on();
        let mut kept: Vec<&str> = vec![KEY_FIELD];
        for name in query.projection().iter().chain(distinct) {
            if !kept.contains(&name.as_str()) {
                kept.push(name);
            }
        }

        let mut not_null = Document::new();
        for name in distinct {
            not_null.insert(name.clone(), doc! { "$ne": Bson::Null });
        }

        let mut sort = sort_document(query.order_by());
        sort.insert(ID_FIELD, 1);

        let mut project = Document::new();
        for name in &kept {
            project.insert(*name, 1);
        }

        let mut group_id = Document::new();
        for name in distinct {
            group_id.insert(name.clone(), format!("${}", name));
        }

        let mut unwrap = doc! { ID_FIELD: 0 };
        for name in &kept {
            unwrap.insert(*name, format!("$result.{}", name));
        }

        let mut pipeline = vec![
            doc! { "$match": filter },
            doc! { "$match": not_null },
            doc! { "$sort": sort },
            doc! { "$project": project },
            doc! { "$group": { ID_FIELD: group_id, "result": { "$first": "$$ROOT" } } },
            doc! { "$project": unwrap },
        ];
        if query.offset() > 0 {
            pipeline.push(doc! { "$skip": i64::from(query.offset()) });
        }
        if let Some(limit) = query.limit() {
            pipeline.push(doc! { "$limit": i64::from(limit) });
        }
        pipeline
    }
}

fn sort_document(order_by: &[OrderBy]) -> Document {
    let mut sort = Document::new();
    for order in order_by {
        let direction = match order.direction() {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        };
        sort.insert(order.property(), direction);
    }
    sort
}
