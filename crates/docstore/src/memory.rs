//! In-memory document store.
//!
//! [`MemoryDocumentStore`] implements [`DocumentClient`] over sorted maps so
//! the adapter, translator and cursor run end to end without a server. It
//! evaluates the subset of the query language the translator emits:
//!
//! - filters: `$and`, `$eq`, `$ne`, `$lt`, `$lte`, `$gt`, `$gte`, and plain
//!   equality
//! - `find` with sort, skip, limit and inclusion projection
//! - pipeline stages `$match`, `$sort`, `$project`, `$group` (with `$first`),
//!   `$skip` and `$limit`
//!
//! Anything else is rejected with [`MemoryDocumentError`].
//!
//! ## Comparison
//!
//! Values order by type first (null < numbers < strings < documents <
//! arrays < binary < booleans < dates), then by value. Range operators only
//! match values of the operand's type; an array field matches if any element
//! does. A missing field equals `null`. Sorting an array field uses its
//! smallest element ascending and its largest descending.

use crate::client::{collection_name, Collection, DocumentClient, DocumentCursor, FindRequest};
use crate::marshal::ID_FIELD;
use bson::{Bson, Document};
use canonstore_core::{Error, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by [`MemoryDocumentStore`]; surfaced as backend errors.
#[derive(Debug, Error)]
pub enum MemoryDocumentError {
    /// Document written without a string `_id`
    #[error("document has no string _id")]
    MissingId,

    /// Query operator outside the supported subset
    #[error("unsupported operator {0}")]
    UnsupportedOperator(String),

    /// Pipeline stage outside the supported subset
    #[error("unsupported pipeline stage {0}")]
    UnsupportedStage(String),

    /// Structurally invalid filter, sort or stage
    #[error("malformed request: {0}")]
    Malformed(String),
}

type MemoryResult<T> = std::result::Result<T, MemoryDocumentError>;

/// `(database, collection)` → `_id` → document.
type Collections = BTreeMap<(String, String), BTreeMap<String, Document>>;

/// In-memory [`DocumentClient`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryDocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all databases.
    pub fn document_count(&self) -> usize {
        self.collections.read().values().map(BTreeMap::len).sum()
    }

    /// Names of the non-empty collections in a project's database.
    pub fn collection_names(&self, project_id: &str) -> Vec<String> {
        self.collections
            .read()
            .iter()
            .filter(|((database, _), documents)| database == project_id && !documents.is_empty())
            .map(|((_, name), _)| name.clone())
            .collect()
    }

    /// Cursors issued and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(AtomicOrdering::SeqCst)
    }
}

impl DocumentClient for MemoryDocumentStore {
    fn collection(
        &self,
        project_id: &str,
        namespace: &str,
        kind: &str,
    ) -> Result<Box<dyn Collection>> {
        Ok(Box::new(MemoryCollection {
            database: project_id.to_string(),
            name: collection_name(namespace, kind),
            collections: Arc::clone(&self.collections),
            open_cursors: Arc::clone(&self.open_cursors),
        }))
    }
}

struct MemoryCollection {
    database: String,
    name: String,
    collections: Arc<RwLock<Collections>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryCollection {
    fn slot(&self) -> (String, String) {
        (self.database.clone(), self.name.clone())
    }

    /// Documents in `_id` order.
    fn snapshot(&self) -> Vec<Document> {
        self.collections
            .read()
            .get(&self.slot())
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default()
    }

    fn first_match(
        documents: &BTreeMap<String, Document>,
        filter: &Document,
    ) -> MemoryResult<Option<String>> {
        for (id, document) in documents {
            if matches(document, filter)? {
                return Ok(Some(id.clone()));
            }
        }
        Ok(None)
    }

    fn cursor(&self, documents: Vec<Document>) -> Box<dyn DocumentCursor> {
        self.open_cursors.fetch_add(1, AtomicOrdering::SeqCst);
        Box::new(MemoryDocumentCursor {
            documents: documents.into(),
            open_cursors: Arc::clone(&self.open_cursors),
            closed: false,
        })
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert_one(&self, filter: &Document, document: Document) -> Result<()> {
        let id = match document.get(ID_FIELD) {
            Some(Bson::String(id)) => id.clone(),
            _ => return Err(Error::backend(MemoryDocumentError::MissingId)),
        };
        let mut collections = self.collections.write();
        let documents = collections.entry(self.slot()).or_default();
        if let Some(existing) = Self::first_match(documents, filter).map_err(Error::backend)? {
            documents.remove(&existing);
        }
        documents.insert(id, document);
        Ok(())
    }

    fn find_one(&self, filter: &Document) -> Result<Option<Document>> {
        let collections = self.collections.read();
        let documents = match collections.get(&self.slot()) {
            Some(documents) => documents,
            None => return Ok(None),
        };
        let found = Self::first_match(documents, filter).map_err(Error::backend)?;
        Ok(found.and_then(|id| documents.get(&id).cloned()))
    }

    fn delete_one(&self, filter: &Document) -> Result<bool> {
        let mut collections = self.collections.write();
        let documents = match collections.get_mut(&self.slot()) {
            Some(documents) => documents,
            None => return Ok(false),
        };
        match Self::first_match(documents, filter).map_err(Error::backend)? {
            Some(id) => Ok(documents.remove(&id).is_some()),
            None => Ok(false),
        }
    }

    fn find(&self, request: FindRequest) -> Result<Box<dyn DocumentCursor>> {
        let documents = run_find(self.snapshot(), &request).map_err(Error::backend)?;
        debug!(
            "memory docstore: find on {} produced {} documents",
            self.name,
            documents.len()
        );
        Ok(self.cursor(documents))
    }

    fn aggregate(&self, pipeline: Vec<Document>) -> Result<Box<dyn DocumentCursor>> {
        let documents = run_pipeline(self.snapshot(), &pipeline).map_err(Error::backend)?;
        debug!(
            "memory docstore: {} stage pipeline on {} produced {} documents",
            pipeline.len(),
            self.name,
            documents.len()
        );
        Ok(self.cursor(documents))
    }
}

struct MemoryDocumentCursor {
    documents: VecDeque<Document>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

impl DocumentCursor for MemoryDocumentCursor {
    fn next_document(&mut self) -> Result<Option<Document>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.documents.pop_front())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

// =============================================================================
// Execution
// =============================================================================

fn run_find(documents: Vec<Document>, request: &FindRequest) -> MemoryResult<Vec<Document>> {
    let mut documents = filter_documents(documents, &request.filter)?;
    if let Some(sort) = &request.sort {
        sort_documents(&mut documents, sort)?;
    }
    let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
    let remaining = documents.into_iter().skip(skip);
    let limited: Vec<Document> = match request.limit {
        Some(limit) if limit != 0 => remaining
            .take(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX))
            .collect(),
        _ => remaining.collect(),
    };
    match &request.projection {
        Some(projection) => limited.iter().map(|d| project(d, projection)).collect(),
        None => Ok(limited),
    }
}

fn run_pipeline(mut documents: Vec<Document>, pipeline: &[Document]) -> MemoryResult<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (name, spec) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(MemoryDocumentError::Malformed(
                    "a stage must have exactly one field".to_string(),
                ))
            }
        };
        documents = match (name.as_str(), spec) {
            ("$match", Bson::Document(filter)) => filter_documents(documents, filter)?,
            ("$sort", Bson::Document(sort)) => {
                sort_documents(&mut documents, sort)?;
                documents
            }
            ("$project", Bson::Document(projection)) => documents
                .iter()
                .map(|d| project(d, projection))
                .collect::<MemoryResult<_>>()?,
            ("$group", Bson::Document(spec)) => group(documents, spec)?,
            ("$skip", count) => {
                let n = stage_count(name, count)?;
                documents.into_iter().skip(n).collect()
            }
            ("$limit", count) => {
                let n = stage_count(name, count)?;
                documents.into_iter().take(n).collect()
            }
            (other, _) => return Err(MemoryDocumentError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(documents)
}

fn stage_count(stage: &str, value: &Bson) -> MemoryResult<usize> {
    let n = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        _ => -1,
    };
    usize::try_from(n)
        .map_err(|_| MemoryDocumentError::Malformed(format!("{} needs a non-negative integer", stage)))
}

// =============================================================================
// Filters
// =============================================================================

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn filter_documents(documents: Vec<Document>, filter: &Document) -> MemoryResult<Vec<Document>> {
    let mut kept = Vec::with_capacity(documents.len());
    for document in documents {
        if matches(&document, filter)? {
            kept.push(document);
        }
    }
    Ok(kept)
}

fn matches(document: &Document, filter: &Document) -> MemoryResult<bool> {
    for (field, condition) in filter {
        let matched = if field == "$and" {
            let children = match condition {
                Bson::Array(children) => children,
                _ => {
                    return Err(MemoryDocumentError::Malformed(
                        "$and needs an array".to_string(),
                    ))
                }
            };
            let mut all = true;
            for child in children {
                let child = match child {
                    Bson::Document(child) => child,
                    _ => {
                        return Err(MemoryDocumentError::Malformed(
                            "$and entries must be documents".to_string(),
                        ))
                    }
                };
                if !matches(document, child)? {
                    all = false;
                    break;
                }
            }
            all
        } else if field.starts_with('$') {
            return Err(MemoryDocumentError::UnsupportedOperator(field.clone()));
        } else {
            matches_condition(lookup(document, field), condition)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(ops) if ops.keys().next().map_or(false, |k| k.starts_with('$')) => {
            Some(ops)
        }
        _ => None,
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> MemoryResult<bool> {
    let ops = match operator_document(condition) {
        Some(ops) => ops,
        None => return Ok(equals(value, condition)),
    };
    for (op, operand) in ops {
        let matched = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$lt" => in_range(value, operand, |o| o == Ordering::Less),
            "$lte" => in_range(value, operand, |o| o != Ordering::Greater),
            "$gt" => in_range(value, operand, |o| o == Ordering::Greater),
            "$gte" => in_range(value, operand, |o| o != Ordering::Less),
            other => return Err(MemoryDocumentError::UnsupportedOperator(other.to_string())),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    match value {
        None => matches!(operand, Bson::Null),
        Some(Bson::Array(items)) => {
            compare(&Bson::Array(items.clone()), operand) == Ordering::Equal
                || items.iter().any(|item| compare(item, operand) == Ordering::Equal)
        }
        Some(value) => compare(value, operand) == Ordering::Equal,
    }
}

fn in_range(value: Option<&Bson>, operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let candidates: Vec<&Bson> = match value {
        None => return false,
        Some(Bson::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    };
    candidates
        .into_iter()
        .any(|c| type_rank(c) == type_rank(operand) && accept(compare(c, operand)))
}

// =============================================================================
// Ordering
// =============================================================================

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => u8::MAX,
        _ => 12,
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_double(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

/// Total order over BSON values, type bracket first.
fn compare(a: &Bson, b: &Bson) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Array(x), Bson::Array(y)) => compare_sequences(x.iter(), y.iter()),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        _ if type_rank(a) == 2 => match (as_integer(a), as_integer(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (as_double(a), as_double(b));
                x.partial_cmp(&y)
                    .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()).reverse())
            }
        },
        _ => Ordering::Equal,
    }
}

fn compare_sequences<'a>(
    mut x: impl Iterator<Item = &'a Bson>,
    mut y: impl Iterator<Item = &'a Bson>,
) -> Ordering {
    loop {
        match (x.next(), y.next()) {
            (Some(a), Some(b)) => match compare(a, b) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

fn compare_documents(x: &Document, y: &Document) -> Ordering {
    let mut left = x.iter();
    let mut right = y.iter();
    loop {
        match (left.next(), right.next()) {
            (Some((ka, va)), Some((kb, vb))) => {
                let ordering = compare(va, vb).then_with(|| ka.cmp(kb));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

static NULL: Bson = Bson::Null;

fn sort_value<'a>(document: &'a Document, field: &str, descending: bool) -> &'a Bson {
    match lookup(document, field) {
        Some(Bson::Array(items)) => {
            let picked = if descending {
                items.iter().max_by(|a, b| compare(a, b))
            } else {
                items.iter().min_by(|a, b| compare(a, b))
            };
            picked.unwrap_or(&NULL)
        }
        Some(value) => value,
        None => &NULL,
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) -> MemoryResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match as_integer(direction) {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(MemoryDocumentError::Malformed(format!(
                    "sort direction for {} must be 1 or -1",
                    field
                )))
            }
        };
        keys.push((field.as_str(), descending));
    }
    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ordering = compare(
                sort_value(a, field, *descending),
                sort_value(b, field, *descending),
            );
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

// =============================================================================
// Projection and grouping
// =============================================================================

fn flag(rule: &Bson) -> Option<bool> {
    match rule {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(f) => Some(*f != 0.0),
        _ => None,
    }
}

fn evaluate(document: &Document, expression: &Bson) -> MemoryResult<Option<Bson>> {
    match expression {
        Bson::String(path) if path == "$$ROOT" => Ok(Some(Bson::Document(document.clone()))),
        Bson::String(path) if path.starts_with("$$") => {
            Err(MemoryDocumentError::UnsupportedOperator(path.clone()))
        }
        Bson::String(path) if path.starts_with('$') => Ok(lookup(document, &path[1..]).cloned()),
        Bson::Document(fields) => {
            let mut out = Document::new();
            for (name, inner) in fields {
                if name.starts_with('$') {
                    return Err(MemoryDocumentError::UnsupportedOperator(name.clone()));
                }
                if let Some(value) = evaluate(document, inner)? {
                    out.insert(name.clone(), value);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn project(document: &Document, projection: &Document) -> MemoryResult<Document> {
    let mut out = Document::new();
    match projection.get(ID_FIELD) {
        None => {
            if let Some(id) = document.get(ID_FIELD) {
                out.insert(ID_FIELD, id.clone());
            }
        }
        Some(rule) => match flag(rule) {
            Some(true) => {
                if let Some(id) = document.get(ID_FIELD) {
                    out.insert(ID_FIELD, id.clone());
                }
            }
            Some(false) => {}
            None => {
                if let Some(value) = evaluate(document, rule)? {
                    out.insert(ID_FIELD, value);
                }
            }
        },
    }

    for (field, rule) in projection {
        if field == ID_FIELD {
            continue;
        }
        match flag(rule) {
            Some(true) => {
                if let Some(value) = lookup(document, field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            Some(false) => {
                return Err(MemoryDocumentError::Malformed(format!(
                    "cannot exclude {} in an inclusion projection",
                    field
                )))
            }
            None => {
                if let Some(value) = evaluate(document, rule)? {
                    out.insert(field.clone(), value);
                }
            }
        }
    }
    Ok(out)
}

/// BSON value ordered by [`compare`], for group keys.
struct GroupKey(Bson);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

/// Groups in first-seen order; only `$first` accumulators.
fn group(documents: Vec<Document>, spec: &Document) -> MemoryResult<Vec<Document>> {
    let id_expression = spec.get(ID_FIELD).ok_or_else(|| {
        MemoryDocumentError::Malformed("$group needs an _id expression".to_string())
    })?;

    let mut accumulators = Vec::new();
    for (field, accumulator) in spec {
        if field == ID_FIELD {
            continue;
        }
        let argument = match accumulator {
            Bson::Document(op) if op.len() == 1 => match op.get("$first") {
                Some(argument) => argument,
                None => {
                    let name = op.keys().next().cloned().unwrap_or_default();
                    return Err(MemoryDocumentError::UnsupportedOperator(name));
                }
            },
            _ => {
                return Err(MemoryDocumentError::Malformed(format!(
                    "accumulator {} must be a single-operator document",
                    field
                )))
            }
        };
        accumulators.push((field.clone(), argument));
    }

    let mut seen = BTreeSet::new();
    let mut groups = Vec::new();
    for document in documents {
        let id = evaluate(&document, id_expression)?.unwrap_or(Bson::Null);
        if !seen.insert(GroupKey(id.clone())) {
            continue;
        }
        let mut out = Document::new();
        out.insert(ID_FIELD, id);
        for (field, argument) in &accumulators {
            let value = evaluate(&document, argument)?.unwrap_or(Bson::Null);
            out.insert(field.clone(), value);
        }
        groups.push(out);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded() -> (MemoryDocumentStore, Box<dyn Collection>) {
        let store = MemoryDocumentStore::new();
        let collection = store.collection("p", "", "Task").unwrap();
        let rows = [
            ("a", Bson::Int64(3), "red", 2),
            ("b", Bson::Int64(-1), "blue", 1),
            ("c", Bson::Double(2.5), "red", 1),
            ("d", Bson::String("x".into()), "blue", 3),
        ];
        for (id, num, category, priority) in rows {
            collection
                .upsert_one(
                    &doc! { "_id": id },
                    doc! { "_id": id, "num": num, "category": category, "priority": priority },
                )
                .unwrap();
        }
        (store, collection)
    }

    fn drain(mut cursor: Box<dyn DocumentCursor>) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(document) = cursor.next_document().unwrap() {
            out.push(document);
        }
        cursor.close();
        out
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.get_str("_id").unwrap()).collect()
    }

    mod write_tests {
        use super::*;

        #[test]
        fn test_upsert_replaces() {
            let (store, collection) = seeded();
            collection
                .upsert_one(&doc! { "_id": "a" }, doc! { "_id": "a", "num": 9i64 })
                .unwrap();
            assert_eq!(store.document_count(), 4);
            let found = collection.find_one(&doc! { "_id": "a" }).unwrap().unwrap();
            assert_eq!(found, doc! { "_id": "a", "num": 9i64 });
        }

        #[test]
        fn test_missing_id_rejected() {
            let (_, collection) = seeded();
            let err = collection
                .upsert_one(&doc! { "_id": "z" }, doc! { "num": 1i64 })
                .unwrap_err();
            assert!(err.is_backend());
        }

        #[test]
        fn test_delete_one() {
            let (store, collection) = seeded();
            assert!(collection.delete_one(&doc! { "_id": "b" }).unwrap());
            assert!(!collection.delete_one(&doc! { "_id": "b" }).unwrap());
            assert_eq!(store.document_count(), 3);
        }

        #[test]
        fn test_collections_are_separate() {
            let (store, _) = seeded();
            let other = store.collection("p", "tenant", "Task").unwrap();
            assert_eq!(other.name(), "tenant__Task");
            assert!(other.find_one(&doc! {}).unwrap().is_none());
            assert_eq!(store.collection_names("p"), vec!["__Task".to_string()]);
        }
    }

    mod find_tests {
        use super::*;

        #[test]
        fn test_range_is_type_bracketed() {
            let (_, collection) = seeded();
            let request = FindRequest {
                filter: doc! { "num": { "$gte": 0i64 } },
                sort: Some(doc! { "num": 1 }),
                ..FindRequest::default()
            };
            let found = drain(collection.find(request).unwrap());
            assert_eq!(ids(&found), vec!["c", "a"]);
        }

        #[test]
        fn test_sort_desc_skip_limit() {
            let (_, collection) = seeded();
            let request = FindRequest {
                filter: doc! { "category": { "$eq": "red" } },
                sort: Some(doc! { "num": -1 }),
                skip: 1,
                limit: Some(5),
                ..FindRequest::default()
            };
            let found = drain(collection.find(request).unwrap());
            assert_eq!(ids(&found), vec!["c"]);
        }

        #[test]
        fn test_projection() {
            let (_, collection) = seeded();
            let request = FindRequest {
                filter: doc! { "_id": "a" },
                projection: Some(doc! { "category": 1 }),
                ..FindRequest::default()
            };
            let found = drain(collection.find(request).unwrap());
            assert_eq!(found, vec![doc! { "_id": "a", "category": "red" }]);
        }

        #[test]
        fn test_null_conditions() {
            let (_, collection) = seeded();
            let missing = FindRequest {
                filter: doc! { "absent": { "$eq": Bson::Null } },
                ..FindRequest::default()
            };
            assert_eq!(drain(collection.find(missing).unwrap()).len(), 4);
            let present = FindRequest {
                filter: doc! { "absent": { "$ne": Bson::Null } },
                ..FindRequest::default()
            };
            assert!(drain(collection.find(present).unwrap()).is_empty());
        }

        #[test]
        fn test_array_matches_any_element() {
            let (_, collection) = seeded();
            collection
                .upsert_one(
                    &doc! { "_id": "e" },
                    doc! { "_id": "e", "tags": ["x", "y"] },
                )
                .unwrap();
            let request = FindRequest {
                filter: doc! { "tags": { "$eq": "y" } },
                ..FindRequest::default()
            };
            assert_eq!(ids(&drain(collection.find(request).unwrap())), vec!["e"]);
        }

        #[test]
        fn test_unknown_operator_rejected() {
            let (_, collection) = seeded();
            let request = FindRequest {
                filter: doc! { "num": { "$in": [1i64] } },
                ..FindRequest::default()
            };
            assert!(collection.find(request).is_err());
        }

        #[test]
        fn test_cursor_accounting() {
            let (store, collection) = seeded();
            let mut cursor = collection.find(FindRequest::default()).unwrap();
            assert_eq!(store.open_cursors(), 1);
            cursor.close();
            cursor.close();
            assert_eq!(store.open_cursors(), 0);
            assert!(cursor.next_document().unwrap().is_none());
        }
    }

    mod pipeline_tests {
        use super::*;

        #[test]
        fn test_group_first_after_sort() {
            let (_, collection) = seeded();
            let pipeline = vec![
                doc! { "$match": {} },
                doc! { "$sort": { "priority": 1, "_id": 1 } },
                doc! { "$group": { "_id": { "category": "$category" }, "result": { "$first": "$$ROOT" } } },
                doc! { "$project": { "_id": 0, "id": "$result._id", "category": "$result.category" } },
            ];
            let rows = drain(collection.aggregate(pipeline).unwrap());
            assert_eq!(
                rows,
                vec![
                    doc! { "id": "b", "category": "blue" },
                    doc! { "id": "c", "category": "red" },
                ]
            );
        }

        #[test]
        fn test_skip_limit_stages() {
            let (_, collection) = seeded();
            let pipeline = vec![
                doc! { "$sort": { "_id": 1 } },
                doc! { "$skip": 1i64 },
                doc! { "$limit": 2i64 },
            ];
            let rows = drain(collection.aggregate(pipeline).unwrap());
            assert_eq!(ids(&rows), vec!["b", "c"]);
        }

        #[test]
        fn test_unsupported_stage() {
            let (_, collection) = seeded();
            let err = collection
                .aggregate(vec![doc! { "$unwind": "$tags" }])
                .err().unwrap();
            assert!(err.to_string().contains("$unwind"));
        }
    }
}
