//! Client seam for the document store.
//!
//! One database per project, one collection per `(namespace, kind)` pair.
//! Implementations own connections, retries and timeouts; errors they return
//! reach the caller unchanged.

use bson::Document;
use canonstore_core::Result;

/// Collection name for a namespace and kind: `"{namespace}__{kind}"`.
pub fn collection_name(namespace: &str, kind: &str) -> String {
    format!("{}__{}", namespace, kind)
}

/// A `find` call: filter, sort, projection, skip and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    /// Filter document; empty matches everything.
    pub filter: Document,
    /// Sort document, fields in priority order with `1` / `-1`.
    pub sort: Option<Document>,
    /// Inclusion projection.
    pub projection: Option<Document>,
    /// Documents to skip.
    pub skip: u64,
    /// Maximum documents to return.
    pub limit: Option<i64>,
}

/// Entry point of a document store client.
pub trait DocumentClient: Send + Sync {
    /// Handle on the collection holding `kind` in `namespace` of `project_id`.
    fn collection(&self, project_id: &str, namespace: &str, kind: &str)
        -> Result<Box<dyn Collection>>;
}

/// One collection.
pub trait Collection: Send {
    /// Collection name.
    fn name(&self) -> &str;

    /// Replace the document matching `filter` with `document`, inserting it
    /// if nothing matches.
    fn upsert_one(&self, filter: &Document, document: Document) -> Result<()>;

    /// First document matching `filter`.
    fn find_one(&self, filter: &Document) -> Result<Option<Document>>;

    /// Delete the first document matching `filter`; true if one was removed.
    fn delete_one(&self, filter: &Document) -> Result<bool>;

    /// Run a `find` and return a cursor over the matches.
    fn find(&self, request: FindRequest) -> Result<Box<dyn DocumentCursor>>;

    /// Run an aggregation pipeline and return a cursor over its output.
    fn aggregate(&self, pipeline: Vec<Document>) -> Result<Box<dyn DocumentCursor>>;
}

/// Server-side cursor.
pub trait DocumentCursor: Send {
    /// Next document, or `None` once drained.
    fn next_document(&mut self) -> Result<Option<Document>>;

    /// Free the server-side cursor.
    fn close(&mut self);
}
