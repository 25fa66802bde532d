//! Client seam for the hierarchical-key store.
//!
//! The adapter talks to the service only through [`DatastoreClient`].
//! Implementations own connection setup, retries and timeouts; errors they
//! return reach the caller unchanged.

use crate::v1;
use canonstore_core::Result;

/// Operations the adapter needs from a store client.
pub trait DatastoreClient: Send + Sync {
    /// Write entities atomically: all of them or none.
    ///
    /// Entities whose key leaf has no id or name get an allocated id; the
    /// returned entities carry the final keys, in input order.
    fn put(&self, entities: Vec<v1::Entity>) -> Result<Vec<v1::Entity>>;

    /// Read one entity.
    fn get(&self, key: &v1::Key) -> Result<Option<v1::Entity>>;

    /// Delete entities. Missing keys are ignored.
    fn delete(&self, keys: Vec<v1::Key>) -> Result<()>;

    /// Issue a query and return a cursor over its result rows.
    fn run_query(&self, request: &v1::RunQueryRequest) -> Result<Box<dyn EntityCursor>>;
}

/// Server-side query cursor.
pub trait EntityCursor: Send {
    /// Next row, or `None` once drained.
    fn next_entity(&mut self) -> Result<Option<v1::Entity>>;

    /// Free the server-side cursor.
    fn close(&mut self);
}
