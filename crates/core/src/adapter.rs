//! Backend adapter seam
//!
//! A [`StoreAdapter`] marshals canonical requests into one backend's native
//! form, invokes that backend's client and unmarshals the answers. The
//! `Store` facade holds exactly one adapter behind an `Arc<dyn StoreAdapter>`.

use crate::cursor::RowSource;
use crate::entity::{Entity, FullEntity};
use crate::error::Result;
use crate::key::{Key, KeyFactory};
use crate::query::StructuredQuery;

/// Guarantee a backend gives for multi-entity writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atomicity {
    /// The whole batch is written or none of it is.
    Atomic,
    /// Items are written one at a time; a failure leaves earlier items
    /// written and later ones unattempted.
    BestEffortSequential,
}

/// One backend behind the canonical model.
pub trait StoreAdapter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Batch write guarantee of [`put_all`](Self::put_all).
    fn atomicity(&self) -> Atomicity;

    /// Key factory scoped to the adapter's project and namespace.
    fn key_factory(&self) -> KeyFactory;

    /// Write entities and return them as stored.
    ///
    /// Backends that allocate ids complete incomplete keys; others reject them.
    fn put_all(&self, entities: Vec<FullEntity>) -> Result<Vec<Entity>>;

    /// Read one entity.
    fn get(&self, key: &Key) -> Result<Option<Entity>>;

    /// Delete entities. Missing keys are ignored.
    fn delete(&self, keys: &[Key]) -> Result<()>;

    /// Translate and issue a query, returning a cursor over its rows.
    fn run(&self, query: &StructuredQuery) -> Result<Box<dyn RowSource>>;
}
