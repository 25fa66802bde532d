//! Store entry point.
//!
//! [`Store`] is the single surface callers use. It holds one backend adapter
//! and forwards every call to it; the canonical model is the same whichever
//! backend is active.

use crate::config::{BackendKind, StoreConfig};
use crate::error::{Error, Result};
use canonstore_core::{
    Atomicity, Entity, FullEntity, Key, KeyFactory, Query, QueryResultKind, QueryResults,
    StoreAdapter,
};
use canonstore_datastore::{DatastoreAdapter, DatastoreClient, MemoryDatastore};
use canonstore_docstore::{DocumentClient, DocumentStoreAdapter, MemoryDocumentStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A canonical entity store over one backend.
///
/// Cloning is cheap; clones share the backend.
///
/// # Example
///
/// ```
/// use canonstore::prelude::*;
///
/// fn main() -> Result<()> {
///     let store = Store::in_memory(BackendKind::Datastore, "inventory");
///     let key = store.new_key_factory().new_key_with_name("Task", "sample")?;
///     let task = Entity::builder().set("done", false).build_entity(key.clone());
///     store.put(task)?;
///     assert!(store.get(&key)?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Store {
    adapter: Arc<dyn StoreAdapter>,
}

impl Store {
    /// Wrap an adapter.
    pub fn new(adapter: Arc<dyn StoreAdapter>) -> Self {
        Self { adapter }
    }

    /// Create a builder for store configuration.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Open a store backed by an in-process client.
    ///
    /// With an empty project id, the key factory rejects every key.
    pub fn in_memory(backend: BackendKind, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let adapter: Arc<dyn StoreAdapter> = match backend {
            BackendKind::Datastore => Arc::new(DatastoreAdapter::new(
                Arc::new(MemoryDatastore::new()),
                project_id.clone(),
            )),
            BackendKind::Docstore => Arc::new(DocumentStoreAdapter::new(
                Arc::new(MemoryDocumentStore::new()),
                project_id.clone(),
            )),
        };
        info!("opened in-memory {} store for project {}", backend, project_id);
        Self { adapter }
    }

    /// Open an in-memory store from a TOML config file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = StoreConfig::load(path)?;
        StoreBuilder::from_config(&config).open()
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Batch write guarantee of [`put_all`](Self::put_all).
    pub fn atomicity(&self) -> Atomicity {
        self.adapter.atomicity()
    }

    /// Key factory for the store's default project and namespace.
    pub fn new_key_factory(&self) -> KeyFactory {
        self.adapter.key_factory()
    }

    /// Write one entity and return it as stored.
    pub fn put(&self, entity: impl Into<FullEntity>) -> Result<Entity> {
        self.put_all(vec![entity.into()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_request("Backend returned no entity for put"))
    }

    /// Write entities and return them as stored, in input order.
    ///
    /// See [`atomicity`](Self::atomicity) for what a failure leaves behind.
    pub fn put_all(&self, entities: Vec<FullEntity>) -> Result<Vec<Entity>> {
        debug!("{} put_all: {} entities", self.adapter.name(), entities.len());
        self.adapter.put_all(entities)
    }

    /// Read one entity.
    pub fn get(&self, key: &Key) -> Result<Option<Entity>> {
        debug!("{} get: {}", self.adapter.name(), key);
        self.adapter.get(key)
    }

    /// Read several entities in key order, skipping missing ones.
    pub fn get_all(&self, keys: &[Key]) -> Result<Vec<Entity>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entity) = self.adapter.get(key)? {
                found.push(entity);
            }
        }
        debug!(
            "{} get_all: {} of {} found",
            self.adapter.name(),
            found.len(),
            keys.len()
        );
        Ok(found)
    }

    /// Delete entities. Missing keys are ignored.
    pub fn delete(&self, keys: &[Key]) -> Result<()> {
        debug!("{} delete: {} keys", self.adapter.name(), keys.len());
        self.adapter.delete(keys)
    }

    /// Run a query. The native query is issued now; rows convert lazily.
    pub fn run<T: QueryResultKind>(&self, query: &Query<T>) -> Result<QueryResults<T>> {
        debug!(
            "{} run: {:?} query on {:?}",
            self.adapter.name(),
            query.result_type(),
            query.structured().kind()
        );
        let source = self.adapter.run(query.structured())?;
        Ok(QueryResults::new(source))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.adapter.name())
            .finish()
    }
}

/// Builder for a [`Store`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use canonstore::datastore::MemoryDatastore;
/// use canonstore::prelude::*;
///
/// fn main() -> Result<()> {
///     // In-process document store
///     let store = Store::builder()
///         .backend(BackendKind::Docstore)
///         .project_id("inventory")
///         .open()?;
///     assert_eq!(store.backend_name(), "docstore");
///
///     // Caller-supplied client
///     let client = Arc::new(MemoryDatastore::new());
///     let store = Store::builder()
///         .project_id("inventory")
///         .datastore_client(client)
///         .open()?;
///     assert_eq!(store.backend_name(), "datastore");
///     Ok(())
/// }
/// ```
pub struct StoreBuilder {
    config: StoreConfig,
    datastore_client: Option<Arc<dyn DatastoreClient>>,
    document_client: Option<Arc<dyn DocumentClient>>,
}

impl StoreBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&StoreConfig::default())
    }

    /// Builder seeded from a config.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            config: config.clone(),
            datastore_client: None,
            document_client: None,
        }
    }

    /// Set the backend.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the default project.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.project_id = project_id.into();
        self
    }

    /// Set the default namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Use this hierarchical-key store client; selects that backend.
    pub fn datastore_client(mut self, client: Arc<dyn DatastoreClient>) -> Self {
        self.config.backend = BackendKind::Datastore;
        self.datastore_client = Some(client);
        self
    }

    /// Use this document store client; selects that backend.
    pub fn document_client(mut self, client: Arc<dyn DocumentClient>) -> Self {
        self.config.backend = BackendKind::Docstore;
        self.document_client = Some(client);
        self
    }

    /// Open the store. Without a client, an in-process one is created.
    pub fn open(self) -> Result<Store> {
        self.config.validate()?;
        let StoreConfig {
            backend,
            project_id,
            namespace,
        } = self.config;

        let adapter: Arc<dyn StoreAdapter> = match backend {
            BackendKind::Datastore => {
                let client: Arc<dyn DatastoreClient> = match self.datastore_client {
                    Some(client) => client,
                    None => Arc::new(MemoryDatastore::new()),
                };
                Arc::new(
                    DatastoreAdapter::new(client, project_id.clone())
                        .with_namespace(namespace.clone()),
                )
            }
            BackendKind::Docstore => {
                let client: Arc<dyn DocumentClient> = match self.document_client {
                    Some(client) => client,
                    None => Arc::new(MemoryDocumentStore::new()),
                };
                Arc::new(
                    DocumentStoreAdapter::new(client, project_id.clone())
                        .with_namespace(namespace.clone()),
                )
            }
        };
        info!(
            "opened {} store for project {} namespace {:?}",
            backend, project_id, namespace
        );
        Ok(Store { adapter })
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
