//! [`StoreAdapter`] over a [`DatastoreClient`].

use crate::client::{DatastoreClient, EntityCursor};
use crate::marshal::{DatastoreMarshaller, DatastoreUnmarshaller};
use crate::translate::DatastoreQueryTranslator;
use canonstore_core::{
    Atomicity, Entity, Error, FullEntity, Key, KeyFactory, Marshaller, QueryRow, Result,
    ResultType, RowSource, StoreAdapter, StructuredQuery, Unmarshaller,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Adapter for the hierarchical-key store.
///
/// Batch writes are atomic because the client's `put` is.
pub struct DatastoreAdapter {
    client: Arc<dyn DatastoreClient>,
    project_id: String,
    namespace: String,
    marshaller: DatastoreMarshaller,
    unmarshaller: DatastoreUnmarshaller,
    translator: DatastoreQueryTranslator,
}

impl DatastoreAdapter {
    /// Adapter for `project_id` in the default namespace.
    pub fn new(client: Arc<dyn DatastoreClient>, project_id: impl Into<String>) -> Self {
        let marshaller = DatastoreMarshaller;
        DatastoreAdapter {
            client,
            project_id: project_id.into(),
            namespace: String::new(),
            marshaller,
            unmarshaller: DatastoreUnmarshaller,
            translator: DatastoreQueryTranslator::new(marshaller),
        }
    }

    /// Default namespace for keys and queries.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Project the adapter is bound to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl std::fmt::Debug for DatastoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreAdapter")
            .field("project_id", &self.project_id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl StoreAdapter for DatastoreAdapter {
    fn name(&self) -> &'static str {
        "datastore"
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::Atomic
    }

    fn key_factory(&self) -> KeyFactory {
        KeyFactory::new(self.project_id.clone()).namespace(self.namespace.clone())
    }

    fn put_all(&self, entities: Vec<FullEntity>) -> Result<Vec<Entity>> {
        let native = entities
            .iter()
            .map(|entity| {
                if entity.key().is_none() {
                    return Err(Error::invalid_request("Entity has no key"));
                }
                self.marshaller.convert_full_entity(entity)
            })
            .collect::<Result<Vec<_>>>()?;

        let count = native.len();
        let stored = self.client.put(native)?;
        debug!("datastore put {} entities", count);

        stored
            .iter()
            .map(|entity| self.unmarshaller.convert_entity(entity))
            .collect()
    }

    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        let native = self.marshaller.convert_key(key)?;
        match self.client.get(&native)? {
            Some(entity) => self.unmarshaller.convert_entity(&entity).map(Some),
            None => Ok(None),
        }
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        let native = keys
            .iter()
            .map(|key| self.marshaller.convert_key(key))
            .collect::<Result<Vec<_>>>()?;
        self.client.delete(native)
    }

    fn run(&self, query: &StructuredQuery) -> Result<Box<dyn RowSource>> {
        let request = self
            .translator
            .translate(query, &self.project_id, &self.namespace)?;
        let cursor = self.client.run_query(&request)?;
        Ok(Box::new(DatastoreRows {
            cursor,
            result_type: query.result_type(),
            unmarshaller: self.unmarshaller,
            released: false,
        }))
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Native cursor narrowed to canonical rows of one result type.
struct DatastoreRows {
    cursor: Box<dyn EntityCursor>,
    result_type: ResultType,
    unmarshaller: DatastoreUnmarshaller,
    released: bool,
}

impl RowSource for DatastoreRows {
    fn next_row(&mut self) -> Result<Option<QueryRow>> {
        let entity = match self.cursor.next_entity()? {
            Some(entity) => entity,
            None => return Ok(None),
        };
        let row = match self.result_type {
            ResultType::Entity => QueryRow::Entity(self.unmarshaller.convert_entity(&entity)?),
            ResultType::ProjectionEntity => {
                QueryRow::Projection(self.unmarshaller.convert_projection_entity(&entity)?)
            }
            ResultType::Key => match &entity.key {
                Some(key) => QueryRow::Key(self.unmarshaller.convert_key(key)?),
                None => {
                    warn!("keys-only row without a key");
                    return Err(Error::invalid_request("Entity has no key"));
                }
            },
        };
        Ok(Some(row))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.cursor.close();
        }
    }
}
