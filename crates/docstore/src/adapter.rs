//! [`StoreAdapter`] over a [`DocumentClient`].
//!
//! Writes go one entity at a time: marshal, upsert by `_id`, re-read. A
//! failure stops the batch, leaving earlier entities written and later ones
//! untouched ([`Atomicity::BestEffortSequential`]).

use crate::client::{DocumentClient, DocumentCursor};
use crate::marshal::{DocumentMarshaller, DocumentUnmarshaller, ID_FIELD, KEY_FIELD};
use crate::translate::{DocumentQueryTranslator, NativeQuery};
use bson::{doc, Bson, Document};
use canonstore_core::{
    Atomicity, Entity, Error, FullEntity, Key, KeyFactory, KeyPath, Marshaller, QueryRow, Result,
    ResultType, RowSource, StoreAdapter, StructuredQuery, Unmarshaller,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Adapter for the document store.
pub struct DocumentStoreAdapter {
    client: Arc<dyn DocumentClient>,
    project_id: String,
    namespace: String,
    marshaller: DocumentMarshaller,
    unmarshaller: DocumentUnmarshaller,
    translator: DocumentQueryTranslator,
}

impl DocumentStoreAdapter {
    /// Adapter for `project_id` in the default namespace.
    pub fn new(client: Arc<dyn DocumentClient>, project_id: impl Into<String>) -> Self {
        let marshaller = DocumentMarshaller;
        DocumentStoreAdapter {
            client,
            project_id: project_id.into(),
            namespace: String::new(),
            marshaller,
            unmarshaller: DocumentUnmarshaller,
            translator: DocumentQueryTranslator::new(marshaller),
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

    fn id_filter(&self, key: &Key) -> Result<Document> {
        Ok(doc! { ID_FIELD: self.marshaller.document_id(key)? })
    }

    fn put_one(&self, entity: FullEntity) -> Result<Entity> {
        let entity = entity.try_into_entity()?;
        let key = entity.key();
        let document = self.marshaller.convert_entity(&entity)?;
        let filter = self.id_filter(key)?;

        let collection = self
            .client
            .collection(key.project_id(), key.namespace(), key.kind())?;
        collection.upsert_one(&filter, document)?;

        match collection.find_one(&filter)? {
            Some(stored) => self.unmarshaller.convert_entity(&stored),
            None => Err(Error::invalid_request(format!(
                "{} missing from {} after write",
                key,
                collection.name()
            ))),
        }
    }
}

impl std::fmt::Debug for DocumentStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStoreAdapter")
            .field("project_id", &self.project_id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl StoreAdapter for DocumentStoreAdapter {
    fn name(&self) -> &'static str {
        "docstore"
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::BestEffortSequential
    }

    fn key_factory(&self) -> KeyFactory {
        KeyFactory::new(self.project_id.clone()).namespace(self.namespace.clone())
    }

    fn put_all(&self, entities: Vec<FullEntity>) -> Result<Vec<Entity>> {
        let total = entities.len();
        let mut stored = Vec::with_capacity(total);
        for entity in entities {
            match self.put_one(entity) {
                Ok(entity) => stored.push(entity),
                Err(e) => {
                    warn!(
                        "docstore put stopped after {} of {} entities: {}",
                        stored.len(),
                        total,
                        e
                    );
                    return Err(e);
                }
            }
        }
        debug!("docstore put {} entities", total);
        Ok(stored)
    }

    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        let collection = self
            .client
            .collection(key.project_id(), key.namespace(), key.kind())?;
        match collection.find_one(&self.id_filter(key)?)? {
            Some(document) => self.unmarshaller.convert_entity(&document).map(Some),
            None => Ok(None),
        }
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        for key in keys {
            let collection = self
                .client
                .collection(key.project_id(), key.namespace(), key.kind())?;
            collection.delete_one(&self.id_filter(key)?)?;
        }
        debug!("docstore delete {} keys", keys.len());
        Ok(())
    }

    fn run(&self, query: &StructuredQuery) -> Result<Box<dyn RowSource>> {
        let translated = self.translator.translate(query)?;
        let collection = self.client.collection(
            query.project_id().unwrap_or(&self.project_id),
            query.namespace().unwrap_or(&self.namespace),
            &translated.kind,
        )?;
        let cursor = match translated.native {
            NativeQuery::Find(request) => collection.find(request)?,
            NativeQuery::Aggregate(pipeline) => collection.aggregate(pipeline)?,
        };
        Ok(Box::new(DocumentRows {
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
struct DocumentRows {
    cursor: Box<dyn DocumentCursor>,
    result_type: ResultType,
    unmarshaller: DocumentUnmarshaller,
    released: bool,
}

impl RowSource for DocumentRows {
    fn next_row(&mut self) -> Result<Option<QueryRow>> {
        let document = match self.cursor.next_document()? {
            Some(document) => document,
            None => return Ok(None),
        };
        let row = match self.result_type {
            ResultType::Entity => QueryRow::Entity(self.unmarshaller.convert_entity(&document)?),
            ResultType::ProjectionEntity => {
                QueryRow::Projection(self.unmarshaller.convert_projection_entity(&document)?)
            }
            ResultType::Key => match document.get(KEY_FIELD) {
                Some(Bson::Document(key)) => QueryRow::Key(self.unmarshaller.convert_key(key)?),
                _ => return Err(Error::invalid_request("Document has no key field")),
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
