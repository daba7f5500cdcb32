//! In-memory storage implementation of [`StoreBackend`].
//!
//! Documents are kept per collection in ordered maps behind an async-aware read-write
//! lock. Every write assigns a new revision and a new position in the collection's
//! changes feed; deletes leave a tombstone so the feed can report them.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::debug;
use uuid::Uuid;

use docguard_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    changes::{Change, ChangeRev, ChangesQuery, ChangesResponse, FeedMode},
    document::{DocumentMeta, JsonDoc},
    error::{StoreError, StoreResult},
};

use crate::{
    evaluator::{DocumentEvaluator, compare_by},
    selector::MangoQuery,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Body without `_id` and `_rev`.
    body: Map<String, Value>,
    rev: String,
    generation: u64,
    seq: u64,
    deleted: bool,
}

impl StoredDocument {
    fn to_json_doc(&self, id: &str) -> JsonDoc {
        let mut document = JsonDoc::new(self.body.clone());
        document.set_id(id);
        document.set_rev(self.rev.clone());
        document
    }
}

#[derive(Debug, Clone)]
struct IndexDefinition {
    id: String,
    name: String,
    index: Value,
}

/// Reply to an index definition, as CouchDB shapes it.
#[derive(Serialize)]
struct IndexOutcome<'a> {
    result: &'static str,
    id: &'a str,
    name: &'a str,
}

impl<'a> IndexOutcome<'a> {
    fn to_value(result: &'static str, index: &'a IndexDefinition) -> StoreResult<Value> {
        let outcome = Self {
            result,
            id: &index.id,
            name: &index.name,
        };

        Ok(serde_json::to_value(outcome)?)
    }
}

#[derive(Debug, Default)]
struct Collection {
    documents: BTreeMap<String, StoredDocument>,
    indexes: Vec<IndexDefinition>,
    last_seq: u64,
}

impl Collection {
    fn live(&self, id: &str) -> Option<&StoredDocument> {
        self.documents.get(id).filter(|document| !document.deleted)
    }

    /// Stores a new revision of `id` and returns it.
    fn write(&mut self, id: &str, body: Map<String, Value>, generation: u64, deleted: bool) -> String {
        self.last_seq += 1;
        let rev = new_rev(generation);

        self.documents.insert(
            id.to_string(),
            StoredDocument {
                body,
                rev: rev.clone(),
                generation,
                seq: self.last_seq,
                deleted,
            },
        );

        rev
    }

    /// Checks `rev` against the live revision of `id` and returns its generation.
    fn current_generation(&self, collection: &str, id: &str, rev: Option<&str>) -> StoreResult<u64> {
        let current = self
            .live(id)
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        if rev != Some(current.rev.as_str()) {
            return Err(StoreError::Conflict(id.to_string(), collection.to_string()));
        }

        Ok(current.generation)
    }
}

type StoreMap = HashMap<String, Collection>;

fn new_rev(generation: u64) -> String {
    format!("{generation}-{}", Uuid::new_v4().simple())
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn missing_collection(collection: &str) -> StoreError {
    StoreError::CollectionNotFound(collection.to_string())
}

/// Thread-safe in-memory document store.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state: clones share
/// the same collections.
///
/// Queries scan every document of a collection. Index definitions are recorded and
/// reported back but do not change how queries run. Long-poll and continuous feeds
/// are answered immediately with the changes available.
///
/// # Example
///
/// ```ignore
/// use docguard_memory::InMemoryStore;
/// use docguard_core::{backend::StoreBackend, document::JsonDoc};
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// let meta = store
///     .create_document("io.cozy.notes", JsonDoc::from_value(json!({ "title": "hi" }))?)
///     .await?;
/// let doc = store.get_document("io.cozy.notes", &meta.id).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> collection state
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for a store with pre-created collections.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Lists the names of existing collections, sorted.
    pub async fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.store.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc> {
        let store = self.store.read().await;
        let collection_state = store
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        collection_state
            .live(id)
            .map(|document| document.to_json_doc(id))
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))
    }

    async fn create_document(&self, collection: &str, document: JsonDoc) -> StoreResult<DocumentMeta> {
        let id = new_id();
        let mut store = self.store.write().await;

        let rev = store
            .entry(collection.to_string())
            .or_default()
            .write(&id, document.content(), 1, false);

        debug!(collection, %id, %rev, "document created");
        Ok(DocumentMeta { id, rev })
    }

    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        document: JsonDoc,
    ) -> StoreResult<String> {
        let mut store = self.store.write().await;
        let collection_state = store.entry(collection.to_string()).or_default();

        let generation = match collection_state.documents.get(id) {
            Some(existing) if !existing.deleted => {
                return Err(StoreError::Conflict(id.to_string(), collection.to_string()));
            }
            Some(tombstone) => tombstone.generation + 1,
            None => 1,
        };

        let rev = collection_state.write(id, document.content(), generation, false);

        debug!(collection, id, %rev, "document created with fixed id");
        Ok(rev)
    }

    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String> {
        let id = document
            .id()
            .ok_or_else(|| StoreError::InvalidDocument("missing _id".to_string()))?;

        let mut store = self.store.write().await;
        let collection_state = store
            .get_mut(collection)
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        let generation = collection_state.current_generation(collection, id, document.rev())?;
        let rev = collection_state.write(id, document.content(), generation + 1, false);

        debug!(collection, id, %rev, "document updated");
        Ok(rev)
    }

    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String> {
        let mut store = self.store.write().await;
        let collection_state = store
            .get_mut(collection)
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        let generation = collection_state.current_generation(collection, id, Some(rev))?;
        let tombstone = collection_state.write(id, Map::new(), generation + 1, true);

        debug!(collection, id, rev = %tombstone, "document deleted");
        Ok(tombstone)
    }

    async fn create_collection(&self, collection: &str) -> StoreResult<()> {
        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default();

        Ok(())
    }

    async fn define_index(&self, collection: &str, definition: Value) -> StoreResult<Value> {
        let index = match definition.get("index") {
            Some(index @ Value::Object(_)) => index.clone(),
            _ => {
                return Err(StoreError::InvalidQuery(
                    "index definition requires an 'index' object".to_string(),
                ));
            }
        };
        let requested_name = definition.get("name").and_then(Value::as_str);

        let mut store = self.store.write().await;
        let collection_state = store
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let existing = collection_state.indexes.iter().find(|existing| {
            existing.index == index && requested_name.is_none_or(|name| name == existing.name)
        });
        if let Some(existing) = existing {
            return IndexOutcome::to_value("exists", existing);
        }

        let hash = new_id();
        let created = IndexDefinition {
            id: format!("_design/{hash}"),
            name: requested_name.map(str::to_string).unwrap_or(hash),
            index,
        };
        debug!(collection, name = %created.name, "index defined");

        let response = IndexOutcome::to_value("created", &created)?;
        collection_state.indexes.push(created);

        Ok(response)
    }

    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>> {
        let query = MangoQuery::parse(&query)?;

        let store = self.store.read().await;
        let collection_state = store
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let mut matched = Vec::new();
        for (id, document) in &collection_state.documents {
            if !document.deleted && DocumentEvaluator::matches(&document.body, &query.selector)? {
                matched.push(document.to_json_doc(id));
            }
        }

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_by(&query.sort, &a.body, &b.body));
        }

        Ok(matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse> {
        let store = self.store.read().await;
        let collection_state = store
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        let since = match query.since.as_deref() {
            None | Some("") | Some("0") => 0,
            Some("now") => collection_state.last_seq,
            Some(cursor) => cursor.parse::<u64>().map_err(|_| {
                StoreError::InvalidQuery(format!("invalid since value '{cursor}'"))
            })?,
        };

        if query.feed != FeedMode::Normal {
            debug!(collection, feed = %query.feed, "answering feed with current changes");
        }

        let mut entries: Vec<(&String, &StoredDocument)> = collection_state
            .documents
            .iter()
            .filter(|(_, document)| document.seq > since)
            .collect();
        entries.sort_by_key(|(_, document)| document.seq);

        let total = entries.len();
        let limit = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);

        let results: Vec<Change> = entries
            .into_iter()
            .take(limit)
            .map(|(id, document)| Change {
                id: id.clone(),
                seq: document.seq.to_string(),
                changes: vec![ChangeRev {
                    rev: document.rev.clone(),
                }],
                deleted: document.deleted,
            })
            .collect();

        let last_seq = results
            .last()
            .map(|change| change.seq.clone())
            .unwrap_or_else(|| since.to_string());

        Ok(ChangesResponse {
            last_seq,
            pending: (total - results.len()) as u64,
            results,
        })
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docguard_memory::InMemoryStore;
/// use docguard_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_collection("io.cozy.notes")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<String>,
}

impl InMemoryStoreBuilder {
    /// Creates `collection` when the store is built.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for collection in &self.collections {
            store.create_collection(collection).await?;
        }

        Ok(store)
    }
}
