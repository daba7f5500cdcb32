//! A scripted backend that records every call it receives.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    backend::StoreBackend,
    changes::{ChangesQuery, ChangesResponse},
    document::{DocumentMeta, JsonDoc},
    error::{StoreError, StoreResult},
};

/// Revision the stub treats as current when updating.
pub(crate) const CURRENT_REV: &str = "1-current";

#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    document: Option<JsonDoc>,
    missing_collection: AtomicUsize,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Document returned by reads and queries.
    pub(crate) fn with_document(mut self, document: JsonDoc) -> Self {
        self.document = Some(document);
        self
    }

    /// Number of times `define_index` reports the collection as missing.
    pub(crate) fn with_missing_collection(self, times: usize) -> Self {
        self.missing_collection.store(times, Ordering::SeqCst);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StoreBackend for RecordingBackend {
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc> {
        self.record(format!("get_document {collection} {id}"));
        self.document
            .clone()
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))
    }

    async fn create_document(&self, collection: &str, _document: JsonDoc) -> StoreResult<DocumentMeta> {
        self.record(format!("create_document {collection}"));
        Ok(DocumentMeta {
            id: "generated-id".to_string(),
            rev: "1-created".to_string(),
        })
    }

    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        _document: JsonDoc,
    ) -> StoreResult<String> {
        self.record(format!("create_document_with_id {collection} {id}"));
        Ok("1-fixed".to_string())
    }

    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String> {
        let id = document.id().unwrap_or_default();
        let rev = document.rev().unwrap_or_default();
        self.record(format!("update_document {collection} {id} {rev}"));

        if rev == CURRENT_REV {
            Ok("2-updated".to_string())
        } else {
            Err(StoreError::Conflict(id.to_string(), collection.to_string()))
        }
    }

    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String> {
        self.record(format!("delete_document {collection} {id} {rev}"));
        Ok("2-tombstone".to_string())
    }

    async fn create_collection(&self, collection: &str) -> StoreResult<()> {
        self.record(format!("create_collection {collection}"));
        Ok(())
    }

    async fn define_index(&self, collection: &str, _definition: Value) -> StoreResult<Value> {
        self.record(format!("define_index {collection}"));

        let missing = self
            .missing_collection
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if missing {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        Ok(json!({ "result": "created" }))
    }

    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>> {
        self.record(format!("find_documents {collection} {query}"));
        Ok(self.document.iter().cloned().collect())
    }

    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse> {
        self.record(format!("get_changes {collection} {query:?}"));
        Ok(ChangesResponse {
            last_seq: "7".to_string(),
            pending: 0,
            results: Vec::new(),
        })
    }
}
