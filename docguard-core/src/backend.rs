//! Storage backend abstraction for the mediator.
//!
//! This module defines the contract a document database must fulfil so the
//! [`DocumentMediator`](crate::mediator::DocumentMediator) can delegate to it. The
//! backend owns storage, indexing, the changes feed and optimistic concurrency: it is
//! the backend, not the mediator, that compares a supplied revision with the current one.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The operations the mediator consumes
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docguard_core::backend::StoreBackend;
//! use docguard_core::document::JsonDoc;
//! use serde_json::json;
//!
//! let backend = MyBackendImpl::new();
//!
//! let meta = backend
//!     .create_document("io.cozy.notes", JsonDoc::from_value(json!({ "title": "hi" }))?)
//!     .await?;
//! let doc = backend.get_document("io.cozy.notes", &meta.id).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

use crate::{
    changes::{ChangesQuery, ChangesResponse, FeedMode, FeedStyle},
    document::{DocumentMeta, JsonDoc},
    error::StoreResult,
};

/// Abstract interface for the document database behind the mediator.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the mediator shares one backend between
/// every request it serves, concurrently.
///
/// # Error Handling
///
/// Operations return [`StoreResult<T>`](crate::error::StoreResult). The mediator
/// relies on these variants in particular:
///
/// - [`StoreError::DocumentNotFound`](crate::error::StoreError::DocumentNotFound) for missing or deleted documents
/// - [`StoreError::CollectionNotFound`](crate::error::StoreError::CollectionNotFound) for missing collections
/// - [`StoreError::Conflict`](crate::error::StoreError::Conflict) for revision mismatches and taken IDs
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Retrieves the current revision of a document.
    ///
    /// The returned body carries `_id` and `_rev`.
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc>;

    /// Creates a document, letting the store choose its ID.
    ///
    /// # Returns
    ///
    /// The ID and first revision assigned by the store.
    async fn create_document(&self, collection: &str, document: JsonDoc) -> StoreResult<DocumentMeta>;

    /// Creates a document under a caller-chosen ID.
    ///
    /// Unlike [`update_document`](Self::update_document) this must not overwrite
    /// a live document: if `id` is taken the store reports a conflict.
    ///
    /// # Returns
    ///
    /// The first revision of the new document.
    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        document: JsonDoc,
    ) -> StoreResult<String>;

    /// Replaces a document.
    ///
    /// The body carries the `_id` and the `_rev` the caller based its change on.
    /// If that revision is not the current one the store reports a conflict.
    ///
    /// # Returns
    ///
    /// The new revision.
    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String>;

    /// Deletes the revision `rev` of a document.
    ///
    /// # Returns
    ///
    /// The revision of the tombstone left behind.
    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String>;

    /// Creates an empty collection.
    async fn create_collection(&self, collection: &str) -> StoreResult<()>;

    /// Defines an index from a raw definition.
    ///
    /// # Returns
    ///
    /// The store's own description of the outcome, passed back to the caller as is.
    async fn define_index(&self, collection: &str, definition: Value) -> StoreResult<Value>;

    /// Queries documents with a raw query.
    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>>;

    /// Validates a `feed` parameter value.
    ///
    /// The default implementation accepts the modes of [`FeedMode`], an empty value
    /// meaning [`FeedMode::Normal`]. Stores supporting fewer modes should override it.
    fn validate_feed_mode(&self, feed: &str) -> StoreResult<FeedMode> {
        feed.parse()
    }

    /// Validates a `style` parameter value.
    ///
    /// The default implementation accepts the styles of [`FeedStyle`], an empty value
    /// meaning [`FeedStyle::MainOnly`].
    fn validate_feed_style(&self, style: &str) -> StoreResult<FeedStyle> {
        style.parse()
    }

    /// Reads the changes feed of a collection.
    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc> {
        (**self).get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, document: JsonDoc) -> StoreResult<DocumentMeta> {
        (**self).create_document(collection, document).await
    }

    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        document: JsonDoc,
    ) -> StoreResult<String> {
        (**self)
            .create_document_with_id(collection, id, document)
            .await
    }

    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String> {
        (**self).update_document(collection, document).await
    }

    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String> {
        (**self).delete_document(collection, id, rev).await
    }

    async fn create_collection(&self, collection: &str) -> StoreResult<()> {
        (**self).create_collection(collection).await
    }

    async fn define_index(&self, collection: &str, definition: Value) -> StoreResult<Value> {
        (**self).define_index(collection, definition).await
    }

    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>> {
        (**self).find_documents(collection, query).await
    }

    fn validate_feed_mode(&self, feed: &str) -> StoreResult<FeedMode> {
        (**self).validate_feed_mode(feed)
    }

    fn validate_feed_style(&self, style: &str) -> StoreResult<FeedStyle> {
        (**self).validate_feed_style(style)
    }

    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse> {
        (**self).get_changes(collection, query).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc> {
        (**self).get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, document: JsonDoc) -> StoreResult<DocumentMeta> {
        (**self).create_document(collection, document).await
    }

    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        document: JsonDoc,
    ) -> StoreResult<String> {
        (**self)
            .create_document_with_id(collection, id, document)
            .await
    }

    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String> {
        (**self).update_document(collection, document).await
    }

    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String> {
        (**self).delete_document(collection, id, rev).await
    }

    async fn create_collection(&self, collection: &str) -> StoreResult<()> {
        (**self).create_collection(collection).await
    }

    async fn define_index(&self, collection: &str, definition: Value) -> StoreResult<Value> {
        (**self).define_index(collection, definition).await
    }

    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>> {
        (**self).find_documents(collection, query).await
    }

    fn validate_feed_mode(&self, feed: &str) -> StoreResult<FeedMode> {
        (**self).validate_feed_mode(feed)
    }

    fn validate_feed_style(&self, style: &str) -> StoreResult<FeedStyle> {
        (**self).validate_feed_style(style)
    }

    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse> {
        (**self).get_changes(collection, query).await
    }
}

#[async_trait]
impl<B> StoreBackend for Box<B>
where
    B: StoreBackend + ?Sized,
{
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<JsonDoc> {
        (**self).get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, document: JsonDoc) -> StoreResult<DocumentMeta> {
        (**self).create_document(collection, document).await
    }

    async fn create_document_with_id(
        &self,
        collection: &str,
        id: &str,
        document: JsonDoc,
    ) -> StoreResult<String> {
        (**self)
            .create_document_with_id(collection, id, document)
            .await
    }

    async fn update_document(&self, collection: &str, document: JsonDoc) -> StoreResult<String> {
        (**self).update_document(collection, document).await
    }

    async fn delete_document(&self, collection: &str, id: &str, rev: &str) -> StoreResult<String> {
        (**self).delete_document(collection, id, rev).await
    }

    async fn create_collection(&self, collection: &str) -> StoreResult<()> {
        (**self).create_collection(collection).await
    }

    async fn define_index(&self, collection: &str, definition: Value) -> StoreResult<Value> {
        (**self).define_index(collection, definition).await
    }

    async fn find_documents(&self, collection: &str, query: Value) -> StoreResult<Vec<JsonDoc>> {
        (**self).find_documents(collection, query).await
    }

    fn validate_feed_mode(&self, feed: &str) -> StoreResult<FeedMode> {
        (**self).validate_feed_mode(feed)
    }

    fn validate_feed_style(&self, style: &str) -> StoreResult<FeedStyle> {
        (**self).validate_feed_style(style)
    }

    async fn get_changes(&self, collection: &str, query: &ChangesQuery) -> StoreResult<ChangesResponse> {
        (**self).get_changes(collection, query).await
    }
}

/// Factory trait for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
