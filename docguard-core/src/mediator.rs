//! Permission-checked mediation between callers and a document store.
//!
//! Every operation runs the same pipeline:
//!
//! 1. the collection name is validated,
//! 2. the caller's [`PermissionSet`](crate::permission::PermissionSet) for the collection must
//!    contain the verb the operation requires,
//! 3. operation-specific invariants are checked (IDs, revisions, feed parameters),
//! 4. the operation is delegated to the [`StoreBackend`] and store errors are translated.
//!
//! Steps 1 to 3 never touch the store. The mediator keeps no state between requests,
//! so a single instance can serve any number of them concurrently.
//!
//! # Example
//!
//! ```ignore
//! use docguard_core::{mediator::DocumentMediator, grants::GrantTable, request::CreateRequest};
//!
//! let mediator = DocumentMediator::new(backend);
//! let grants = GrantTable::from_json_str(r#"{ "io.cozy.notes": "GET,POST" }"#)?;
//!
//! let created = mediator
//!     .create(&grants, CreateRequest::new("io.cozy.notes", doc))
//!     .await?;
//! println!("created {} at {}", created.id, created.rev);
//! ```

use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::{
    backend::StoreBackend,
    changes::{ChangesQuery, ChangesResponse},
    document::{DocumentRef, JsonDoc},
    error::{MediatorError, MediatorResult, StoreError},
    grants::Grants,
    permission::Verb,
    request::{
        ChangesRequest, CreateRequest, DefineIndexRequest, DeleteRequest, FetchRequest,
        FindRequest, UpsertRequest,
    },
    response::{DeleteResponse, FindResponse, MutationResponse},
};

/// The operations the mediator exposes, one entry point each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Create,
    Upsert,
    Delete,
    DefineIndex,
    Find,
    Changes,
}

impl Operation {
    /// The verb a caller must hold on the collection to run this operation.
    pub fn required_verb(&self) -> Verb {
        match self {
            Operation::Fetch | Operation::Find | Operation::Changes => Verb::Get,
            Operation::Create | Operation::DefineIndex => Verb::Post,
            Operation::Upsert => Verb::Put,
            Operation::Delete => Verb::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
            Operation::DefineIndex => "define_index",
            Operation::Find => "find",
            Operation::Changes => "changes",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorizes requests and forwards them to a [`StoreBackend`].
///
/// # Type Parameters
///
/// * `B` - The backend implementation type. References, `Arc` and `Box` of a
///   backend (including `dyn StoreBackend`) are backends too.
#[derive(Debug, Clone)]
pub struct DocumentMediator<B: StoreBackend> {
    backend: B,
    heal_missing_collections: bool,
}

impl<B: StoreBackend> DocumentMediator<B> {
    /// Creates a mediator with the default settings.
    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    /// Creates a builder for a mediator with custom settings.
    pub fn builder(backend: B) -> DocumentMediatorBuilder<B> {
        DocumentMediatorBuilder::new(backend)
    }

    /// Returns the backend requests are delegated to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validates the collection name, then checks the caller's grant on it.
    fn admit(&self, grants: &impl Grants, collection: &str, operation: Operation) -> MediatorResult<()> {
        if collection.is_empty() {
            return Err(MediatorError::InvalidCollection(collection.to_string()));
        }

        let verb = operation.required_verb();
        let allowed = grants
            .permissions_for(collection)
            .is_some_and(|permissions| permissions.contains(verb));

        if allowed {
            debug!(collection, operation = %operation, verb = %verb, "access granted");
            Ok(())
        } else {
            warn!(collection, operation = %operation, verb = %verb, "access denied");
            Err(MediatorError::Forbidden {
                verb,
                collection: collection.to_string(),
            })
        }
    }

    /// Reads a document by ID.
    ///
    /// The returned document carries the collection name as its `_type`.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `GET` on the collection
    /// - [`MediatorError::NotFound`] if the document or the collection does not exist
    pub async fn fetch(&self, grants: &impl Grants, request: FetchRequest) -> MediatorResult<JsonDoc> {
        let FetchRequest { collection, id } = request;

        self.admit(grants, &collection, Operation::Fetch)?;
        require_id(&id)?;

        debug!(%collection, %id, "fetching document");
        let document = self
            .backend
            .get_document(&collection, &id)
            .await?;

        Ok(document.with_doctype(collection))
    }

    /// Creates a document under a store-assigned ID.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `POST` on the collection
    /// - [`MediatorError::InvalidRequest`] if the body already carries an `_id`
    pub async fn create(
        &self,
        grants: &impl Grants,
        request: CreateRequest,
    ) -> MediatorResult<MutationResponse> {
        let CreateRequest {
            collection,
            mut document,
        } = request;

        self.admit(grants, &collection, Operation::Create)?;

        if document.id().is_some() {
            return Err(MediatorError::InvalidRequest(
                "cannot create a document with _id".to_string(),
            ));
        }

        debug!(%collection, "creating document");
        let meta = self
            .backend
            .create_document(&collection, document.clone())
            .await?;

        document.set_id(meta.id.clone());
        document.set_rev(meta.rev.clone());

        Ok(MutationResponse {
            ok: true,
            id: meta.id,
            rev: meta.rev,
            doctype: collection.clone(),
            data: document.with_doctype(collection),
        })
    }

    /// Replaces a document, or creates it under the ID addressed by the request.
    ///
    /// The body must carry both `_id` and `_rev` (an update, checked against the
    /// current revision by the store) or neither (a create with a fixed ID).
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `PUT` on the collection
    /// - [`MediatorError::InvalidRequest`] if only one of `_id` and `_rev` is present,
    ///   or if `_id` differs from the addressed ID
    /// - [`MediatorError::Conflict`] if the store rejects the revision or the ID is taken
    pub async fn upsert(
        &self,
        grants: &impl Grants,
        request: UpsertRequest,
    ) -> MediatorResult<MutationResponse> {
        let UpsertRequest {
            collection,
            id,
            mut document,
        } = request;

        self.admit(grants, &collection, Operation::Upsert)?;
        require_id(&id)?;

        let create_with_id = match (document.id(), document.rev()) {
            (None, None) => true,
            (Some(body_id), Some(_)) if body_id == id => false,
            (Some(_), Some(_)) => {
                return Err(MediatorError::InvalidRequest(
                    "document _id doesn't match url".to_string(),
                ));
            }
            _ => {
                return Err(MediatorError::InvalidRequest(
                    "provide both _id and _rev in the document (update) or neither (create with fixed id)"
                        .to_string(),
                ));
            }
        };

        let rev = if create_with_id {
            debug!(%collection, %id, "creating document with fixed id");
            document.set_id(id.clone());
            self.backend
                .create_document_with_id(&collection, &id, document.clone())
                .await?
        } else {
            debug!(%collection, %id, "updating document");
            self.backend
                .update_document(&collection, document.clone())
                .await?
        };

        document.set_rev(rev.clone());

        Ok(MutationResponse {
            ok: true,
            id,
            rev,
            doctype: collection.clone(),
            data: document.with_doctype(collection),
        })
    }

    /// Deletes a document revision and returns the tombstone revision.
    ///
    /// The revision comes from the `If-Match` header, the `rev` query parameter,
    /// or both when they agree.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `DELETE` on the collection
    /// - [`MediatorError::InvalidRequest`] without a revision, or with two different ones
    /// - [`MediatorError::Conflict`] if the revision is not the current one
    pub async fn delete(
        &self,
        grants: &impl Grants,
        request: DeleteRequest,
    ) -> MediatorResult<DeleteResponse> {
        self.admit(grants, &request.collection, Operation::Delete)?;
        require_id(&request.id)?;

        let target = delete_target(request)?;
        let rev = target.rev.as_deref().unwrap_or_default();

        debug!(collection = %target.collection, id = %target.id, rev, "deleting document");
        let tombstone = self
            .backend
            .delete_document(&target.collection, &target.id, rev)
            .await?;

        Ok(DeleteResponse {
            ok: true,
            id: target.id,
            rev: tombstone,
            doctype: target.collection,
            deleted: true,
        })
    }

    /// Defines an index on the collection, creating the collection if it is missing.
    ///
    /// When the store reports the collection does not exist, the collection is created
    /// and the definition retried once. Any other failure, or a second failure of the
    /// retried definition, is returned as is.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `POST` on the collection
    pub async fn define_index(
        &self,
        grants: &impl Grants,
        request: DefineIndexRequest,
    ) -> MediatorResult<Value> {
        let DefineIndexRequest {
            collection,
            definition,
        } = request;

        self.admit(grants, &collection, Operation::DefineIndex)?;

        debug!(%collection, "defining index");
        match self
            .backend
            .define_index(&collection, definition.clone())
            .await
        {
            Err(StoreError::CollectionNotFound(_)) if self.heal_missing_collections => {
                info!(%collection, "collection missing, creating it before retrying the index");
                self.backend.create_collection(&collection).await?;

                Ok(self
                    .backend
                    .define_index(&collection, definition)
                    .await?)
            }
            result => Ok(result?),
        }
    }

    /// Queries documents; the query is passed to the store verbatim.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `GET` on the collection
    pub async fn find(&self, grants: &impl Grants, request: FindRequest) -> MediatorResult<FindResponse> {
        let FindRequest { collection, query } = request;

        self.admit(grants, &collection, Operation::Find)?;

        debug!(%collection, "finding documents");
        let docs = self
            .backend
            .find_documents(&collection, query)
            .await?;

        Ok(FindResponse {
            docs: docs
                .into_iter()
                .map(|doc| doc.with_doctype(collection.as_str()))
                .collect(),
        })
    }

    /// Reads the changes feed of the collection.
    ///
    /// Only the `feed`, `style`, `since` and `limit` parameters are accepted. When a
    /// parameter is repeated, its first value is used.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::Forbidden`] without `GET` on the collection
    /// - [`MediatorError::InvalidRequest`] for an unknown parameter, a feed or style the
    ///   store rejects, or a limit that is not a non-negative integer
    pub async fn changes(
        &self,
        grants: &impl Grants,
        request: ChangesRequest,
    ) -> MediatorResult<ChangesResponse> {
        self.admit(grants, &request.collection, Operation::Changes)?;

        let query = self.changes_query(&request.params)?;

        debug!(
            collection = %request.collection,
            feed = %query.feed,
            style = %query.style,
            since = ?query.since,
            limit = ?query.limit,
            "reading changes feed"
        );
        Ok(self
            .backend
            .get_changes(&request.collection, &query)
            .await?)
    }

    fn changes_query(&self, params: &[(String, String)]) -> MediatorResult<ChangesQuery> {
        let mut feed = None;
        let mut style = None;
        let mut since = None;
        let mut limit = None;

        for (name, value) in params {
            let slot = match name.as_str() {
                "feed" => &mut feed,
                "style" => &mut style,
                "since" => &mut since,
                "limit" => &mut limit,
                _ => {
                    return Err(MediatorError::InvalidRequest(format!(
                        "unsupported query parameter '{name}'"
                    )));
                }
            };
            if slot.is_none() {
                *slot = Some(value.as_str());
            }
        }

        let feed = self
            .backend
            .validate_feed_mode(feed.unwrap_or_default())
            .map_err(|err| MediatorError::InvalidRequest(err.to_string()))?;
        let style = self
            .backend
            .validate_feed_style(style.unwrap_or_default())
            .map_err(|err| MediatorError::InvalidRequest(err.to_string()))?;
        let limit = match limit.filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                MediatorError::InvalidRequest(format!("invalid limit value '{raw}'"))
            })?),
            None => None,
        };

        Ok(ChangesQuery {
            feed,
            style,
            since: since
                .filter(|cursor| !cursor.is_empty())
                .map(str::to_string),
            limit,
        })
    }
}

fn require_id(id: &str) -> MediatorResult<()> {
    if id.is_empty() {
        return Err(MediatorError::InvalidRequest("missing document id".to_string()));
    }

    Ok(())
}

/// Strips the quotes of an entity tag: `"1-abc"` becomes `1-abc`.
fn entity_tag(value: &str) -> &str {
    let value = value.trim();

    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Resolves which revision a delete addresses.
fn delete_target(request: DeleteRequest) -> MediatorResult<DocumentRef> {
    let DeleteRequest {
        collection,
        id,
        if_match,
        rev,
    } = request;

    let header = if_match
        .as_deref()
        .map(entity_tag)
        .filter(|rev| !rev.is_empty());
    let query = rev.as_deref().filter(|rev| !rev.is_empty());

    let rev = match (header, query) {
        (Some(header), Some(query)) if header != query => {
            return Err(MediatorError::InvalidRequest(
                "If-Match header and rev query parameter mismatch".to_string(),
            ));
        }
        (Some(rev), _) | (None, Some(rev)) => rev.to_string(),
        (None, None) => {
            return Err(MediatorError::InvalidRequest(
                "delete without revision".to_string(),
            ));
        }
    };

    Ok(DocumentRef::new(collection, id).with_rev(rev))
}

/// Builder for constructing [`DocumentMediator`] instances.
///
/// # Example
///
/// ```ignore
/// let mediator = DocumentMediator::builder(backend)
///     .with_index_heal(false)
///     .build();
/// ```
#[derive(Debug)]
pub struct DocumentMediatorBuilder<B: StoreBackend> {
    backend: B,
    heal_missing_collections: bool,
}

impl<B: StoreBackend> DocumentMediatorBuilder<B> {
    /// Creates a builder with the default settings.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            heal_missing_collections: true,
        }
    }

    /// Whether defining an index on a missing collection creates the collection and
    /// retries once. Enabled by default.
    pub fn with_index_heal(mut self, enabled: bool) -> Self {
        self.heal_missing_collections = enabled;
        self
    }

    /// Builds and returns the final [`DocumentMediator`].
    pub fn build(self) -> DocumentMediator<B> {
        DocumentMediator {
            backend: self.backend,
            heal_missing_collections: self.heal_missing_collections,
        }
    }
}
