//! Error types and result types for store and mediation operations.
//!
//! Two taxonomies live here:
//!
//! - [`StoreError`] is what a [`StoreBackend`](crate::backend::StoreBackend) reports.
//! - [`MediatorError`] is what callers of the [`DocumentMediator`](crate::mediator::DocumentMediator) see.
//!
//! Store errors are translated into mediator errors by a single `From` impl: "not found"
//! and "conflict" keep their meaning, everything else is passed through untouched as
//! [`MediatorError::StoreUnavailable`].

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::permission::Verb;

/// Errors reported by a document store backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The document does not exist, or has been deleted.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} not found in collection {1}")]
    DocumentNotFound(String, String),
    /// The addressed collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The supplied revision is not the current one, or the ID is already taken.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document update conflict on {0} in collection {1}")]
    Conflict(String, String),
    /// The changes feed mode is not one the store supports.
    #[error("Unsupported feed value '{0}'")]
    InvalidFeedMode(String),
    /// The changes feed style is not one the store supports.
    #[error("Unsupported style value '{0}'")]
    InvalidFeedStyle(String),
    /// A query, index definition or cursor the store could not interpret.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// HTTP status code matching this error.
    pub fn status(&self) -> u16 {
        match self {
            StoreError::DocumentNotFound(..) | StoreError::CollectionNotFound(_) => 404,
            StoreError::Conflict(..) => 409,
            StoreError::InvalidFeedMode(_)
            | StoreError::InvalidFeedStyle(_)
            | StoreError::InvalidQuery(_)
            | StoreError::InvalidDocument(_) => 400,
            StoreError::Serialization(_) => 500,
            StoreError::Backend(_) => 503,
        }
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for store backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned to callers of the mediator.
///
/// `InvalidCollection`, `Forbidden` and `InvalidRequest` are always detected before
/// the store is consulted. The remaining variants originate in the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediatorError {
    /// The addressed collection name is not acceptable.
    #[error("Invalid collection '{0}'")]
    InvalidCollection(String),
    /// The caller's grant on the collection does not include the required verb.
    #[error("Forbidden: {verb} is not granted on collection {collection}")]
    Forbidden { verb: Verb, collection: String },
    /// The request is malformed or contradicts itself.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The document, or the whole collection, does not exist.
    #[error("{}", describe_missing(.collection, .id))]
    NotFound {
        collection: String,
        id: Option<String>,
    },
    /// The revision supplied does not match the document's current revision.
    #[error("Document update conflict on {id} in collection {collection}")]
    Conflict { collection: String, id: String },
    /// Any other store failure, unmodified.
    #[error("Store error: {0}")]
    StoreUnavailable(#[source] StoreError),
}

fn describe_missing(collection: &str, id: &Option<String>) -> String {
    match id {
        Some(id) => format!("Document {id} not found in collection {collection}"),
        None => format!("Collection not found: {collection}"),
    }
}

impl MediatorError {
    /// HTTP status code a transport layer should answer with.
    pub fn status(&self) -> u16 {
        match self {
            MediatorError::InvalidCollection(_) | MediatorError::InvalidRequest(_) => 400,
            MediatorError::Forbidden { .. } => 403,
            MediatorError::NotFound { .. } => 404,
            MediatorError::Conflict { .. } => 409,
            MediatorError::StoreUnavailable(err) => err.status(),
        }
    }
}

impl From<StoreError> for MediatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DocumentNotFound(id, collection) => MediatorError::NotFound {
                collection,
                id: Some(id),
            },
            StoreError::CollectionNotFound(collection) => MediatorError::NotFound {
                collection,
                id: None,
            },
            StoreError::Conflict(id, collection) => MediatorError::Conflict { collection, id },
            other => MediatorError::StoreUnavailable(other),
        }
    }
}

/// A specialized `Result` type for mediated operations.
pub type MediatorResult<T> = Result<T, MediatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keeps_its_meaning() {
        let err = MediatorError::from(StoreError::DocumentNotFound("n1".into(), "notes".into()));

        assert_eq!(
            err,
            MediatorError::NotFound {
                collection: "notes".into(),
                id: Some("n1".into())
            }
        );
        assert_eq!(err.to_string(), "Document n1 not found in collection notes");
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn missing_collection_is_not_found() {
        let err = MediatorError::from(StoreError::CollectionNotFound("notes".into()));

        assert_eq!(err.to_string(), "Collection not found: notes");
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn conflict_keeps_its_meaning() {
        let err = MediatorError::from(StoreError::Conflict("n1".into(), "notes".into()));

        assert_eq!(
            err,
            MediatorError::Conflict {
                collection: "notes".into(),
                id: "n1".into()
            }
        );
        assert_eq!(err.status(), 409);
    }

    #[test]
    fn other_store_errors_pass_through() {
        let store_err = StoreError::Backend("connection reset".into());
        let err = MediatorError::from(store_err.clone());

        assert_eq!(err, MediatorError::StoreUnavailable(store_err));
        assert_eq!(err.status(), 503);
        assert_eq!(
            MediatorError::from(StoreError::InvalidQuery("bad selector".into())).status(),
            400
        );
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::from(json_err);

        assert!(matches!(err, StoreError::Serialization(_)));
        assert_eq!(err.status(), 500);
        assert_eq!(
            MediatorError::from(err.clone()),
            MediatorError::StoreUnavailable(err)
        );
    }

    #[test]
    fn forbidden_names_verb_and_collection() {
        let err = MediatorError::Forbidden {
            verb: Verb::Delete,
            collection: "notes".into(),
        };

        assert_eq!(
            err.to_string(),
            "Forbidden: DELETE is not granted on collection notes"
        );
        assert_eq!(err.status(), 403);
    }
}
