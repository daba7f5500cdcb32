//! Typed inputs of every mediated operation.
//!
//! The transport layer is responsible for turning an incoming request (path, headers,
//! query string, body) into one of these structs. They all derive `Deserialize` so that
//! step can be a plain serde call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::JsonDoc;

/// Read one document by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub collection: String,
    pub id: String,
}

impl FetchRequest {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Create a document with a store-assigned ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub collection: String,
    pub document: JsonDoc,
}

impl CreateRequest {
    pub fn new(collection: impl Into<String>, document: JsonDoc) -> Self {
        Self {
            collection: collection.into(),
            document,
        }
    }
}

/// Replace a document, or create it under a caller-chosen ID.
///
/// `id` is the ID addressed by the request path; the body may repeat it in `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub collection: String,
    pub id: String,
    pub document: JsonDoc,
}

impl UpsertRequest {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, document: JsonDoc) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            document,
        }
    }
}

/// Delete one revision of a document.
///
/// The revision may come from the `If-Match` header, the `rev` query parameter,
/// or both when they agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub collection: String,
    pub id: String,
    #[serde(default)]
    pub if_match: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
}

impl DeleteRequest {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            if_match: None,
            rev: None,
        }
    }

    /// Sets the raw `If-Match` header value.
    pub fn with_if_match(mut self, if_match: impl Into<String>) -> Self {
        self.if_match = Some(if_match.into());
        self
    }

    /// Sets the `rev` query parameter.
    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }
}

/// Define an index; the definition is handed to the store untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefineIndexRequest {
    pub collection: String,
    pub definition: Value,
}

impl DefineIndexRequest {
    pub fn new(collection: impl Into<String>, definition: Value) -> Self {
        Self {
            collection: collection.into(),
            definition,
        }
    }
}

/// Query documents; the query is handed to the store untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    pub collection: String,
    pub query: Value,
}

impl FindRequest {
    pub fn new(collection: impl Into<String>, query: Value) -> Self {
        Self {
            collection: collection.into(),
            query,
        }
    }
}

/// Read the changes feed.
///
/// `params` are the raw query parameters, in the order they were received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesRequest {
    pub collection: String,
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

impl ChangesRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            params: Vec::new(),
        }
    }

    /// Appends a raw query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}
