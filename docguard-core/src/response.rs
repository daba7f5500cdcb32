//! Outputs of the mediated operations that wrap store results.
//!
//! Fetch returns a [`JsonDoc`] directly, define-index and changes return what the
//! store produced; the envelopes below cover the remaining operations.

use serde::{Deserialize, Serialize};

use crate::document::JsonDoc;

/// Answer to a create or upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub ok: bool,
    pub id: String,
    pub rev: String,
    #[serde(rename = "type")]
    pub doctype: String,
    /// The stored document, with its new `_id`, `_rev` and `_type`.
    pub data: JsonDoc,
}

/// Answer to a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub id: String,
    /// Revision of the tombstone left behind.
    pub rev: String,
    #[serde(rename = "type")]
    pub doctype: String,
    pub deleted: bool,
}

/// Answer to a find.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<JsonDoc>,
}
