//! Untyped JSON documents and their addressing metadata.
//!
//! A [`JsonDoc`] is a JSON object body plus the name of the collection it belongs to.
//! The store never persists the collection name inside the body; the mediator attaches
//! it on the way out, where it is written as the `_type` key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Body key holding the document identifier.
pub const ID_KEY: &str = "_id";
/// Body key holding the document revision.
pub const REV_KEY: &str = "_rev";

/// An untyped document as exchanged with the store.
///
/// # Example
///
/// ```ignore
/// use docguard_core::document::JsonDoc;
/// use serde_json::json;
///
/// let doc = JsonDoc::from_value(json!({ "_id": "n1", "_rev": "1-abc", "title": "hello" }))?;
/// assert_eq!(doc.id(), Some("n1"));
/// assert_eq!(doc.rev(), Some("1-abc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonDoc {
    /// Collection the document belongs to. Empty until attached by the mediator.
    #[serde(rename = "_type", default, skip_serializing_if = "String::is_empty")]
    pub doctype: String,
    /// The JSON object body, `_id` and `_rev` included when known.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl JsonDoc {
    /// Creates a document from an object body.
    pub fn new(body: Map<String, Value>) -> Self {
        Self {
            doctype: String::new(),
            body,
        }
    }

    /// Creates a document from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the value is not a JSON object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(body) => Ok(Self::new(body)),
            other => Err(StoreError::InvalidDocument(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Returns the document identifier, if the body carries a non-empty one.
    pub fn id(&self) -> Option<&str> {
        self.string_field(ID_KEY)
    }

    /// Returns the document revision, if the body carries a non-empty one.
    pub fn rev(&self) -> Option<&str> {
        self.string_field(REV_KEY)
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.body.insert(ID_KEY.to_string(), Value::String(id.into()));
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.body.insert(REV_KEY.to_string(), Value::String(rev.into()));
    }

    /// Attaches the collection name, builder style.
    pub fn with_doctype(mut self, doctype: impl Into<String>) -> Self {
        self.doctype = doctype.into();
        self
    }

    /// Returns the body without its `_id` and `_rev` keys.
    pub fn content(&self) -> Map<String, Value> {
        self.body
            .iter()
            .filter(|(key, _)| key.as_str() != ID_KEY && key.as_str() != REV_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Identifier and revision assigned by the store to a newly created document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub rev: String,
}

/// Addresses one revision of a document within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            rev: None,
        }
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_id_and_rev_from_body() {
        let doc = JsonDoc::from_value(json!({ "_id": "n1", "_rev": "2-ab", "title": "x" })).unwrap();

        assert_eq!(doc.id(), Some("n1"));
        assert_eq!(doc.rev(), Some("2-ab"));
    }

    #[test]
    fn empty_id_counts_as_absent() {
        let doc = JsonDoc::from_value(json!({ "_id": "", "title": "x" })).unwrap();

        assert_eq!(doc.id(), None);
        assert_eq!(doc.rev(), None);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            JsonDoc::from_value(json!([1, 2])),
            Err(StoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn doctype_is_written_as_type_key() {
        let mut doc = JsonDoc::from_value(json!({ "title": "x" })).unwrap().with_doctype("notes");
        doc.set_id("n1");

        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({ "_type": "notes", "_id": "n1", "title": "x" })
        );
    }

    #[test]
    fn untyped_document_has_no_type_key() {
        let doc = JsonDoc::from_value(json!({ "title": "x" })).unwrap();

        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({ "title": "x" }));
    }

    #[test]
    fn content_drops_metadata() {
        let doc = JsonDoc::from_value(json!({ "_id": "n1", "_rev": "1-a", "title": "x" })).unwrap();

        assert_eq!(Value::Object(doc.content()), json!({ "title": "x" }));
    }
}
