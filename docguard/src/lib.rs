//! Main docguard crate: permission-checked access to a JSON document database.
//!
//! This crate is the entry point for users of docguard. It re-exports the core types
//! and provides access to the bundled storage backend.
//!
//! # Features
//!
//! - **Verb-based permissions** - `GET`, `POST`, `PUT`, `PATCH` and `DELETE` grants per collection
//! - **Mediation** - Every store operation is authorized and validated before it reaches the store
//! - **Pluggable stores** - Any [`StoreBackend`](backend::StoreBackend) can sit behind the mediator
//! - **Changes feeds** - Validated, cursor-paginated change queries
//!
//! # Quick Start
//!
//! ```ignore
//! use docguard::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mediator = DocumentMediator::new(InMemoryStore::builder().build().await?);
//!
//!     // What the caller was granted, typically loaded from its token or session
//!     let grants = GrantTable::from_json_str(r#"{ "io.cozy.notes": "GET,POST" }"#)?;
//!
//!     let created = mediator
//!         .create(
//!             &grants,
//!             CreateRequest::new("io.cozy.notes", JsonDoc::from_value(json!({ "title": "hello" }))?),
//!         )
//!         .await?;
//!
//!     let fetched = mediator
//!         .fetch(&grants, FetchRequest::new("io.cozy.notes", created.id))
//!         .await?;
//!     println!("fetched {:?}", fetched);
//!
//!     // Not granted: rejected before the store is consulted
//!     let denied = mediator
//!         .delete(&grants, DeleteRequest::new("io.cozy.notes", "n1").with_rev("1-abc"))
//!         .await;
//!     assert_eq!(denied.unwrap_err().status(), 403);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! Backends are also usable as trait objects, for stores chosen at runtime:
//!
//! ```ignore
//! use std::sync::Arc;
//! use docguard::{prelude::*, memory::InMemoryStore};
//!
//! let backend: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
//! let mediator = DocumentMediator::new(backend);
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use docguard_core::{backend, changes, document, error, grants, mediator, permission, request, response};

// Re-export serde_json, documents and queries are JSON values
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docguard_memory::{InMemoryStore, InMemoryStoreBuilder};
}
