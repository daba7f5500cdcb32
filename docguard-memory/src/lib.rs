//! In-memory document store backend for docguard.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It is meant for development, tests and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Revisions** - `{generation}-{hex}` revisions with optimistic concurrency checks
//! - **Mango queries** - A CouchDB-style `selector` subset with `sort`, `skip` and `limit`
//! - **Changes feed** - Per-collection sequences, tombstones included
//!
//! # Quick Start
//!
//! ```ignore
//! use docguard::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .with_collection("io.cozy.notes")
//!         .build()
//!         .await?;
//!     let mediator = DocumentMediator::new(backend);
//!
//!     let result = mediator
//!         .fetch(&PermissionSet::all(), FetchRequest::new("io.cozy.notes", "missing"))
//!         .await;
//!     assert!(result.is_err());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docguard_memory;

pub mod evaluator;
pub mod selector;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
