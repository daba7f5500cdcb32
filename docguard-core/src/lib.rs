//! Permission-checked access to a JSON document database.
//!
//! This crate is the core of the docguard project and provides:
//!
//! - **Permission verbs** ([`permission`]) - The verb model and the [`PermissionSet`](permission::PermissionSet) grant type
//! - **Grant resolution** ([`grants`]) - Resolving a caller's permission set for a collection
//! - **Documents** ([`document`]) - Untyped JSON documents addressed by id and revision
//! - **Changes feed types** ([`changes`]) - Feed modes, styles and validated change queries
//! - **Requests and responses** ([`request`], [`response`]) - Typed inputs and outputs of every operation
//! - **Store backend abstraction** ([`backend`]) - The contract a document database must fulfil
//! - **Mediation** ([`mediator`]) - Authorization, invariant checks and store delegation
//! - **Error handling** ([`error`]) - Store and caller-facing error taxonomies
//!
//! # Example
//!
//! ```ignore
//! use docguard_core::{mediator::DocumentMediator, permission::{PermissionSet, Verb}, request::FetchRequest};
//!
//! let mediator = DocumentMediator::new(backend);
//! let grants = PermissionSet::from_verbs([Verb::Get]);
//!
//! let doc = mediator
//!     .fetch(&grants, FetchRequest::new("io.cozy.notes", "note-1"))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docguard_core;

pub mod backend;
pub mod changes;
pub mod document;
pub mod error;
pub mod grants;
pub mod mediator;
pub mod permission;
pub mod request;
pub mod response;

#[cfg(test)]
pub(crate) mod testing;
