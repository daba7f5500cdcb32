//! Convenient re-exports of commonly used types from docguard.
//!
//! ```ignore
//! use docguard::prelude::*;
//! ```
//!
//! This provides access to:
//! - Permission verbs, sets and grant tables
//! - The mediator, its requests and responses
//! - Documents and changes feed types
//! - Store backends and builders
//! - Error types

pub use docguard_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    changes::{Change, ChangeRev, ChangesQuery, ChangesResponse, FeedMode, FeedStyle},
    document::{DocumentMeta, DocumentRef, JsonDoc},
    error::{MediatorError, MediatorResult, StoreError, StoreResult},
    grants::{GrantTable, Grants},
    mediator::{DocumentMediator, DocumentMediatorBuilder, Operation},
    permission::{PermissionSet, Verb},
    request::{
        ChangesRequest, CreateRequest, DefineIndexRequest, DeleteRequest, FetchRequest,
        FindRequest, UpsertRequest,
    },
    response::{DeleteResponse, FindResponse, MutationResponse},
};
