//! Resolving a caller's [`PermissionSet`] for a collection.
//!
//! How grants are issued and stored is outside this crate. A transport layer
//! resolves the caller first, then hands the mediator something implementing
//! [`Grants`] for the duration of the request.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use crate::permission::PermissionSet;

/// Looks up the permission set a caller holds on a collection.
///
/// Returning `None` means the caller holds no grant at all on that collection,
/// which the mediator treats as forbidden for every verb.
pub trait Grants {
    fn permissions_for(&self, collection: &str) -> Option<&PermissionSet>;
}

/// A single set applied to every collection.
impl Grants for PermissionSet {
    fn permissions_for(&self, _collection: &str) -> Option<&PermissionSet> {
        Some(self)
    }
}

impl<G: Grants + ?Sized> Grants for &G {
    fn permissions_for(&self, collection: &str) -> Option<&PermissionSet> {
        (**self).permissions_for(collection)
    }
}

impl<G: Grants + ?Sized> Grants for Box<G> {
    fn permissions_for(&self, collection: &str) -> Option<&PermissionSet> {
        (**self).permissions_for(collection)
    }
}

impl<G: Grants + ?Sized> Grants for Arc<G> {
    fn permissions_for(&self, collection: &str) -> Option<&PermissionSet> {
        (**self).permissions_for(collection)
    }
}

/// Per-collection grants, keyed by collection name.
///
/// The table deserializes from a JSON object whose values use either permission
/// set form:
///
/// ```ignore
/// let grants = GrantTable::from_json_str(r#"{
///     "io.cozy.notes": "ALL",
///     "io.cozy.files": ["GET", "POST"]
/// }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantTable {
    grants: BTreeMap<String, PermissionSet>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a grant table from its JSON representation.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Grants `permissions` on `collection`, replacing any previous grant.
    pub fn insert(&mut self, collection: impl Into<String>, permissions: PermissionSet) {
        self.grants.insert(collection.into(), permissions);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_grant(mut self, collection: impl Into<String>, permissions: PermissionSet) -> Self {
        self.insert(collection, permissions);
        self
    }

    /// Removes the grant on `collection`, returning it if there was one.
    pub fn revoke(&mut self, collection: &str) -> Option<PermissionSet> {
        self.grants.remove(collection)
    }

    /// Iterates collection names and their grants in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PermissionSet)> + '_ {
        self.grants
            .iter()
            .map(|(collection, permissions)| (collection.as_str(), permissions))
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl Grants for GrantTable {
    fn permissions_for(&self, collection: &str) -> Option<&PermissionSet> {
        self.grants.get(collection)
    }
}

impl<C: Into<String>> FromIterator<(C, PermissionSet)> for GrantTable {
    fn from_iter<I: IntoIterator<Item = (C, PermissionSet)>>(iter: I) -> Self {
        Self {
            grants: iter
                .into_iter()
                .map(|(collection, permissions)| (collection.into(), permissions))
                .collect(),
        }
    }
}
