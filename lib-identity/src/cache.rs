//! Identity cache
//!
//! A name- and location-indexed set of known identities. One cache is shared
//! read-mostly by all documents an owner holds; entries are added at
//! initialization or when a new participant's key is learned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Identity, IdentityError, IdentityResult};

/// Known identities, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityCache {
    idents: BTreeMap<String, Identity>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an identity. A fresh entry with a signing key never
    /// gets downgraded by a later verify-only copy of the same name.
    pub fn insert(&mut self, identity: Identity) {
        match self.idents.get(identity.name()) {
            Some(existing) if existing.can_sign() && !identity.can_sign() => {}
            _ => {
                self.idents.insert(identity.name().to_string(), identity);
            }
        }
    }

    pub fn by_name(&self, name: &str) -> IdentityResult<&Identity> {
        self.idents
            .get(name)
            .ok_or_else(|| IdentityError::UnknownIdentity(name.to_string()))
    }

    pub fn by_location(&self, location: &str) -> IdentityResult<&Identity> {
        self.idents
            .values()
            .find(|i| i.location() == location)
            .ok_or_else(|| IdentityError::UnknownLocation(location.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.idents.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.idents.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.idents.values()
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }

    /// Absorb every entry of another cache.
    pub fn sync_from(&mut self, other: &IdentityCache) {
        for ident in other.iter() {
            self.insert(ident.clone());
        }
    }
}
