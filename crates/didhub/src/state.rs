//! Aggregate registry state: the admin set and the hierarchy.
//!
//! Records live in their own keyspace; this is everything else a registry
//! persists. A registry is initialized exactly when its state object exists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use didhub_core::Did;
use didhub_governance::AdminSet;
use didhub_sync::Route;

/// This registry's place among its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// Identifier this registry serves.
    pub self_id: Did,
    /// Registry this one was assigned by.
    pub parent_id: Did,
    /// Registries that mirror this one, in insertion order.
    pub children: Vec<Did>,
    /// Identifier to transport address.
    pub id_converter: BTreeMap<Did, String>,
}

impl Hierarchy {
    pub fn new(self_id: Did, parent_id: Did) -> Self {
        Self {
            self_id,
            parent_id,
            children: Vec::new(),
            id_converter: BTreeMap::new(),
        }
    }

    pub fn set_parent(&mut self, parent: Did) {
        self.parent_id = parent;
    }

    /// Add a child. Returns `false` if it was already present.
    pub fn add_child(&mut self, child: Did) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    /// Remove a child, keeping the order of the rest. Returns `false` if it
    /// was not present.
    pub fn remove_child(&mut self, child: &Did) -> bool {
        let before = self.children.len();
        self.children = std::mem::take(&mut self.children)
            .into_iter()
            .filter(|c| c != child)
            .collect();
        self.children.len() != before
    }

    pub fn has_child(&self, child: &Did) -> bool {
        self.children.contains(child)
    }

    /// Map an identifier to a transport address, returning the old one.
    pub fn set_converter(&mut self, id: Did, address: String) -> Option<String> {
        self.id_converter.insert(id, address)
    }

    pub fn converter(&self, id: &Did) -> Option<&str> {
        self.id_converter.get(id).map(String::as_str)
    }

    /// Fan-out route for a change in this registry.
    pub fn route<'a>(&'a self, contract: &'a str) -> Route<'a> {
        Route {
            self_id: &self.self_id,
            children: &self.children,
            converter: &self.id_converter,
            contract,
        }
    }
}

/// Everything a registry persists besides its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub admins: AdminSet,
    pub hierarchy: Hierarchy,
}

impl RegistryState {
    pub fn new(super_admin: Did, self_id: Did, parent_id: Did) -> Self {
        Self {
            admins: AdminSet::new(super_admin),
            hierarchy: Hierarchy::new(self_id, parent_id),
        }
    }
}
