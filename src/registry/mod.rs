//! Live oxy registry: the mutable name → handler map shared by sessions.
//!
//! The registry is read-mostly; mutation goes through [`Registry::register`]
//! and [`Registry::unregister`] only. `resolve` hands out the `Arc`'d entry,
//! which gives snapshot-at-dispatch semantics for free: a hop that resolved
//! its handler keeps that handler even if the name is replaced or removed
//! mid-flight.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{MasError, Result};
use crate::oxy::Oxy;

/// What a registered unit can do.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Agent,
    Tool,
}

/// One registered oxy.
pub struct RegistryEntry {
    pub name: String,
    pub capability: Capability,
    pub handler: Arc<dyn Oxy>,
    pub registered_at: DateTime<Utc>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

/// Process-shared oxy space.
///
/// All methods take `&self`; interior mutability keeps `register`
/// linearizable with respect to `resolve` (a resolve that starts after a
/// register returns always observes the new entry, and never a torn one).
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or atomically replace) a handler under `name`.
    ///
    /// Last write wins. Turns that already resolved the previous handler
    /// keep running it to completion.
    pub fn register(
        &self,
        name: impl Into<String>,
        capability: Capability,
        handler: Arc<dyn Oxy>,
    ) {
        let name = name.into();
        let entry = Arc::new(RegistryEntry {
            name: name.clone(),
            capability,
            handler,
            registered_at: Utc::now(),
        });
        let replaced = self
            .entries
            .write()
            .expect("registry lock poisoned")
            .insert(name.clone(), entry)
            .is_some();
        tracing::debug!(name = %name, capability = %capability, replaced, "oxy registered");
    }

    /// Remove a name from the registry. Returns whether it was present.
    ///
    /// Hops already dispatched with the removed handler are unaffected.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .entries
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .is_some();
        tracing::debug!(name = %name, removed, "oxy unregistered");
        removed
    }

    /// Resolve a name to its current entry snapshot.
    pub fn resolve(&self, name: &str) -> Result<Arc<RegistryEntry>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| MasError::UnknownRecipient(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Registered names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Entry snapshots for all oxys with the given capability.
    pub fn entries_with_capability(&self, capability: Capability) -> Vec<Arc<RegistryEntry>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|e| e.capability == capability)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}
