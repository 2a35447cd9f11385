//! Type Registry
//!
//! Maps each resource kind to its wire type name. Registrations happen at
//! startup; lookups happen on every call from any task, so the table is a
//! concurrent map keyed by the spec type's `TypeId`.

use crate::error::{Error, Result};
use crate::resource::ResourceSpec;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

/// A single registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Local kind label
    pub label: &'static str,
    /// Wire type name
    pub wire_name: Arc<str>,
}

/// Concurrent kind → wire name table
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: DashMap<TypeId, Registration>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a registry holding every kind shipped with the crate
    pub fn with_builtin_kinds() -> Arc<Self> {
        let registry = Self::default();
        crate::kinds::register_builtin(&registry);
        Arc::new(registry)
    }

    /// Register `S` under `wire_name`, replacing any earlier registration
    pub fn register<S: ResourceSpec>(&self, wire_name: impl Into<String>) -> Result<()> {
        let wire_name: String = wire_name.into();
        if wire_name.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "empty wire type name for kind {}",
                S::LABEL
            )));
        }

        debug!(kind = S::LABEL, wire_name = %wire_name, "registering resource kind");
        self.entries.insert(
            TypeId::of::<S>(),
            Registration {
                label: S::LABEL,
                wire_name: Arc::from(wire_name),
            },
        );
        Ok(())
    }

    /// Register `S` under its declared `WIRE_TYPE`
    pub fn register_kind<S: ResourceSpec>(&self) {
        debug!(kind = S::LABEL, wire_name = S::WIRE_TYPE, "registering resource kind");
        self.entries.insert(
            TypeId::of::<S>(),
            Registration {
                label: S::LABEL,
                wire_name: Arc::from(S::WIRE_TYPE),
            },
        );
    }

    /// Wire type name of `S`
    pub fn wire_name<S: ResourceSpec>(&self) -> Result<Arc<str>> {
        self.entries
            .get(&TypeId::of::<S>())
            .map(|entry| entry.wire_name.clone())
            .ok_or(Error::NotRegistered { kind: S::LABEL })
    }

    pub fn is_registered<S: ResourceSpec>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<S>())
    }

    /// Sorted `(label, wire name)` snapshot
    pub fn registered(&self) -> Vec<Registration> {
        let mut all: Vec<Registration> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.label.cmp(b.label));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
