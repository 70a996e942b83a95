//! Destination-to-source correspondence of one checkpoint format.
//!
//! An [`ExternMapping`] records, for every destination parameter, the
//! source tensors it is built from and the [`Combinator`] that builds it.
//! Source tensors the model deliberately drops are tracked separately; a
//! name is never both consumed and unused.

use crate::Combinator;
use indexmap::{IndexMap, IndexSet};
use paramap_common::{DataType, MappingError, ParameterSet, Result};
use serde::Serialize;

/// Recipe for one destination tensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub source_names: Vec<String>,
    pub combinator: Combinator,
    pub target_dtype: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExternMapping {
    entries: IndexMap<String, MappingEntry>,
    unused_source_names: IndexSet<String>,
    #[serde(skip)]
    consumed: IndexSet<String>,
}

impl ExternMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `destination`. Each destination may be registered once.
    pub fn add_mapping(
        &mut self,
        destination: impl Into<String>,
        source_names: Vec<String>,
        combinator: Combinator,
        target_dtype: DataType,
    ) -> Result<()> {
        let name = destination.into();
        if self.entries.contains_key(&name) {
            return Err(MappingError::DuplicateDestination { name }.into());
        }
        if source_names.is_empty() {
            return Err(MappingError::EmptySources { name }.into());
        }
        if combinator.arity() != source_names.len() {
            return Err(MappingError::ArityMismatch {
                name,
                expected: combinator.arity(),
                actual: source_names.len(),
            }
            .into());
        }
        if let Some(source) = source_names.iter().find(|s| self.unused_source_names.contains(*s)) {
            return Err(MappingError::UnusedConsumed { name: source.clone() }.into());
        }

        self.consumed.extend(source_names.iter().cloned());
        self.entries.insert(name, MappingEntry { source_names, combinator, target_dtype });
        Ok(())
    }

    /// Declare a source tensor that maps to nothing
    pub fn add_unused(&mut self, source_name: impl Into<String>) -> Result<()> {
        let name = source_name.into();
        if self.consumed.contains(&name) {
            return Err(MappingError::UnusedConsumed { name }.into());
        }
        self.unused_source_names.insert(name);
        Ok(())
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.entries.contains_key(destination)
    }

    pub fn get(&self, destination: &str) -> Option<&MappingEntry> {
        self.entries.get(destination)
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unused_source_names(&self) -> impl Iterator<Item = &str> {
        self.unused_source_names.iter().map(String::as_str)
    }

    /// Every source read by some entry
    pub fn consumed_source_names(&self) -> impl Iterator<Item = &str> {
        self.consumed.iter().map(String::as_str)
    }

    pub fn is_unused(&self, source_name: &str) -> bool {
        self.unused_source_names.contains(source_name)
    }

    /// Check the mapping covers `params` exactly
    pub fn validate_against(&self, params: &ParameterSet) -> Result<()> {
        let missing: Vec<String> =
            params.names().filter(|name| !self.entries.contains_key(*name)).map(str::to_string).collect();
        if !missing.is_empty() {
            return Err(MappingError::UnresolvedDestination { names: missing }.into());
        }
        if let Some(name) = self.entries.keys().find(|name| !params.contains(name)) {
            return Err(MappingError::UnknownDestination { name: name.clone() }.into());
        }
        Ok(())
    }
}
