//! Read access to the tensors of a source checkpoint

use candle_core::Tensor;
use indexmap::IndexMap;
use paramap_common::{MappingError, Result};

/// A checkpoint that can hand out tensors by name
pub trait TensorSource {
    fn load(&self, name: &str) -> Result<Tensor>;

    fn contains(&self, name: &str) -> bool;
}

/// Tensors held in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tensors: IndexMap<String, Tensor>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl TensorSource for InMemorySource {
    fn load(&self, name: &str) -> Result<Tensor> {
        self.tensors
            .get(name)
            .cloned()
            .ok_or_else(|| MappingError::MissingSource { name: name.to_string() }.into())
    }

    fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        Self { tensors: iter.into_iter().map(|(name, tensor)| (name.into(), tensor)).collect() }
    }
}
