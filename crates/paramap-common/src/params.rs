//! Declared parameters of a model definition.
//!
//! A [`ParameterSet`] is what a model definition exposes to the mapping
//! engine: an insertion-ordered table from destination name to the declared
//! shape and dtype. Quantization strategies rewrite it; loaders read it.

use crate::{DataType, ModelError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Role a parameter plays in its module.
///
/// Strategies use the role to decide what they may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Weight of a dense linear projection, `[out_features, in_features]`
    Linear,
    /// Embedding table, `[num_embeddings, dim]`
    Embedding,
    /// LayerNorm / RMSNorm gamma or beta
    Norm,
    /// Bias of a linear or convolution
    Bias,
    /// Convolution kernel
    Conv,
    /// Packed weight, scale or zero-point produced by a quantization strategy
    Quantized,
    Other,
}

/// Declared shape, dtype and role of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub shape: Vec<usize>,
    pub dtype: DataType,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DataType, kind: ParamKind) -> Self {
        Self { shape: shape.into(), dtype, kind }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Ordered map from destination name to [`ParamSpec`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: IndexMap<String, ParamSpec>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter. Names are unique.
    pub fn insert(&mut self, name: impl Into<String>, spec: ParamSpec) -> Result<()> {
        let name = name.into();
        if self.params.contains_key(&name) {
            return Err(ModelError::DuplicateParameter { name }.into());
        }
        self.params.insert(name, spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of elements across all parameters
    pub fn total_elements(&self) -> usize {
        self.params.values().map(ParamSpec::numel).sum()
    }

    /// Cast every floating-point parameter to `dtype`, the way a module is
    /// moved to a working precision. Integer parameters are left alone.
    pub fn cast_floats(mut self, dtype: DataType) -> Self {
        for spec in self.params.values_mut() {
            if spec.dtype.is_float() {
                spec.dtype = dtype;
            }
        }
        self
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, ParamSpec);
    type IntoIter = indexmap::map::IntoIter<String, ParamSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}
