//! Record of how a quantization strategy decomposed each parameter.
//!
//! A [`QuantizeMapping`] is keyed by the pre-quantization destination name
//! (`...qkv_proj.weight`). Each [`QuantizeRule`] lists the artifacts that
//! replaced it in the parameter set and carries the [`QuantizeOp`] that
//! derives both their shapes and their data from the dense weight.

use crate::{ActivationStats, AwqQuantize, GroupQuantize};
use candle_core::Tensor;
use indexmap::IndexMap;
use paramap_common::{DataType, MappingError, QuantizationError, Result};
use serde::Serialize;

/// One tensor produced by quantizing a dense parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantizedArtifact {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DataType,
}

/// The quantization operator of one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QuantizeOp {
    GroupQuant(GroupQuantize),
    Awq(AwqQuantize),
}

impl QuantizeOp {
    /// Artifacts this operator produces for a weight of `shape` living under
    /// module path `module` (the name without its trailing `.weight`)
    pub fn artifacts(&self, module: &str, shape: &[usize]) -> Result<Vec<QuantizedArtifact>> {
        match self {
            QuantizeOp::GroupQuant(q) => q.artifacts(module, shape),
            QuantizeOp::Awq(q) => q.artifacts(module, shape),
        }
    }

    /// Quantize one dense weight, artifacts in [`QuantizeOp::artifacts`] order.
    /// Only AWQ uses `activations`.
    pub fn quantize(&self, weight: &Tensor, activations: Option<&[f32]>) -> Result<Vec<Tensor>> {
        match self {
            QuantizeOp::GroupQuant(q) => q.quantize_weight(weight),
            QuantizeOp::Awq(q) => q.quantize_weight(weight, activations),
        }
    }

    pub fn uses_activations(&self) -> bool {
        matches!(self, QuantizeOp::Awq(_))
    }
}

/// Decomposition of one dense parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantizeRule {
    pub source_shape: Vec<usize>,
    pub source_dtype: DataType,
    pub artifacts: Vec<QuantizedArtifact>,
    pub op: QuantizeOp,
}

impl QuantizeRule {
    /// Quantize `weight` and check every output against the declared artifacts
    pub fn apply(&self, name: &str, weight: &Tensor) -> Result<Vec<(String, Tensor)>> {
        self.apply_with_stats(name, weight, &ActivationStats::new())
    }

    /// [`QuantizeRule::apply`] with the calibration statistics recorded for `name`
    pub fn apply_with_stats(
        &self,
        name: &str,
        weight: &Tensor,
        stats: &ActivationStats,
    ) -> Result<Vec<(String, Tensor)>> {
        if weight.dims() != self.source_shape.as_slice() {
            return Err(MappingError::ShapeMismatch {
                name: name.to_string(),
                expected: self.source_shape.clone(),
                actual: weight.dims().to_vec(),
            }
            .into());
        }

        let outputs = self.op.quantize(weight, stats.get(name))?;
        if outputs.len() != self.artifacts.len() {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!(
                    "{name}: operator produced {} tensors for {} artifacts",
                    outputs.len(),
                    self.artifacts.len()
                ),
            }
            .into());
        }

        self.artifacts
            .iter()
            .zip(outputs)
            .map(|(artifact, tensor)| {
                if tensor.dims() != artifact.shape.as_slice() {
                    return Err(MappingError::ShapeMismatch {
                        name: artifact.name.clone(),
                        expected: artifact.shape.clone(),
                        actual: tensor.dims().to_vec(),
                    }
                    .into());
                }
                let actual = DataType::from_candle(tensor.dtype())?;
                if actual != artifact.dtype {
                    return Err(MappingError::DtypeMismatch {
                        name: artifact.name.clone(),
                        expected: artifact.dtype.to_string(),
                        actual: actual.to_string(),
                    }
                    .into());
                }
                Ok((artifact.name.clone(), tensor))
            })
            .collect()
    }
}

/// Destination name → [`QuantizeRule`], filled by a strategy's rewrite
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuantizeMapping {
    rules: IndexMap<String, QuantizeRule>,
}

impl QuantizeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, rule: QuantizeRule) -> Result<()> {
        let name = name.into();
        if self.rules.contains_key(&name) {
            return Err(MappingError::DuplicateDestination { name }.into());
        }
        self.rules.insert(name, rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&QuantizeRule> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Artifact names `name` decomposes into
    pub fn artifact_names(&self, name: &str) -> Option<Vec<&str>> {
        self.rules.get(name).map(|rule| rule.artifacts.iter().map(|a| a.name.as_str()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuantizeRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
