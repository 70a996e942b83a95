//! Quantization strategies for paramap parameter sets
//!
//! This crate provides the strategies that rewrite a model's declared
//! parameters into their quantized form:
//! - NoQuantize: leaves the parameter set untouched
//! - GroupQuantize: symmetric per-group integer quantization with packed storage
//! - AwqQuantize: activation-aware asymmetric quantization in the AWQ layout
//!
//! Every rewrite records a [`QuantizeRule`] per replaced weight in a
//! [`QuantizeMapping`], which the conversion driver later uses to turn
//! dense tensors into the declared artifacts.

use paramap_common::{DataType, ParamKind, ParamSpec, ParameterSet, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

pub mod awq;
pub mod group;
pub mod mapping;
pub mod no_quant;
pub mod presets;
pub mod stats;
pub mod utils;

pub use awq::AwqQuantize;
pub use group::{GroupQuantize, WeightLayout};
pub use mapping::{QuantizeMapping, QuantizeOp, QuantizeRule, QuantizedArtifact};
pub use no_quant::NoQuantize;
pub use presets::{PRESET_NAMES, preset};
pub use stats::ActivationStats;

/// Family a strategy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuantizationKind {
    NoQuant,
    GroupQuant,
    Awq,
}

impl QuantizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantizationKind::NoQuant => "no-quant",
            QuantizationKind::GroupQuant => "group-quant",
            QuantizationKind::Awq => "awq",
        }
    }
}

impl fmt::Display for QuantizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy that rewrites a parameter set into its quantized form
pub trait QuantizeStrategy {
    /// Preset name, e.g. `q4f16_1`
    fn name(&self) -> &str;

    fn kind(&self) -> QuantizationKind;

    /// Working precision of the unquantized parameters
    fn model_dtype(&self) -> DataType;

    /// Replace the weights this strategy quantizes with their artifacts and
    /// record one rule per replaced weight in `quant_map`. Only names under
    /// `prefix` are considered.
    fn rewrite(
        &self,
        params: ParameterSet,
        quant_map: &mut QuantizeMapping,
        prefix: &str,
    ) -> Result<ParameterSet>;
}

/// Any supported strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Quantization {
    NoQuant(NoQuantize),
    #[serde(rename = "group-quant")]
    Group(GroupQuantize),
    Awq(AwqQuantize),
}

impl Quantization {
    /// Look up a named preset
    pub fn from_name(name: &str) -> Result<Self> {
        preset(name)
    }

    /// One-line description used by listings
    pub fn summary(&self) -> String {
        let head = format!("{} kind={} dtype={}", self.name(), self.kind(), self.model_dtype());
        match self {
            Quantization::NoQuant(_) => head,
            Quantization::Group(q) => format!(
                "{head} bits={} group={} layout={:?} embedding={} final_fc={}",
                q.bits, q.group_size, q.linear_weight_layout, q.quantize_embedding, q.quantize_final_fc
            ),
            Quantization::Awq(q) => format!(
                "{head} bits={} group={} final_fc={} clip_grid={}",
                q.bits, q.group_size, q.quantize_final_fc, q.clip_grid
            ),
        }
    }

    fn strategy(&self) -> &dyn QuantizeStrategy {
        match self {
            Quantization::NoQuant(q) => q,
            Quantization::Group(q) => q,
            Quantization::Awq(q) => q,
        }
    }
}

impl QuantizeStrategy for Quantization {
    fn name(&self) -> &str {
        self.strategy().name()
    }

    fn kind(&self) -> QuantizationKind {
        self.strategy().kind()
    }

    fn model_dtype(&self) -> DataType {
        self.strategy().model_dtype()
    }

    fn rewrite(
        &self,
        params: ParameterSet,
        quant_map: &mut QuantizeMapping,
        prefix: &str,
    ) -> Result<ParameterSet> {
        self.strategy().rewrite(params, quant_map, prefix)
    }
}

/// Shared rewrite loop of the weight-replacing strategies.
///
/// Walks `params` in order. A `{m}.weight` under `prefix` for which `select`
/// holds is replaced in place by the artifacts `decompose` returns for module
/// `m`; everything else is carried over unchanged.
pub(crate) fn rewrite_parameters<S, D>(
    params: ParameterSet,
    quant_map: &mut QuantizeMapping,
    prefix: &str,
    select: S,
    decompose: D,
) -> Result<ParameterSet>
where
    S: Fn(&str, &ParamSpec) -> bool,
    D: Fn(&str, &ParamSpec) -> Result<(Vec<QuantizedArtifact>, QuantizeOp)>,
{
    let before = params.len();
    let mut rewritten = ParameterSet::new();
    let mut replaced = 0usize;

    for (name, spec) in params {
        if !(name.starts_with(prefix) && name.ends_with(".weight") && select(&name, &spec)) {
            rewritten.insert(name, spec)?;
            continue;
        }

        let module = &name[..name.len() - ".weight".len()];
        let (artifacts, op) = decompose(module, &spec)?;
        debug!(weight = %name, artifacts = artifacts.len(), "quantizing parameter");
        for artifact in &artifacts {
            rewritten.insert(
                artifact.name.clone(),
                ParamSpec::new(artifact.shape.clone(), artifact.dtype, ParamKind::Quantized),
            )?;
        }
        quant_map.insert(
            name.clone(),
            QuantizeRule { source_shape: spec.shape, source_dtype: spec.dtype, artifacts, op },
        )?;
        replaced += 1;
    }

    info!(replaced, before, after = rewritten.len(), "rewrote parameter set");
    Ok(rewritten)
}
