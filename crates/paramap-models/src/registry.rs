//! Static table of supported model families.
//!
//! A family is found by its `model_type` and knows which checkpoint formats
//! it can map from and which quantization kinds it accepts.

use crate::config::ModelConfig;
use crate::{imp, phiva};
use paramap_common::{ModelError, ParamapError, ParameterSet, Result};
use paramap_loader::ExternMapping;
use paramap_quantization::{Quantization, QuantizationKind, QuantizeMapping, QuantizeStrategy};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Layout of the source checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Dense HuggingFace weights
    HuggingFace,
    /// Weights already quantized by AWQ
    Awq,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::HuggingFace => "huggingface",
            SourceFormat::Awq => "awq",
        }
    }

    /// Quantization kind a checkpoint in this format is already in
    pub fn required_quantization(&self) -> Option<QuantizationKind> {
        match self {
            SourceFormat::HuggingFace => None,
            SourceFormat::Awq => Some(QuantizationKind::Awq),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = ParamapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "huggingface" | "huggingface-torch" | "huggingface-safetensor" => Ok(SourceFormat::HuggingFace),
            "awq" => Ok(SourceFormat::Awq),
            other => Err(ParamapError::Config(format!("Unknown source format: {other}"))),
        }
    }
}

/// Everything needed to convert one checkpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConversionPlan {
    pub model_type: String,
    pub source_format: SourceFormat,
    pub quantization: Quantization,
    /// Parameters of the converted model, after quantization
    pub params: ParameterSet,
    pub extern_mapping: ExternMapping,
    /// Rules applied to mapped tensors; empty for already quantized sources
    pub quantize_mapping: QuantizeMapping,
}

type BuildFn = fn(&Value, SourceFormat, &Quantization) -> Result<(ParameterSet, QuantizeMapping, ExternMapping)>;

pub struct ModelFamily {
    pub name: &'static str,
    pub description: &'static str,
    pub source_formats: &'static [SourceFormat],
    pub quantization_kinds: &'static [QuantizationKind],
    build: BuildFn,
}

impl ModelFamily {
    pub fn supports_source(&self, format: SourceFormat) -> bool {
        self.source_formats.contains(&format)
    }

    pub fn supports_quantization(&self, kind: QuantizationKind) -> bool {
        self.quantization_kinds.contains(&kind)
    }
}

impl fmt::Debug for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFamily")
            .field("name", &self.name)
            .field("source_formats", &self.source_formats)
            .field("quantization_kinds", &self.quantization_kinds)
            .finish()
    }
}

fn build_phiva(
    value: &Value,
    source: SourceFormat,
    quantization: &Quantization,
) -> Result<(ParameterSet, QuantizeMapping, ExternMapping)> {
    let config = phiva::PhivaConfig::from_value(value.clone())?;
    let (params, quant_map) = phiva::quantize(&config, quantization)?;
    match source {
        SourceFormat::HuggingFace => {
            Ok((params, quant_map, phiva::loader::huggingface(&config, quantization)?))
        }
        SourceFormat::Awq => {
            Ok((params, QuantizeMapping::new(), phiva::loader::awq(&config, quantization)?))
        }
    }
}

fn build_imp(
    value: &Value,
    source: SourceFormat,
    quantization: &Quantization,
) -> Result<(ParameterSet, QuantizeMapping, ExternMapping)> {
    let config = imp::ImpConfig::from_value(value.clone())?;
    let (params, quant_map) = imp::quantize(&config, quantization)?;
    match source {
        SourceFormat::HuggingFace => Ok((params, quant_map, imp::loader::huggingface(&config, quantization)?)),
        SourceFormat::Awq => Err(ModelError::UnsupportedSource {
            model_type: "imp".to_string(),
            format: source.to_string(),
        }
        .into()),
    }
}

const ALL_KINDS: &[QuantizationKind] =
    &[QuantizationKind::NoQuant, QuantizationKind::GroupQuant, QuantizationKind::Awq];

pub static MODELS: &[ModelFamily] = &[
    ModelFamily {
        name: "phiva",
        description: "Phi-3 language model with a CLIP vision tower",
        source_formats: &[SourceFormat::HuggingFace, SourceFormat::Awq],
        quantization_kinds: ALL_KINDS,
        build: build_phiva,
    },
    ModelFamily {
        name: "imp",
        description: "Phi-2 language model with a SigLIP vision tower",
        source_formats: &[SourceFormat::HuggingFace],
        quantization_kinds: ALL_KINDS,
        build: build_imp,
    },
];

pub fn lookup(model_type: &str) -> Result<&'static ModelFamily> {
    MODELS
        .iter()
        .find(|family| family.name == model_type)
        .ok_or_else(|| ModelError::UnknownModelType { model_type: model_type.to_string() }.into())
}

/// Build the parameter set, extern mapping and quantize mapping for one
/// checkpoint of `model_type` described by `config` (its `config.json`).
pub fn plan(
    model_type: &str,
    config: &Value,
    source_format: SourceFormat,
    quantization: &Quantization,
) -> Result<ConversionPlan> {
    let family = lookup(model_type)?;
    if !family.supports_source(source_format) {
        return Err(ModelError::UnsupportedSource {
            model_type: model_type.to_string(),
            format: source_format.to_string(),
        }
        .into());
    }
    let kind = quantization.kind();
    let required = source_format.required_quantization();
    if !family.supports_quantization(kind) || required.is_some_and(|r| r != kind) {
        return Err(ModelError::UnsupportedQuantization {
            model_type: format!("{model_type} from {source_format}"),
            kind: kind.to_string(),
        }
        .into());
    }

    let (params, quantize_mapping, extern_mapping) = (family.build)(config, source_format, quantization)?;
    info!(
        model_type,
        source = %source_format,
        quantization = quantization.name(),
        params = params.len(),
        entries = extern_mapping.len(),
        "planned conversion"
    );
    Ok(ConversionPlan {
        model_type: model_type.to_string(),
        source_format,
        quantization: quantization.clone(),
        params,
        extern_mapping,
        quantize_mapping,
    })
}
