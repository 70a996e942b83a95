//! Model families supported by paramap
//!
//! Each family provides a validated configuration, the parameter layout of
//! its model definition and one extern-mapping loader per source checkpoint
//! format. The [`registry`] ties them together by `model_type`.

use paramap_common::{ParameterSet, Result};
use paramap_quantization::{Quantization, QuantizeMapping, QuantizeStrategy};
use tracing::info;

pub mod config;
pub mod imp;
pub mod layers;
pub mod phiva;
pub mod registry;

pub use config::ModelConfig;
pub use registry::{ConversionPlan, ModelFamily, SourceFormat, lookup, plan};

/// A model definition that can enumerate its parameters
pub trait ModelDefinition {
    /// Declared parameters, in definition order, at the definition's dtype
    fn named_parameters(&self) -> Result<ParameterSet>;
}

/// Instantiate `model` under `quantization`: cast to the strategy's working
/// dtype, then let the strategy rewrite the parameter set.
pub fn quantize_model<M>(model: &M, quantization: &Quantization) -> Result<(ParameterSet, QuantizeMapping)>
where
    M: ModelDefinition + ?Sized,
{
    let params = model.named_parameters()?.cast_floats(quantization.model_dtype());
    let mut quant_map = QuantizeMapping::new();
    let params = quantization.rewrite(params, &mut quant_map, "")?;
    info!(
        quantization = quantization.name(),
        params = params.len(),
        rules = quant_map.len(),
        "instantiated model"
    );
    Ok((params, quant_map))
}
