//! Imp: Phi-2 with a SigLIP vision tower

pub mod config;
pub mod loader;
pub mod model;

pub use config::{ImpConfig, SigLipVisionConfig};
pub use model::ImpForCausalLM;

use crate::quantize_model;
use paramap_common::{ParameterSet, Result};
use paramap_quantization::{Quantization, QuantizeMapping};

/// Instantiate Imp under `quantization`
pub fn quantize(config: &ImpConfig, quantization: &Quantization) -> Result<(ParameterSet, QuantizeMapping)> {
    quantize_model(&ImpForCausalLM::new(config.clone()), quantization)
}
