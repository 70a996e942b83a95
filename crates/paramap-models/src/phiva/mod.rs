//! Phiva: Phi-3 with a CLIP vision tower

pub mod config;
pub mod loader;
pub mod model;

pub use config::{ClipVisionConfig, Phi3TextConfig, PhivaConfig};
pub use model::PhivaForCausalLM;

use crate::quantize_model;
use paramap_common::{ParameterSet, Result};
use paramap_quantization::{Quantization, QuantizeMapping};

/// Instantiate Phiva under `quantization`
pub fn quantize(config: &PhivaConfig, quantization: &Quantization) -> Result<(ParameterSet, QuantizeMapping)> {
    quantize_model(&PhivaForCausalLM::new(config.clone()), quantization)
}
