//! Extern mapping from the HuggingFace Imp checkpoint

use super::{ImpConfig, ImpForCausalLM};
use crate::ModelDefinition;
use paramap_common::Result;
use paramap_loader::{ExternMapping, MappingBuilder};
use paramap_quantization::{Quantization, QuantizeStrategy};
use tracing::debug;

/// Source name of a destination the explicit renames left over
fn checkpoint_name(name: &str) -> Option<String> {
    match name.split_once('.') {
        Some(("language_model", rest)) => Some(rest.to_string()),
        Some(("vision_tower", _)) => Some(format!("transformer.vision_tower.{name}")),
        _ => None,
    }
}

pub fn huggingface(config: &ImpConfig, quantization: &Quantization) -> Result<ExternMapping> {
    let model = ImpForCausalLM::new(config.clone());
    let params = model.named_parameters()?.cast_floats(quantization.model_dtype());
    let mut builder = MappingBuilder::new(&params);

    builder.add("language_model.transformer.embd.weight", "transformer.embd.wte.weight")?;
    for (dst, src) in [("linear_1", "0"), ("linear_2", "2")] {
        for param in ["bias", "weight"] {
            builder.add(
                format!("multi_modal_projector.{dst}.{param}"),
                format!("transformer.mm_projector.{src}.{param}"),
            )?;
        }
    }

    let swept = builder.fill_remaining(checkpoint_name)?;
    debug!(swept = swept.len(), "imp huggingface prefix sweep");
    builder.finish()
}
