//! Extern mappings from HuggingFace and AWQ checkpoints to Phiva parameters

use super::{PhivaConfig, PhivaForCausalLM};
use crate::{ModelDefinition, quantize_model};
use paramap_common::Result;
use paramap_loader::{ExternMapping, MappingBuilder};
use paramap_quantization::{Quantization, QuantizeStrategy};
use tracing::debug;

const PREFIX: &str = "language_model.transformer.h";
const HF_PREFIX: &str = "language_model.model.layers";
const AWQ_SUFFIXES: [&str; 3] = ["qweight", "qzeros", "scales"];

/// HuggingFace names of the top-level language model parameters
fn add_top_level(builder: &mut MappingBuilder<'_>) -> Result<()> {
    builder.add("language_model.lm_head.weight", "language_model.lm_head.weight")?;
    builder.add("language_model.transformer.norm.weight", "language_model.model.norm.weight")?;
    builder.add("language_model.transformer.embd.weight", "language_model.model.embed_tokens.weight")
}

/// Mapping from a dense HuggingFace checkpoint. Group quantization, when
/// requested, happens after mapping through the quantize mapping.
pub fn huggingface(config: &PhivaConfig, quantization: &Quantization) -> Result<ExternMapping> {
    let model = PhivaForCausalLM::new(config.clone());
    let params = model.named_parameters()?.cast_floats(quantization.model_dtype());
    let mut builder = MappingBuilder::new(&params);

    add_top_level(&mut builder)?;
    for i in 0..config.text_config.num_hidden_layers {
        let (dst, hf) = (format!("{PREFIX}.{i}"), format!("{HF_PREFIX}.{i}"));
        builder.add(format!("{dst}.ln.weight"), format!("{hf}.input_layernorm.weight"))?;
        builder.add(format!("{dst}.mlp.down_proj.weight"), format!("{hf}.mlp.down_proj.weight"))?;
        builder.add(format!("{dst}.mlp.gate_up_proj.weight"), format!("{hf}.mlp.gate_up_proj.weight"))?;
        builder.add(
            format!("{dst}.post_attention_layernorm.weight"),
            format!("{hf}.post_attention_layernorm.weight"),
        )?;
        builder.add(format!("{dst}.mixer.out_proj.weight"), format!("{hf}.self_attn.o_proj.weight"))?;
        builder.add(format!("{dst}.mixer.qkv_proj.weight"), format!("{hf}.self_attn.qkv_proj.weight"))?;
    }

    let swept = builder.fill_remaining(|name| Some(name.to_string()))?;
    debug!(swept = swept.len(), "phiva huggingface identity sweep");
    builder.finish()
}

/// Mapping from an AWQ checkpoint, where the attention and MLP projections
/// are stored unfused and already quantized.
pub fn awq(config: &PhivaConfig, quantization: &Quantization) -> Result<ExternMapping> {
    let model = PhivaForCausalLM::new(config.clone());
    let (params, _) = quantize_model(&model, quantization)?;
    let mut builder = MappingBuilder::new(&params);

    for i in 0..config.text_config.num_hidden_layers {
        let (dst, hf) = (format!("{PREFIX}.{i}"), format!("{HF_PREFIX}.{i}"));
        let attn = format!("{hf}.self_attn");
        let mlp = format!("{hf}.mlp");

        // packed tensors are [in, out / 8] and [groups, out], so fused outputs join along axis 1;
        // AWQ fits each output channel on its own, so this equals quantizing the fused weight
        for suffix in AWQ_SUFFIXES {
            builder.add_concat_along(
                format!("{dst}.mixer.qkv_proj.{suffix}"),
                ["q_proj", "k_proj", "v_proj"].map(|p| format!("{attn}.{p}.{suffix}")),
                1,
            )?;
            builder.add_concat_along(
                format!("{dst}.mlp.gate_up_proj.{suffix}"),
                ["gate_proj", "up_proj"].map(|p| format!("{mlp}.{p}.{suffix}")),
                1,
            )?;
            builder.add(format!("{dst}.mixer.out_proj.{suffix}"), format!("{attn}.o_proj.{suffix}"))?;
            builder.add(format!("{dst}.mlp.down_proj.{suffix}"), format!("{mlp}.down_proj.{suffix}"))?;
        }
        builder.add(format!("{dst}.ln.weight"), format!("{hf}.input_layernorm.weight"))?;
        builder.add(
            format!("{dst}.post_attention_layernorm.weight"),
            format!("{hf}.post_attention_layernorm.weight"),
        )?;

        builder.add_unused(format!("{attn}.rotary_emb.inv_freq"))?;
    }
    add_top_level(&mut builder)?;

    let swept = builder.fill_remaining(|name| Some(name.to_string()))?;
    debug!(swept = swept.len(), "phiva awq identity sweep");
    builder.finish()
}
