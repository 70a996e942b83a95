//! Parameter layout of the Imp model definition

use super::config::{ImpConfig, SigLipVisionConfig};
use crate::ModelDefinition;
use crate::layers::ParamScope;
use paramap_common::{DataType, ParameterSet, Result};

pub struct ImpForCausalLM {
    config: ImpConfig,
    dtype: DataType,
}

impl ImpForCausalLM {
    pub fn new(config: ImpConfig) -> Self {
        Self { config, dtype: DataType::Float32 }
    }

    pub fn config(&self) -> &ImpConfig {
        &self.config
    }
}

fn phi2(scope: &mut ParamScope<'_>, config: &ImpConfig) -> Result<()> {
    let hidden = config.n_embd;
    let qkv_out = (config.n_head + 2 * config.kv_heads()) * config.head_dim();

    let mut transformer = scope.pp("transformer");
    transformer.embedding("embd", config.vocab_size, hidden)?;
    for i in 0..config.n_layer {
        let mut layer = transformer.pp(format!("h.{i}"));
        layer.layer_norm("ln", hidden)?;
        let mut mixer = layer.pp("mixer");
        mixer.linear("Wqkv", hidden, qkv_out, true)?;
        mixer.linear("out_proj", config.n_head * config.head_dim(), hidden, true)?;
        let mut mlp = layer.pp("mlp");
        mlp.linear("fc1", hidden, config.intermediate_size(), true)?;
        mlp.linear("fc2", config.intermediate_size(), hidden, true)?;
    }

    let mut head = scope.pp("lm_head");
    head.layer_norm("ln", hidden)?;
    head.linear("linear", hidden, config.vocab_size, true)
}

fn siglip(scope: &mut ParamScope<'_>, vision: &SigLipVisionConfig) -> Result<()> {
    let hidden = vision.hidden_size;
    let mut model = scope.pp("vision_model");

    let mut embeddings = model.pp("embeddings");
    embeddings.conv2d("patch_embedding", vision.num_channels, hidden, vision.patch_size, true)?;
    embeddings.embedding("position_embedding", vision.num_patches(), hidden)?;

    for i in 0..vision.num_hidden_layers {
        let mut layer = model.pp(format!("encoder.layers.{i}"));
        let mut attn = layer.pp("self_attn");
        for proj in ["k_proj", "v_proj", "q_proj", "out_proj"] {
            attn.linear(proj, hidden, hidden, true)?;
        }
        layer.layer_norm("layer_norm1", hidden)?;
        let mut mlp = layer.pp("mlp");
        mlp.linear("fc1", hidden, vision.intermediate_size, true)?;
        mlp.linear("fc2", vision.intermediate_size, hidden, true)?;
        layer.layer_norm("layer_norm2", hidden)?;
    }
    Ok(())
}

impl ModelDefinition for ImpForCausalLM {
    fn named_parameters(&self) -> Result<ParameterSet> {
        let config = &self.config;
        let mut params = ParameterSet::new();
        let mut root = ParamScope::root(&mut params, self.dtype);
        phi2(&mut root.pp("language_model"), config)?;
        siglip(&mut root.pp("vision_tower"), &config.vision_config)?;

        let mut projector = root.pp("multi_modal_projector");
        projector.linear("linear_1", config.mm_hidden_size(), config.n_embd, true)?;
        projector.linear("linear_2", config.n_embd, config.n_embd, true)?;
        Ok(params)
    }
}
