//! Parameter layout of the Phiva model definition

use super::config::{ClipVisionConfig, Phi3TextConfig, PhivaConfig};
use crate::ModelDefinition;
use crate::layers::ParamScope;
use paramap_common::{DataType, ParamKind, ParameterSet, Result};

pub struct PhivaForCausalLM {
    config: PhivaConfig,
    dtype: DataType,
}

impl PhivaForCausalLM {
    pub fn new(config: PhivaConfig) -> Self {
        Self { config, dtype: DataType::Float32 }
    }

    pub fn config(&self) -> &PhivaConfig {
        &self.config
    }
}

fn phi3(scope: &mut ParamScope<'_>, text: &Phi3TextConfig) -> Result<()> {
    let hidden = text.hidden_size;
    let head_dim = text.head_dim();
    let qkv_out = (text.num_attention_heads + 2 * text.kv_heads()) * head_dim;

    let mut transformer = scope.pp("transformer");
    transformer.embedding("embd", text.vocab_size, hidden)?;
    for i in 0..text.num_hidden_layers {
        let mut layer = transformer.pp(format!("h.{i}"));
        layer.rms_norm("ln", hidden)?;
        let mut mixer = layer.pp("mixer");
        mixer.linear("qkv_proj", hidden, qkv_out, false)?;
        mixer.linear("out_proj", text.num_attention_heads * head_dim, hidden, false)?;
        layer.rms_norm("post_attention_layernorm", hidden)?;
        let mut mlp = layer.pp("mlp");
        mlp.linear("gate_up_proj", hidden, 2 * text.intermediate_size, false)?;
        mlp.linear("down_proj", text.intermediate_size, hidden, false)?;
    }
    transformer.rms_norm("norm", hidden)?;
    scope.linear("lm_head", hidden, text.vocab_size, false)
}

fn clip(scope: &mut ParamScope<'_>, vision: &ClipVisionConfig) -> Result<()> {
    let hidden = vision.hidden_size;
    let mut model = scope.pp("vision_model");

    let mut embeddings = model.pp("embeddings");
    embeddings.param("class_embedding", &[hidden], ParamKind::Other)?;
    embeddings.conv2d("patch_embedding", vision.num_channels, hidden, vision.patch_size, false)?;
    embeddings.embedding("position_embedding", vision.num_positions(), hidden)?;

    model.layer_norm("pre_layrnorm", hidden)?;
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
    model.layer_norm("post_layernorm", hidden)
}

impl ModelDefinition for PhivaForCausalLM {
    fn named_parameters(&self) -> Result<ParameterSet> {
        let text = &self.config.text_config;
        let vision = &self.config.vision_config;

        let mut params = ParameterSet::new();
        let mut root = ParamScope::root(&mut params, self.dtype);
        phi3(&mut root.pp("language_model"), text)?;
        clip(&mut root.pp("vision_tower"), vision)?;

        let mut projector = root.pp("multi_modal_projector");
        projector.linear("linear_1", vision.hidden_size, text.hidden_size, true)?;
        projector.linear("linear_2", text.hidden_size, text.hidden_size, true)?;
        Ok(params)
    }
}
