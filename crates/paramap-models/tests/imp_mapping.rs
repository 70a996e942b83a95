//! Mapping scenarios for the Imp family

use paramap_models::imp::{self, ImpConfig, ImpForCausalLM};
use paramap_models::{ModelConfig, ModelDefinition};
use paramap_quantization::{Quantization, QuantizeStrategy};
use serde_json::json;

fn config() -> ImpConfig {
    ImpConfig::from_value(json!({
        "n_embd": 32,
        "n_layer": 2,
        "n_head": 4,
        "vocab_size": 64,
        "vision_config": {
            "hidden_size": 16,
            "image_size": 28,
            "patch_size": 14,
            "intermediate_size": 32,
            "num_attention_heads": 2,
            "num_hidden_layers": 1
        }
    }))
    .unwrap()
}

#[test]
fn parameter_layout() {
    let params = ImpForCausalLM::new(config()).named_parameters().unwrap();
    let shape = |name: &str| params.get(name).unwrap().shape.clone();
    assert_eq!(shape("language_model.transformer.embd.weight"), vec![64, 32]);
    assert_eq!(shape("language_model.transformer.h.1.mixer.Wqkv.weight"), vec![96, 32]);
    assert_eq!(shape("language_model.transformer.h.1.mlp.fc1.weight"), vec![128, 32]);
    assert_eq!(shape("language_model.lm_head.linear.bias"), vec![64]);
    assert_eq!(shape("vision_tower.vision_model.embeddings.patch_embedding.weight"), vec![16, 3, 14, 14]);
    assert_eq!(shape("vision_tower.vision_model.embeddings.position_embedding.weight"), vec![4, 16]);
    assert_eq!(shape("multi_modal_projector.linear_1.weight"), vec![32, 16]);
    assert!(!params.contains("vision_tower.vision_model.post_layernorm.weight"));
}

#[test]
fn huggingface_renames() {
    let quantization = Quantization::from_name("q4f16_1").unwrap();
    let mapping = imp::loader::huggingface(&config(), &quantization).unwrap();
    let source = |name: &str| mapping.get(name).unwrap().source_names[0].clone();

    assert_eq!(source("language_model.transformer.embd.weight"), "transformer.embd.wte.weight");
    assert_eq!(source("multi_modal_projector.linear_1.weight"), "transformer.mm_projector.0.weight");
    assert_eq!(source("multi_modal_projector.linear_2.bias"), "transformer.mm_projector.2.bias");
    assert_eq!(source("language_model.transformer.h.0.mixer.Wqkv.weight"), "transformer.h.0.mixer.Wqkv.weight");
    assert_eq!(source("language_model.lm_head.ln.weight"), "lm_head.ln.weight");
    assert_eq!(
        source("vision_tower.vision_model.encoder.layers.0.self_attn.q_proj.weight"),
        "transformer.vision_tower.vision_tower.vision_model.encoder.layers.0.self_attn.q_proj.weight"
    );
    assert_eq!(mapping.unused_source_names().count(), 0);
}

#[test]
fn quantize_entry_point_rewrites_final_fc_for_group_presets() {
    let (params, quant_map) = imp::quantize(&config(), &Quantization::from_name("q4f16_1").unwrap()).unwrap();
    assert!(params.contains("language_model.lm_head.linear.q_weight"));
    assert!(quant_map.contains("language_model.lm_head.linear.weight"));
    // biases and norms stay dense
    assert!(params.contains("language_model.lm_head.linear.bias"));

    let awq = Quantization::from_name("q4f16_awq").unwrap();
    let (params, _) = imp::quantize(&config(), &awq).unwrap();
    assert!(params.contains("language_model.lm_head.linear.weight"));
    assert_eq!(params.get("language_model.lm_head.linear.weight").unwrap().dtype, awq.model_dtype());
}
