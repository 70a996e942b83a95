//! Model registry lookups and plan construction

use paramap_models::registry::MODELS;
use paramap_models::{ModelConfig, SourceFormat, lookup, plan};
use paramap_quantization::{Quantization, QuantizationKind, QuantizeStrategy};
use serde_json::{Value, json};
use std::io::Write;

fn phiva_json() -> Value {
    json!({
        "text_config": {
            "hidden_size": 32,
            "vocab_size": 64,
            "num_hidden_layers": 1,
            "num_attention_heads": 4,
            "intermediate_size": 48
        },
        "vision_config": {
            "hidden_size": 16,
            "image_size": 28,
            "patch_size": 14,
            "intermediate_size": 32,
            "num_attention_heads": 2,
            "num_hidden_layers": 1
        }
    })
}

#[test]
fn registry_table_snapshot() {
    let table: Vec<String> = MODELS
        .iter()
        .map(|family| {
            let sources: Vec<_> = family.source_formats.iter().map(|s| s.as_str()).collect();
            let kinds: Vec<_> = family.quantization_kinds.iter().map(|k| k.as_str()).collect();
            format!("{}: sources={} quantizations={}", family.name, sources.join(","), kinds.join(","))
        })
        .collect();
    insta::assert_snapshot!(table.join("\n"), @r"
    phiva: sources=huggingface,awq quantizations=no-quant,group-quant,awq
    imp: sources=huggingface quantizations=no-quant,group-quant,awq
    ");
}

#[test]
fn unknown_model_type() {
    let err = lookup("llama").unwrap_err();
    assert_eq!(err.to_string(), "Model error: Unknown model type: llama");
}

#[test]
fn unsupported_source_format() {
    let q = Quantization::from_name("q4f16_awq").unwrap();
    let err = plan("imp", &json!({}), SourceFormat::Awq, &q).unwrap_err();
    assert_eq!(err.to_string(), "Model error: Model imp has no loader for source format awq");
}

#[test]
fn awq_source_requires_awq_quantization() {
    let q = Quantization::from_name("q4f16_1").unwrap();
    let err = plan("phiva", &phiva_json(), SourceFormat::Awq, &q).unwrap_err();
    assert!(err.to_string().contains("does not support group-quant quantization"), "{err}");
}

#[test]
fn awq_plan_has_no_quantize_rules() {
    let q = Quantization::from_name("q4f16_awq").unwrap();
    let plan = plan("phiva", &phiva_json(), SourceFormat::Awq, &q).unwrap();
    assert!(plan.quantize_mapping.is_empty());
    assert_eq!(plan.extern_mapping.len(), plan.params.len());
    assert_eq!(plan.quantization.kind(), QuantizationKind::Awq);
}

#[test]
fn invalid_config_surfaces_config_error() {
    let mut config = phiva_json();
    config["text_config"]["num_attention_heads"] = json!(5);
    let q = Quantization::from_name("q0f16").unwrap();
    let err = plan("phiva", &config, SourceFormat::HuggingFace, &q).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error:"), "{err}");
}

#[test]
fn source_format_parsing() {
    assert_eq!("huggingface-safetensor".parse::<SourceFormat>().unwrap(), SourceFormat::HuggingFace);
    assert_eq!("AWQ".parse::<SourceFormat>().unwrap(), SourceFormat::Awq);
    assert!("gguf".parse::<SourceFormat>().is_err());
}

#[test]
fn config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", phiva_json()).unwrap();
    let config = paramap_models::phiva::PhivaConfig::from_file(file.path()).unwrap();
    assert_eq!(config.text_config.num_hidden_layers, 1);
}
