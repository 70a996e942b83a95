use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn paramap() -> Command {
    let mut cmd = Command::cargo_bin("paramap").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("PARAMAP_MODEL_TYPE")
        .env_remove("PARAMAP_SOURCE_FORMAT")
        .env_remove("PARAMAP_QUANTIZATION")
        .env_remove("PARAMAP_LOG_LEVEL");
    cmd
}

fn phiva_config() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    let config = serde_json::json!({
        "model_type": "phiva",
        "text_config": {
            "hidden_size": 32, "vocab_size": 64, "num_hidden_layers": 1,
            "num_attention_heads": 4, "intermediate_size": 48
        },
        "vision_config": {
            "hidden_size": 16, "image_size": 28, "patch_size": 14,
            "intermediate_size": 32, "num_attention_heads": 2, "num_hidden_layers": 1
        }
    });
    write!(file, "{config}").unwrap();
    file
}

#[test]
fn help_works() {
    paramap().arg("--help").assert().success();
}

#[test]
fn version_works() {
    paramap().arg("--version").assert().success();
}

#[test]
fn help_mentions_core_subcommands() {
    let out = paramap().arg("--help").assert().success().get_output().stdout.clone();
    let s = String::from_utf8(out).unwrap();
    for needle in ["models", "quantizations", "map", "--config"] {
        assert!(s.contains(needle), "help missing `{needle}`");
    }
}

#[test]
fn invalid_command_fails() {
    paramap().arg("nonexistent-command").assert().failure();
}

#[test]
fn models_lists_registry() {
    paramap()
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("phiva").and(predicate::str::contains("imp")))
        .stdout(predicate::str::contains("sources: huggingface, awq"));
}

#[test]
fn quantizations_lists_presets() {
    paramap()
        .arg("quantizations")
        .assert()
        .success()
        .stdout(predicate::str::contains("q4f16_1 kind=group-quant"))
        .stdout(predicate::str::contains("q4f16_awq kind=awq"));
}

#[test]
fn map_prints_text_report() {
    let config = phiva_config();
    paramap()
        .args(["map", "--quantization", "q4f16_1", "--model-config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("model: phiva (source huggingface)"))
        .stdout(predicate::str::contains(
            "language_model.transformer.h.0.ln.weight <- language_model.model.layers.0.input_layernorm.weight cast float16",
        ))
        .stdout(predicate::str::contains("[quantize]"));
}

#[test]
fn map_awq_json_output() {
    let config = phiva_config();
    let out = paramap()
        .args(["map", "--source", "awq", "--quantization", "q4f16_awq", "--output-format", "json", "--model-config"])
        .arg(config.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plan: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(plan["model_type"], "phiva");
    assert_eq!(plan["source_format"], "awq");
    assert_eq!(plan["quantization"]["kind"], "awq");
    let unused = plan["extern_mapping"]["unused_source_names"].as_array().unwrap();
    assert_eq!(unused, &[serde_json::json!("language_model.model.layers.0.self_attn.rotary_emb.inv_freq")]);
}

#[test]
fn map_rejects_unknown_preset() {
    let config = phiva_config();
    paramap()
        .args(["map", "--quantization", "q9f99", "--model-config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown quantization preset: q9f99"));
}

#[test]
fn map_reports_missing_model_config() {
    paramap()
        .args(["map", "--model-config", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read model config"));
}

#[test]
fn config_file_and_env_feed_map_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "quantization = \"q0f32\"\n\n[logging]\nlevel = \"warn\"").unwrap();

    paramap()
        .arg("--config")
        .arg(file.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quantization = \"q0f32\""))
        .stdout(predicate::str::contains("level = \"warn\""));

    paramap()
        .env("PARAMAP_QUANTIZATION", "q4f32_1")
        .arg("--config")
        .arg(file.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quantization = \"q4f32_1\""));
}

#[test]
fn invalid_log_level_fails() {
    paramap().args(["--log-level", "loud", "models"]).assert().failure();
}
