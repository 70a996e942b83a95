//! `map` command: build a conversion plan and print it

use anyhow::{Context, Result, anyhow};
use clap::Args;
use paramap_common::{ConversionConfig, OutputFormat};
use paramap_loader::Combinator;
use paramap_models::{ConversionPlan, SourceFormat, plan};
use paramap_quantization::{Quantization, QuantizeStrategy};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// Build the extern and quantize mappings for one checkpoint
#[derive(Debug, Args)]
pub struct MapCommand {
    /// Model family; defaults to the configuration, then `model_type` in the model config
    #[arg(long, value_name = "TYPE")]
    pub model_type: Option<String>,

    /// Path to the checkpoint's config.json
    #[arg(long, value_name = "PATH")]
    pub model_config: PathBuf,

    /// Quantization preset, e.g. q4f16_1
    #[arg(short, long, value_name = "PRESET")]
    pub quantization: Option<String>,

    /// Source checkpoint format (huggingface, awq)
    #[arg(long, value_name = "FORMAT")]
    pub source: Option<String>,

    /// Output format (text or json)
    #[arg(long, value_name = "FORMAT")]
    pub output_format: Option<String>,
}

impl MapCommand {
    pub fn execute(&self, config: &ConversionConfig) -> Result<()> {
        let content = std::fs::read_to_string(&self.model_config)
            .with_context(|| format!("Failed to read model config {}", self.model_config.display()))?;
        let model_config: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model config {}", self.model_config.display()))?;

        let model_type = self.model_type(config, &model_config)?;
        let source: SourceFormat = self.source.as_deref().unwrap_or(&config.source_format).parse()?;
        let quantization = Quantization::from_name(self.quantization.as_deref().unwrap_or(&config.quantization))?;
        let output_format = match &self.output_format {
            Some(format) => format.parse()?,
            None => config.output_format,
        };

        let plan = plan(&model_type, &model_config, source, &quantization)
            .with_context(|| format!("Failed to build mapping for {model_type}"))?;
        info!(model_type = %model_type, quantization = quantization.name(), "mapping ready");

        let mut out = io::stdout().lock();
        match output_format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&plan)?)?,
            OutputFormat::Text => render_text(&plan, &mut out)?,
        }
        Ok(())
    }

    fn model_type(&self, config: &ConversionConfig, model_config: &Value) -> Result<String> {
        self.model_type
            .clone()
            .or_else(|| config.model_type.clone())
            .or_else(|| model_config.get("model_type").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| anyhow!("No model type given and none found in {}", self.model_config.display()))
    }
}

fn describe(combinator: &Combinator) -> String {
    match combinator {
        Combinator::Cast => "cast".to_string(),
        Combinator::Concat { axis, .. } => format!("concat(axis={axis})"),
    }
}

pub fn render_text(plan: &ConversionPlan, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "model: {} (source {})", plan.model_type, plan.source_format)?;
    writeln!(out, "quantization: {}", plan.quantization.summary())?;
    writeln!(out, "parameters: {} ({} elements)", plan.params.len(), plan.params.total_elements())?;

    writeln!(out, "\n[extern] {} entries", plan.extern_mapping.len())?;
    for (dest, entry) in plan.extern_mapping.entries() {
        writeln!(
            out,
            "{dest} <- {} {} {}",
            entry.source_names.join(", "),
            describe(&entry.combinator),
            entry.target_dtype
        )?;
    }

    let unused: Vec<_> = plan.extern_mapping.unused_source_names().collect();
    if !unused.is_empty() {
        writeln!(out, "\n[unused] {} sources", unused.len())?;
        for name in unused {
            writeln!(out, "{name}")?;
        }
    }

    if !plan.quantize_mapping.is_empty() {
        writeln!(out, "\n[quantize] {} rules", plan.quantize_mapping.len())?;
        for (dest, rule) in plan.quantize_mapping.iter() {
            let artifacts: Vec<_> =
                rule.artifacts.iter().map(|a| format!("{}{:?} {}", a.name, a.shape, a.dtype)).collect();
            writeln!(out, "{dest} -> {}", artifacts.join(", "))?;
        }
    }
    Ok(())
}
