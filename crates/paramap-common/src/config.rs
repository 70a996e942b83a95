//! Conversion configuration and loading

use crate::{ParamapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;


/// Environment variables consulted by [`ConversionConfig::apply_env_overrides`]
pub const ENV_MODEL_TYPE: &str = "PARAMAP_MODEL_TYPE";
pub const ENV_SOURCE_FORMAT: &str = "PARAMAP_SOURCE_FORMAT";
pub const ENV_QUANTIZATION: &str = "PARAMAP_QUANTIZATION";
pub const ENV_LOG_LEVEL: &str = "PARAMAP_LOG_LEVEL";

/// Top-level configuration of a weight-conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Registered model family, e.g. `phiva`
    pub model_type: Option<String>,
    /// Checkpoint convention of the source weights, e.g. `huggingface` or `awq`
    pub source_format: String,
    /// Quantization preset name, e.g. `q4f16_1`
    pub quantization: String,
    pub output_format: OutputFormat,
    pub logging: LoggingConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model_type: None,
            source_format: "huggingface".to_string(),
            quantization: "q0f16".to_string(),
            output_format: OutputFormat::Text,
            logging: LoggingConfig::default(),
        }
    }
}

/// How mapping reports are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ParamapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ParamapError::Config(format!("unknown output format: {other}"))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "compact".to_string() }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") | None => toml::from_str(&content)?,
            Some(other) => {
                return Err(ParamapError::Config(format!(
                    "unsupported config file extension: .{other}"
                )));
            }
        };
        Ok(config)
    }

    /// File (if given), then environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(ENV_MODEL_TYPE) {
            debug!(var = ENV_MODEL_TYPE, %value, "environment override");
            self.model_type = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_SOURCE_FORMAT) {
            debug!(var = ENV_SOURCE_FORMAT, %value, "environment override");
            self.source_format = value;
        }
        if let Ok(value) = std::env::var(ENV_QUANTIZATION) {
            debug!(var = ENV_QUANTIZATION, %value, "environment override");
            self.quantization = value;
        }
        if let Ok(value) = std::env::var(ENV_LOG_LEVEL) {
            debug!(var = ENV_LOG_LEVEL, %value, "environment override");
            self.logging.level = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(model_type) = &self.model_type {
            if model_type.trim().is_empty() {
                return Err(ParamapError::Config("model_type must not be empty".into()));
            }
        }
        if self.source_format.trim().is_empty() {
            return Err(ParamapError::Config("source_format must not be empty".into()));
        }
        if self.quantization.trim().is_empty() {
            return Err(ParamapError::Config("quantization must not be empty".into()));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ParamapError::Config(format!(
                "invalid log level `{}` (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ParamapError::Config(format!(
                "invalid log format `{}` (expected one of {})",
                self.logging.format,
                LOG_FORMATS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`]
#[derive(Debug, Default)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn model_type(mut self, model_type: impl Into<String>) -> Self {
        self.config.model_type = Some(model_type.into());
        self
    }

    pub fn source_format(mut self, format: impl Into<String>) -> Self {
        self.config.source_format = format.into();
        self
    }

    pub fn quantization(mut self, name: impl Into<String>) -> Self {
        self.config.quantization = name.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn build(self) -> Result<ConversionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
