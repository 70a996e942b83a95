//! Loading and validation shared by the model configurations

use paramap_common::{ParamapError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// A model configuration read from a checkpoint's `config.json`.
///
/// Every constructor validates; an instance is always consistent.
pub trait ModelConfig: DeserializeOwned + Sized {
    fn validate(&self) -> Result<()>;

    fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

pub(crate) fn require_nonzero(context: &str, fields: &[(&str, usize)]) -> Result<()> {
    if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0) {
        return Err(ParamapError::Config(format!("{context}.{name} must be greater than 0")));
    }
    Ok(())
}

pub(crate) fn require_divisible(context: &str, (a_name, a): (&str, usize), (b_name, b): (&str, usize)) -> Result<()> {
    if a % b != 0 {
        return Err(ParamapError::Config(format!(
            "{context}.{a_name} ({a}) must be divisible by {context}.{b_name} ({b})"
        )));
    }
    Ok(())
}
