//! Calibration statistics consumed by activation-aware quantization

use indexmap::IndexMap;
use paramap_common::{QuantizationError, Result};
use serde::{Deserialize, Serialize};

/// Mean absolute activation of each input channel, keyed by the dense weight
/// name (`h.0.mixer.qkv_proj.weight`) whose input it measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationStats {
    channels: IndexMap<String, Vec<f32>>,
}

impl ActivationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the magnitudes for `weight`, replacing earlier ones.
    /// Magnitudes must be finite and non-negative.
    pub fn insert(&mut self, weight: impl Into<String>, magnitudes: Vec<f32>) -> Result<()> {
        let weight = weight.into();
        if magnitudes.is_empty() {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!("no activation statistics given for {weight}"),
            }
            .into());
        }
        if let Some(bad) = magnitudes.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!("invalid activation magnitude {bad} for {weight}"),
            }
            .into());
        }
        self.channels.insert(weight, magnitudes);
        Ok(())
    }

    pub fn get(&self, weight: &str) -> Option<&[f32]> {
        self.channels.get(weight).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
