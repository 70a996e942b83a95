//! Phiva configuration: a Phi-3 text model, a CLIP vision tower and the
//! projector between them

use crate::config::{ModelConfig, require_divisible, require_nonzero};
use paramap_common::{ParamapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_rms_norm_eps() -> f64 {
    1e-5
}

fn default_max_position_embeddings() -> usize {
    4096
}

/// Phi-3 language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phi3TextConfig {
    pub hidden_size: usize,
    pub vocab_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    #[serde(default)]
    pub head_dim: Option<usize>,
    #[serde(default = "default_rms_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(flatten)]
    pub kwargs: Map<String, Value>,
}

impl Phi3TextConfig {
    pub fn kv_heads(&self) -> usize {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim.unwrap_or(self.hidden_size / self.num_attention_heads)
    }

    pub fn validate(&self) -> Result<()> {
        require_nonzero(
            "text_config",
            &[
                ("hidden_size", self.hidden_size),
                ("vocab_size", self.vocab_size),
                ("num_hidden_layers", self.num_hidden_layers),
                ("num_attention_heads", self.num_attention_heads),
                ("intermediate_size", self.intermediate_size),
                ("num_key_value_heads", self.kv_heads()),
            ],
        )?;
        match self.head_dim {
            Some(0) => return Err(ParamapError::Config("text_config.head_dim must be greater than 0".into())),
            Some(_) => {}
            None => require_divisible(
                "text_config",
                ("hidden_size", self.hidden_size),
                ("num_attention_heads", self.num_attention_heads),
            )?,
        }
        require_divisible(
            "text_config",
            ("num_attention_heads", self.num_attention_heads),
            ("num_key_value_heads", self.kv_heads()),
        )
    }
}

/// CLIP vision tower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipVisionConfig {
    pub hidden_size: usize,
    pub image_size: usize,
    pub intermediate_size: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    pub patch_size: usize,
    pub projection_dim: usize,
    pub num_channels: usize,
    pub layer_norm_eps: f64,
    #[serde(flatten)]
    pub kwargs: Map<String, Value>,
}

impl Default for ClipVisionConfig {
    fn default() -> Self {
        Self {
            hidden_size: 1024,
            image_size: 336,
            intermediate_size: 4096,
            num_attention_heads: 16,
            num_hidden_layers: 24,
            patch_size: 14,
            projection_dim: 768,
            num_channels: 3,
            layer_norm_eps: 1e-5,
            kwargs: Map::new(),
        }
    }
}

impl ClipVisionConfig {
    /// Patch positions plus the class token
    pub fn num_positions(&self) -> usize {
        (self.image_size / self.patch_size).pow(2) + 1
    }

    pub fn validate(&self) -> Result<()> {
        require_nonzero(
            "vision_config",
            &[
                ("hidden_size", self.hidden_size),
                ("image_size", self.image_size),
                ("intermediate_size", self.intermediate_size),
                ("num_attention_heads", self.num_attention_heads),
                ("num_hidden_layers", self.num_hidden_layers),
                ("patch_size", self.patch_size),
                ("num_channels", self.num_channels),
            ],
        )?;
        require_divisible(
            "vision_config",
            ("hidden_size", self.hidden_size),
            ("num_attention_heads", self.num_attention_heads),
        )?;
        require_divisible("vision_config", ("image_size", self.image_size), ("patch_size", self.patch_size))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhivaConfig {
    pub text_config: Phi3TextConfig,
    #[serde(default)]
    pub vision_config: ClipVisionConfig,
    #[serde(default)]
    pub image_token_index: Option<usize>,
    #[serde(flatten)]
    pub kwargs: Map<String, Value>,
}

impl ModelConfig for PhivaConfig {
    fn validate(&self) -> Result<()> {
        self.text_config.validate()?;
        self.vision_config.validate()
    }
}
