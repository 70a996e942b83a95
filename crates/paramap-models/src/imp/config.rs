//! Imp configuration: a Phi-2 text model and a SigLIP vision tower.
//!
//! Text fields are read at the top level of `config.json`, under either the
//! original Phi names (`n_embd`, `n_layer`, ...) or the HuggingFace ones.

use crate::config::{ModelConfig, require_divisible, require_nonzero};
use paramap_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_vocab_size() -> usize {
    51200
}

fn default_positions() -> usize {
    2048
}

fn default_rotary_dim() -> usize {
    32
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

/// SigLIP vision tower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigLipVisionConfig {
    pub hidden_size: usize,
    pub image_size: usize,
    pub intermediate_size: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    pub patch_size: usize,
    pub num_channels: usize,
    pub layer_norm_eps: f64,
    #[serde(flatten)]
    pub kwargs: Map<String, Value>,
}

impl Default for SigLipVisionConfig {
    fn default() -> Self {
        Self {
            hidden_size: 1152,
            image_size: 196,
            intermediate_size: 4304,
            num_attention_heads: 16,
            num_hidden_layers: 26,
            patch_size: 14,
            num_channels: 3,
            layer_norm_eps: 1e-6,
            kwargs: Map::new(),
        }
    }
}

impl SigLipVisionConfig {
    pub fn num_patches(&self) -> usize {
        (self.image_size / self.patch_size).pow(2)
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
pub struct ImpConfig {
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_positions", alias = "max_position_embeddings")]
    pub n_positions: usize,
    #[serde(alias = "hidden_size")]
    pub n_embd: usize,
    #[serde(alias = "num_hidden_layers")]
    pub n_layer: usize,
    #[serde(alias = "num_attention_heads")]
    pub n_head: usize,
    #[serde(default, alias = "num_key_value_heads")]
    pub n_head_kv: Option<usize>,
    /// MLP width, `4 * n_embd` when absent
    #[serde(default, alias = "intermediate_size")]
    pub n_inner: Option<usize>,
    #[serde(default = "default_rotary_dim")]
    pub rotary_dim: usize,
    #[serde(default = "default_layer_norm_epsilon", alias = "layer_norm_eps")]
    pub layer_norm_epsilon: f64,
    #[serde(default)]
    pub vision_config: SigLipVisionConfig,
    /// Width of the vision features entering the projector
    #[serde(default)]
    pub mm_hidden_size: Option<usize>,
    #[serde(flatten)]
    pub kwargs: Map<String, Value>,
}

impl ImpConfig {
    pub fn kv_heads(&self) -> usize {
        self.n_head_kv.unwrap_or(self.n_head)
    }

    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    pub fn intermediate_size(&self) -> usize {
        self.n_inner.unwrap_or(4 * self.n_embd)
    }

    pub fn mm_hidden_size(&self) -> usize {
        self.mm_hidden_size.unwrap_or(self.vision_config.hidden_size)
    }
}

impl ModelConfig for ImpConfig {
    fn validate(&self) -> Result<()> {
        require_nonzero(
            "config",
            &[
                ("vocab_size", self.vocab_size),
                ("n_embd", self.n_embd),
                ("n_layer", self.n_layer),
                ("n_head", self.n_head),
                ("n_head_kv", self.kv_heads()),
                ("n_inner", self.intermediate_size()),
                ("mm_hidden_size", self.mm_hidden_size()),
            ],
        )?;
        require_divisible("config", ("n_embd", self.n_embd), ("n_head", self.n_head))?;
        require_divisible("config", ("n_head", self.n_head), ("n_head_kv", self.kv_heads()))?;
        self.vision_config.validate()
    }
}
