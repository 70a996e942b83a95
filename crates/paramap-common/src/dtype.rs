//! Element types understood by parameter sets and mappings

use crate::{ParamapError, Result};
use candle_core::DType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a declared parameter.
///
/// Serialized with the long lowercase names used in model configs
/// (`"float16"`, `"uint32"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float16,
    BFloat16,
    Float32,
    Float64,
    Uint8,
    Uint32,
    Int64,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float16 => "float16",
            DataType::BFloat16 => "bfloat16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Uint8 => "uint8",
            DataType::Uint32 => "uint32",
            DataType::Int64 => "int64",
        }
    }

    /// Width of one element in bits
    pub fn bits(self) -> usize {
        match self {
            DataType::Uint8 => 8,
            DataType::Float16 | DataType::BFloat16 => 16,
            DataType::Float32 | DataType::Uint32 => 32,
            DataType::Float64 | DataType::Int64 => 64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Float16 | DataType::BFloat16 | DataType::Float32 | DataType::Float64
        )
    }

    pub fn to_candle(self) -> DType {
        match self {
            DataType::Float16 => DType::F16,
            DataType::BFloat16 => DType::BF16,
            DataType::Float32 => DType::F32,
            DataType::Float64 => DType::F64,
            DataType::Uint8 => DType::U8,
            DataType::Uint32 => DType::U32,
            DataType::Int64 => DType::I64,
        }
    }

    pub fn from_candle(dtype: DType) -> Result<Self> {
        match dtype {
            DType::F16 => Ok(DataType::Float16),
            DType::BF16 => Ok(DataType::BFloat16),
            DType::F32 => Ok(DataType::Float32),
            DType::F64 => Ok(DataType::Float64),
            DType::U8 => Ok(DataType::Uint8),
            DType::U32 => Ok(DataType::Uint32),
            DType::I64 => Ok(DataType::Int64),
            #[allow(unreachable_patterns)]
            other => Err(ParamapError::Validation(format!("unsupported tensor dtype {other:?}"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParamapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float16" | "f16" | "half" => Ok(DataType::Float16),
            "bfloat16" | "bf16" => Ok(DataType::BFloat16),
            "float32" | "f32" | "float" => Ok(DataType::Float32),
            "float64" | "f64" | "double" => Ok(DataType::Float64),
            "uint8" | "u8" => Ok(DataType::Uint8),
            "uint32" | "u32" => Ok(DataType::Uint32),
            "int64" | "i64" => Ok(DataType::Int64),
            other => Err(ParamapError::Config(format!("unknown dtype: {other}"))),
        }
    }
}
