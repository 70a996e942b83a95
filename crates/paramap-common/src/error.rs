//! Error types shared across the paramap workspace

use thiserror::Error;

/// Result alias used by every paramap crate
pub type Result<T> = std::result::Result<T, ParamapError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum ParamapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Quantization error: {0}")]
    Quantization(#[from] QuantizationError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors raised while building or resolving an extern mapping
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Destination already mapped: {name}")]
    DuplicateDestination { name: String },

    #[error("{} destination parameter(s) never mapped: {}", .names.len(), .names.join(", "))]
    UnresolvedDestination { names: Vec<String> },

    #[error("Destination not in parameter set: {name}")]
    UnknownDestination { name: String },

    #[error("Source tensor not found: {name}")]
    MissingSource { name: String },

    #[error("Arity mismatch for {name}: combinator takes {expected} input(s), got {actual}")]
    ArityMismatch { name: String, expected: usize, actual: usize },

    #[error("No source names given for {name}")]
    EmptySources { name: String },

    #[error("Source {name} is declared unused but is consumed by a mapping")]
    UnusedConsumed { name: String },

    #[error("Dtype mismatch for {name}: expected {expected}, got {actual}")]
    DtypeMismatch { name: String, expected: String, actual: String },

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },
}

/// Errors raised by quantization strategies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantizationError {
    #[error("Unknown quantization preset: {name}")]
    UnknownPreset { name: String },

    #[error("Invalid group size: {size}")]
    InvalidGroupSize { size: usize },

    #[error("Unsupported shape for {name}: {reason}")]
    UnsupportedShape { name: String, reason: String },

    #[error("Unsupported quantization type: {qtype}")]
    UnsupportedType { qtype: String },

    #[error("Quantization failed: {reason}")]
    QuantizationFailed { reason: String },
}

/// Errors raised by model definitions and the model registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown model type: {model_type}")]
    UnknownModelType { model_type: String },

    #[error("Model {model_type} has no loader for source format {format}")]
    UnsupportedSource { model_type: String, format: String },

    #[error("Model {model_type} does not support {kind} quantization")]
    UnsupportedQuantization { model_type: String, kind: String },

    #[error("Duplicate parameter: {name}")]
    DuplicateParameter { name: String },
}
