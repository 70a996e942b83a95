//! Common types for the paramap weight-conversion engine
//!
//! This crate provides the pieces every other paramap crate builds on:
//! the error taxonomy, element types, declared parameter sets and the
//! conversion configuration.

pub mod config;
pub mod dtype;
pub mod error;
pub mod params;

pub use config::{ConversionConfig, ConversionConfigBuilder, LoggingConfig, OutputFormat};
pub use dtype::DataType;
pub use error::*;
pub use params::{ParamKind, ParamSpec, ParameterSet};
