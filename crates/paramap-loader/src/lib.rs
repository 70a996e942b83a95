//! Parameter mapping between external checkpoints and paramap models
//!
//! An [`ExternMapping`] says, for every destination parameter, which source
//! tensors it comes from and how they are combined. [`MappingBuilder`] builds
//! one against a model's declared parameters, and [`convert`] materializes
//! it from any [`TensorSource`].
//! [`convert_with_stats`] does the same with AWQ calibration statistics.

pub mod builder;
pub mod combinator;
pub mod driver;
pub mod mapping;
pub mod source;

pub use builder::MappingBuilder;
pub use combinator::Combinator;
pub use driver::{ConvertedTensors, convert, convert_with_stats};
pub use mapping::{ExternMapping, MappingEntry};
pub use source::{InMemorySource, TensorSource};
