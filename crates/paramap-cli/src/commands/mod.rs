//! CLI command implementations

pub mod list;
pub mod map;

pub use list::{list_models, list_quantizations};
pub use map::MapCommand;
