//! Named quantization presets.
//!
//! Names follow `q{bits}f{model float width}_{variant}`: `_0` stores group
//! quantized linear weights in the `KN` layout, `_1` in `NK`.

use crate::{AwqQuantize, GroupQuantize, NoQuantize, Quantization, WeightLayout};
use paramap_common::{DataType, QuantizationError, Result};

/// Every preset name, in listing order
pub const PRESET_NAMES: &[&str] =
    &["q0f16", "q0f32", "q3f16_0", "q3f16_1", "q4f16_0", "q4f16_1", "q4f32_1", "q4f16_awq"];

fn group(name: &str, bits: usize, group_size: usize, dtype: DataType, layout: WeightLayout) -> Quantization {
    Quantization::Group(GroupQuantize::new(name, bits, group_size, dtype).with_layout(layout))
}

/// Build the preset called `name`
pub fn preset(name: &str) -> Result<Quantization> {
    use DataType::{Float16, Float32};
    use WeightLayout::{KN, NK};

    let quantization = match name {
        "q0f16" => Quantization::NoQuant(NoQuantize::new(name, Float16)),
        "q0f32" => Quantization::NoQuant(NoQuantize::new(name, Float32)),
        "q3f16_0" => group(name, 3, 40, Float16, KN),
        "q3f16_1" => group(name, 3, 40, Float16, NK),
        "q4f16_0" => group(name, 4, 32, Float16, KN),
        "q4f16_1" => group(name, 4, 32, Float16, NK),
        "q4f32_1" => group(name, 4, 32, Float32, NK),
        "q4f16_awq" => Quantization::Awq(AwqQuantize::new(name, 128, Float16)),
        _ => return Err(QuantizationError::UnknownPreset { name: name.to_string() }.into()),
    };
    Ok(quantization)
}

/// All presets, in [`PRESET_NAMES`] order
pub fn all_presets() -> Vec<Quantization> {
    PRESET_NAMES.iter().filter_map(|name| preset(name).ok()).collect()
}
