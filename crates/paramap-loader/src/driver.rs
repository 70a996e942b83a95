//! Reference conversion driver.
//!
//! Walks an [`ExternMapping`] in registration order, reads the sources of
//! each entry, combines them and, when the [`QuantizeMapping`] has a rule for
//! the destination, replaces the dense result with its quantized artifacts.
//! Activation-aware rules read their calibration statistics by destination
//! name from an [`ActivationStats`].

use crate::{ExternMapping, TensorSource};
use candle_core::Tensor;
use paramap_common::{DataType, MappingError, Result};
use paramap_quantization::{ActivationStats, QuantizeMapping};
use tracing::{debug, info, warn};

/// Destination tensors in emission order
pub type ConvertedTensors = Vec<(String, Tensor)>;

pub fn convert(
    mapping: &ExternMapping,
    quant_map: &QuantizeMapping,
    source: &dyn TensorSource,
) -> Result<ConvertedTensors> {
    convert_with_stats(mapping, quant_map, source, &ActivationStats::new())
}

/// [`convert`] with calibration statistics for activation-aware rules
pub fn convert_with_stats(
    mapping: &ExternMapping,
    quant_map: &QuantizeMapping,
    source: &dyn TensorSource,
    stats: &ActivationStats,
) -> Result<ConvertedTensors> {
    for name in stats.names() {
        if !quant_map.get(name).is_some_and(|rule| rule.op.uses_activations()) {
            warn!(weight = name, "activation statistics have no activation-aware rule");
        }
    }

    let mut converted = Vec::with_capacity(mapping.len());
    let mut quantized = 0usize;

    for (name, entry) in mapping.entries() {
        let inputs = entry
            .source_names
            .iter()
            .map(|source_name| -> Result<Tensor> {
                if !source.contains(source_name) {
                    return Err(MappingError::MissingSource { name: source_name.clone() }.into());
                }
                source.load(source_name)
            })
            .collect::<Result<Vec<_>>>()?;

        let tensor = entry.combinator.apply(name, &inputs, entry.target_dtype)?;
        let actual = DataType::from_candle(tensor.dtype())?;
        if actual != entry.target_dtype {
            return Err(MappingError::DtypeMismatch {
                name: name.to_string(),
                expected: entry.target_dtype.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }

        match quant_map.get(name) {
            Some(rule) => {
                debug!(destination = name, "quantizing converted tensor");
                converted.extend(rule.apply_with_stats(name, &tensor, stats)?);
                quantized += 1;
            }
            None => converted.push((name.to_string(), tensor)),
        }
    }

    info!(
        entries = mapping.len(),
        quantized,
        emitted = converted.len(),
        "converted checkpoint"
    );
    Ok(converted)
}
