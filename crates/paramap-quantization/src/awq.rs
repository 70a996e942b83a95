//! Activation-aware weight quantization (AWQ).
//!
//! Produces the same integer/scale decomposition contract as group
//! quantization but in the AWQ checkpoint layout, with an asymmetric
//! zero-point per group. A weight `{m}.weight [out, in]` becomes
//!
//! - `{m}.qweight [in, out / 8]` (uint32, AWQ nibble order)
//! - `{m}.qzeros  [groups, out / 8]` (uint32, AWQ nibble order)
//! - `{m}.scales  [groups, out]` (model dtype)
//!
//! Scales are chosen per (group, output channel) by searching a grid of
//! clipping ratios and keeping the one with the lowest reconstruction error,
//! where each input channel's error is weighted by its squared mean
//! activation magnitude. Without activation statistics every channel weighs
//! the same.

use crate::mapping::{QuantizeMapping, QuantizedArtifact, QuantizeOp};
use crate::utils::{
    ceil_div, extract_f32_matrix, float_tensor, max_unsigned, pack_awq_values, u32_tensor,
    unpack_awq_values,
};
use crate::{QuantizationKind, QuantizeStrategy, group::is_final_fc, rewrite_parameters};
use candle_core::{Device, Tensor};
use paramap_common::{DataType, ParamKind, ParameterSet, QuantizationError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Smallest clipping ratio tried by the scale search
const MIN_CLIP_RATIO: f32 = 0.5;

/// AWQ configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwqQuantize {
    pub name: String,
    pub group_size: usize,
    pub bits: usize,
    pub storage_dtype: DataType,
    pub model_dtype: DataType,
    pub quantize_final_fc: bool,
    /// Number of clipping ratios tried between 1.0 and 0.5; 1 disables the search
    pub clip_grid: usize,
}

impl AwqQuantize {
    pub fn new(name: impl Into<String>, group_size: usize, model_dtype: DataType) -> Self {
        Self {
            name: name.into(),
            group_size,
            bits: 4,
            storage_dtype: DataType::Uint32,
            model_dtype,
            quantize_final_fc: false,
            clip_grid: 20,
        }
    }

    pub fn elems_per_storage(&self) -> usize {
        self.storage_dtype.bits() / self.bits
    }

    pub fn validate(&self) -> Result<()> {
        if self.bits != 4 || self.storage_dtype != DataType::Uint32 {
            return Err(QuantizationError::UnsupportedType {
                qtype: format!("awq int{} in {}", self.bits, self.storage_dtype),
            }
            .into());
        }
        if !self.model_dtype.is_float() {
            return Err(QuantizationError::UnsupportedType {
                qtype: format!("model dtype {}", self.model_dtype),
            }
            .into());
        }
        if self.group_size == 0 {
            return Err(QuantizationError::InvalidGroupSize { size: self.group_size }.into());
        }
        if self.clip_grid == 0 {
            return Err(QuantizationError::QuantizationFailed {
                reason: "clip_grid must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn artifacts(&self, module: &str, shape: &[usize]) -> Result<Vec<QuantizedArtifact>> {
        let name = format!("{module}.weight");
        let [out, k] = shape else {
            return Err(QuantizationError::UnsupportedShape {
                name,
                reason: format!("AWQ needs a 2-D weight, got {shape:?}"),
            }
            .into());
        };
        let pack = self.elems_per_storage();
        if out % pack != 0 {
            return Err(QuantizationError::UnsupportedShape {
                name,
                reason: format!("output features {out} not divisible by {pack}"),
            }
            .into());
        }
        let groups = ceil_div(*k, self.group_size);
        Ok(vec![
            QuantizedArtifact {
                name: format!("{module}.qweight"),
                shape: vec![*k, out / pack],
                dtype: self.storage_dtype,
            },
            QuantizedArtifact {
                name: format!("{module}.qzeros"),
                shape: vec![groups, out / pack],
                dtype: self.storage_dtype,
            },
            QuantizedArtifact {
                name: format!("{module}.scales"),
                shape: vec![groups, *out],
                dtype: self.model_dtype,
            },
        ])
    }

    fn clip_ratios(&self) -> Vec<f32> {
        if self.clip_grid == 1 {
            return vec![1.0];
        }
        let step = (1.0 - MIN_CLIP_RATIO) / (self.clip_grid - 1) as f32;
        (0..self.clip_grid).map(|i| 1.0 - step * i as f32).collect()
    }

    /// Quantize a dense `[out, in]` weight into `[qweight, qzeros, scales]`.
    ///
    /// `activations` holds the mean absolute activation of each input channel.
    pub fn quantize_weight(&self, weight: &Tensor, activations: Option<&[f32]>) -> Result<Vec<Tensor>> {
        let (data, out, k) = extract_f32_matrix(weight)?;
        self.artifacts("weight", &[out, k])?;
        if let Some(act) = activations {
            if act.len() != k {
                return Err(QuantizationError::QuantizationFailed {
                    reason: format!("{} activation statistics for {k} input channels", act.len()),
                }
                .into());
            }
        }

        let groups = ceil_div(k, self.group_size);
        let qmax = max_unsigned(self.bits);
        let ratios = self.clip_ratios();

        // codes laid out [in, out], zeros and scales [groups, out]
        let mut codes = vec![0u32; k * out];
        let mut zeros = vec![0u32; groups * out];
        let mut scales = vec![0f32; groups * out];

        for c in 0..out {
            let row = &data[c * k..(c + 1) * k];
            for g in 0..groups {
                let start = g * self.group_size;
                let end = (start + self.group_size).min(k);
                let block = &row[start..end];
                let weights = activations.map(|act| &act[start..end]);

                let params = ratios
                    .iter()
                    .map(|&ratio| GroupParams::fit(block, ratio, qmax))
                    .min_by(|a, b| {
                        a.weighted_error(block, weights).total_cmp(&b.weighted_error(block, weights))
                    })
                    .unwrap_or_else(|| GroupParams::fit(block, 1.0, qmax));

                scales[g * out + c] = params.scale;
                zeros[g * out + c] = params.zero;
                for (i, &w) in block.iter().enumerate() {
                    codes[(start + i) * out + c] = params.encode(w);
                }
            }
        }

        let pack = self.elems_per_storage();
        let qweight = u32_tensor(pack_awq_values(&codes), (k, out / pack))?;
        let qzeros = u32_tensor(pack_awq_values(&zeros), (groups, out / pack))?;
        let scales = float_tensor(scales, (groups, out), self.model_dtype)?;
        Ok(vec![qweight, qzeros, scales])
    }

    /// Reconstruct an f32 `[out, in]` weight from AWQ artifacts
    pub fn dequantize_weight(&self, qweight: &Tensor, qzeros: &Tensor, scales: &Tensor) -> Result<Tensor> {
        let (scale_data, groups, out) = extract_f32_matrix(scales)?;
        let (k, _) = qweight.dims2()?;
        let codes = unpack_awq_values(&qweight.flatten_all()?.to_vec1::<u32>()?, k * out);
        let zeros = unpack_awq_values(&qzeros.flatten_all()?.to_vec1::<u32>()?, groups * out);

        let mut data = vec![0f32; out * k];
        for i in 0..k {
            let g = i / self.group_size;
            for c in 0..out {
                let q = codes[i * out + c] as f32;
                let z = zeros[g * out + c] as f32;
                data[c * k + i] = (q - z) * scale_data[g * out + c];
            }
        }
        Ok(Tensor::from_vec(data, (out, k), &Device::Cpu)?)
    }
}

/// Asymmetric scale and zero-point of one group
#[derive(Debug, Clone, Copy)]
struct GroupParams {
    scale: f32,
    zero: u32,
    qmax: u32,
}

impl GroupParams {
    fn fit(block: &[f32], ratio: f32, qmax: u32) -> Self {
        let max_v = block.iter().fold(0.0f32, |acc, &x| acc.max(x)) * ratio;
        let min_v = block.iter().fold(0.0f32, |acc, &x| acc.min(x)) * ratio;
        let range = max_v - min_v;
        let scale = if range > 0.0 { range / qmax as f32 } else { 1.0 };
        let zero = (-min_v / scale).round().clamp(0.0, qmax as f32) as u32;
        Self { scale, zero, qmax }
    }

    fn encode(&self, w: f32) -> u32 {
        ((w / self.scale).round() + self.zero as f32).clamp(0.0, self.qmax as f32) as u32
    }

    fn decode(&self, q: u32) -> f32 {
        (q as f32 - self.zero as f32) * self.scale
    }

    fn weighted_error(&self, block: &[f32], weights: Option<&[f32]>) -> f32 {
        block
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let err = w - self.decode(self.encode(w));
                let a = weights.map_or(1.0, |act| act[i]);
                a * a * err * err
            })
            .sum()
    }
}

impl QuantizeStrategy for AwqQuantize {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> QuantizationKind {
        QuantizationKind::Awq
    }

    fn model_dtype(&self) -> DataType {
        self.model_dtype
    }

    fn rewrite(
        &self,
        params: ParameterSet,
        quant_map: &mut QuantizeMapping,
        prefix: &str,
    ) -> Result<ParameterSet> {
        self.validate()?;
        rewrite_parameters(
            params,
            quant_map,
            prefix,
            |name, spec| {
                if spec.kind != ParamKind::Linear {
                    return false;
                }
                if is_final_fc(name) && !self.quantize_final_fc {
                    warn!(weight = name, strategy = %self.name, "leaving final projection unquantized");
                    return false;
                }
                true
            },
            |module, spec| Ok((self.artifacts(module, &spec.shape)?, QuantizeOp::Awq(self.clone()))),
        )
    }
}
