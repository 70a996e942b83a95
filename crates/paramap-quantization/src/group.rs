//! Group quantization.
//!
//! Each row of a linear (or embedding) weight is split along its input
//! dimension into groups of `group_size` elements. Every group is quantized
//! symmetrically to a `bits`-wide integer with one scale per group, and the
//! integers are packed into 32-bit storage words.
//!
//! A weight `{m}.weight [out, in]` becomes
//!
//! - `{m}.q_weight [out, groups * storage_per_group]` (storage dtype)
//! - `{m}.q_scale  [out, groups]` (model dtype)
//!
//! with `groups = ceil(in / group_size)`. The `KN` layout stores both
//! artifacts transposed.

use crate::mapping::{QuantizeMapping, QuantizedArtifact, QuantizeOp};
use crate::utils::{
    calculate_symmetric_scale, ceil_div, extract_f32_matrix, float_tensor, max_signed,
    pack_values, u32_tensor, unpack_values,
};
use crate::{QuantizationKind, QuantizeStrategy, rewrite_parameters};
use candle_core::Tensor;
use paramap_common::{DataType, ParamKind, ParameterSet, QuantizationError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Memory layout of the quantized linear weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightLayout {
    /// `[out, in]`, groups run along the last axis
    NK,
    /// `[in, out]`, groups run along the first axis
    KN,
}

/// Group quantization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupQuantize {
    pub name: String,
    pub group_size: usize,
    /// Width of one quantized element
    pub bits: usize,
    pub storage_dtype: DataType,
    pub model_dtype: DataType,
    pub linear_weight_layout: WeightLayout,
    pub quantize_embedding: bool,
    pub quantize_final_fc: bool,
}

impl GroupQuantize {
    pub fn new(name: impl Into<String>, bits: usize, group_size: usize, model_dtype: DataType) -> Self {
        Self {
            name: name.into(),
            group_size,
            bits,
            storage_dtype: DataType::Uint32,
            model_dtype,
            linear_weight_layout: WeightLayout::NK,
            quantize_embedding: true,
            quantize_final_fc: true,
        }
    }

    pub fn with_layout(mut self, layout: WeightLayout) -> Self {
        self.linear_weight_layout = layout;
        self
    }

    pub fn elems_per_storage(&self) -> usize {
        self.storage_dtype.bits() / self.bits
    }

    pub fn storage_per_group(&self) -> usize {
        self.group_size / self.elems_per_storage()
    }

    pub fn max_int_value(&self) -> u32 {
        max_signed(self.bits)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_dtype != DataType::Uint32 {
            return Err(QuantizationError::UnsupportedType {
                qtype: format!("storage dtype {}", self.storage_dtype),
            }
            .into());
        }
        if !(2..=8).contains(&self.bits) {
            return Err(QuantizationError::UnsupportedType { qtype: format!("int{}", self.bits) }.into());
        }
        if !self.model_dtype.is_float() {
            return Err(QuantizationError::UnsupportedType {
                qtype: format!("model dtype {}", self.model_dtype),
            }
            .into());
        }
        if self.group_size == 0 || self.group_size % self.elems_per_storage() != 0 {
            return Err(QuantizationError::InvalidGroupSize { size: self.group_size }.into());
        }
        Ok(())
    }

    fn layout_for(&self, kind: ParamKind) -> WeightLayout {
        match kind {
            ParamKind::Embedding => WeightLayout::NK,
            _ => self.linear_weight_layout,
        }
    }

    /// Artifacts for `{module}.weight` with dense shape `[out, in]`, in NK layout.
    /// Use [`GroupQuantize::artifacts_with_layout`] for other layouts.
    pub fn artifacts(&self, module: &str, shape: &[usize]) -> Result<Vec<QuantizedArtifact>> {
        self.artifacts_with_layout(module, shape, self.linear_weight_layout)
    }

    pub fn artifacts_with_layout(
        &self,
        module: &str,
        shape: &[usize],
        layout: WeightLayout,
    ) -> Result<Vec<QuantizedArtifact>> {
        let [out, k] = shape else {
            return Err(QuantizationError::UnsupportedShape {
                name: format!("{module}.weight"),
                reason: format!("group quantization needs a 2-D weight, got {shape:?}"),
            }
            .into());
        };
        let groups = ceil_div(*k, self.group_size);
        let words = groups * self.storage_per_group();
        let (weight_shape, scale_shape) = match layout {
            WeightLayout::NK => (vec![*out, words], vec![*out, groups]),
            WeightLayout::KN => (vec![words, *out], vec![groups, *out]),
        };
        Ok(vec![
            QuantizedArtifact {
                name: format!("{module}.q_weight"),
                shape: weight_shape,
                dtype: self.storage_dtype,
            },
            QuantizedArtifact {
                name: format!("{module}.q_scale"),
                shape: scale_shape,
                dtype: self.model_dtype,
            },
        ])
    }

    /// Quantize a dense `[out, in]` weight into `[q_weight, q_scale]` using the
    /// configured linear layout
    pub fn quantize_weight(&self, weight: &Tensor) -> Result<Vec<Tensor>> {
        self.quantize_weight_with_layout(weight, self.linear_weight_layout)
    }

    pub fn quantize_weight_with_layout(
        &self,
        weight: &Tensor,
        layout: WeightLayout,
    ) -> Result<Vec<Tensor>> {
        let (data, out, k) = extract_f32_matrix(weight)?;
        let groups = ceil_div(k, self.group_size);
        let words_per_row = groups * self.storage_per_group();
        let max_int = self.max_int_value();

        let mut packed = Vec::with_capacity(out * words_per_row);
        let mut scales = Vec::with_capacity(out * groups);
        let mut codes = vec![0u32; groups * self.group_size];

        for row in data.chunks(k) {
            for g in 0..groups {
                let start = g * self.group_size;
                let end = (start + self.group_size).min(k);
                let scale = calculate_symmetric_scale(&row[start..end], max_int);
                scales.push(scale);

                let block = &mut codes[start..start + self.group_size];
                for (i, code) in block.iter_mut().enumerate() {
                    let value = row.get(start + i).copied().unwrap_or(0.0);
                    let q = (value / scale).round() + max_int as f32;
                    *code = q.clamp(0.0, (2 * max_int) as f32) as u32;
                }
            }
            packed.extend(pack_values(&codes, self.bits));
        }

        let q_weight = u32_tensor(packed, (out, words_per_row))?;
        let q_scale = float_tensor(scales, (out, groups), self.model_dtype)?;
        match layout {
            WeightLayout::NK => Ok(vec![q_weight, q_scale]),
            WeightLayout::KN => Ok(vec![q_weight.t()?.contiguous()?, q_scale.t()?.contiguous()?]),
        }
    }

    /// Reconstruct an f32 `[out, in]` weight from NK-layout artifacts
    pub fn dequantize_weight(&self, q_weight: &Tensor, q_scale: &Tensor, in_features: usize) -> Result<Tensor> {
        let words = q_weight.to_vec2::<u32>()?;
        let (scales, _, groups) = extract_f32_matrix(q_scale)?;
        let max_int = self.max_int_value() as f32;
        let out = words.len();

        let mut data = Vec::with_capacity(out * in_features);
        for (r, row_words) in words.iter().enumerate() {
            let codes = unpack_values(row_words, self.bits, in_features);
            for (i, &code) in codes.iter().enumerate() {
                let scale = scales[r * groups + i / self.group_size];
                data.push((code as f32 - max_int) * scale);
            }
        }
        Ok(Tensor::from_vec(data, (out, in_features), &candle_core::Device::Cpu)?)
    }

    fn selects(&self, name: &str, kind: ParamKind) -> bool {
        match kind {
            ParamKind::Linear if is_final_fc(name) && !self.quantize_final_fc => {
                warn!(weight = name, strategy = %self.name, "leaving final projection unquantized");
                false
            }
            ParamKind::Linear => true,
            ParamKind::Embedding => self.quantize_embedding,
            _ => false,
        }
    }
}

/// Whether `name` belongs to the output projection (`lm_head`)
pub fn is_final_fc(name: &str) -> bool {
    name.split('.').any(|part| part == "lm_head")
}

impl QuantizeStrategy for GroupQuantize {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> QuantizationKind {
        QuantizationKind::GroupQuant
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
            |name, spec| self.selects(name, spec.kind),
            |module, spec| {
                let layout = self.layout_for(spec.kind);
                let artifacts = self.artifacts_with_layout(module, &spec.shape, layout)?;
                let op = QuantizeOp::GroupQuant(self.clone().with_layout(layout));
                Ok((artifacts, op))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn q4() -> GroupQuantize {
        GroupQuantize::new("q4f32_1", 4, 32, DataType::Float32)
    }

    #[test]
    fn derived_constants() {
        let q = q4();
        assert_eq!(q.elems_per_storage(), 8);
        assert_eq!(q.storage_per_group(), 4);
        assert_eq!(q.max_int_value(), 7);
        assert!(q.validate().is_ok());

        let q3 = GroupQuantize::new("q3f16_1", 3, 40, DataType::Float16);
        assert_eq!(q3.elems_per_storage(), 10);
        assert_eq!(q3.storage_per_group(), 4);
        assert!(q3.validate().is_ok());
    }

    #[test]
    fn rejects_misaligned_group() {
        let q = GroupQuantize::new("bad", 4, 12, DataType::Float16);
        assert!(q.validate().is_err());
        let q = GroupQuantize::new("bad", 4, 0, DataType::Float16);
        assert!(q.validate().is_err());
    }

    #[test]
    fn artifact_shapes() {
        let artifacts = q4().artifacts("mlp.down_proj", &[16, 64]).unwrap();
        assert_eq!(artifacts[0].name, "mlp.down_proj.q_weight");
        assert_eq!(artifacts[0].shape, vec![16, 8]);
        assert_eq!(artifacts[0].dtype, DataType::Uint32);
        assert_eq!(artifacts[1].name, "mlp.down_proj.q_scale");
        assert_eq!(artifacts[1].shape, vec![16, 2]);
        assert_eq!(artifacts[1].dtype, DataType::Float32);

        let kn = q4().artifacts_with_layout("fc", &[16, 64], WeightLayout::KN).unwrap();
        assert_eq!(kn[0].shape, vec![8, 16]);
        assert_eq!(kn[1].shape, vec![2, 16]);
    }

    #[test]
    fn quantize_dequantize_is_close() {
        let q = q4();
        let data: Vec<f32> = (0..4 * 64).map(|i| ((i as f32) * 0.37).sin()).collect();
        let weight = Tensor::from_vec(data.clone(), (4, 64), &Device::Cpu).unwrap();
        let out = q.quantize_weight(&weight).unwrap();
        assert_eq!(out[0].dims(), &[4, 8]);
        assert_eq!(out[1].dims(), &[4, 2]);

        let restored = q.dequantize_weight(&out[0], &out[1], 64).unwrap();
        let restored = restored.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        // error is bounded by half a quantization step: max|w| / 7 / 2
        for (a, b) in data.iter().zip(restored.iter()) {
            assert!((a - b).abs() <= 1.0 / 14.0 + 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn exact_values_survive() {
        let q = q4();
        // multiples of the group scale quantize exactly
        let row: Vec<f32> = (0..32).map(|i| (i % 15) as f32 - 7.0).collect();
        let weight = Tensor::from_vec(row.clone(), (1, 32), &Device::Cpu).unwrap();
        let out = q.quantize_weight(&weight).unwrap();
        let restored = q.dequantize_weight(&out[0], &out[1], 32).unwrap();
        assert_eq!(restored.flatten_all().unwrap().to_vec1::<f32>().unwrap(), row);
    }

    #[test]
    fn padded_tail_group() {
        let q = q4();
        let weight = Tensor::ones((2, 40), candle_core::DType::F32, &Device::Cpu).unwrap();
        let out = q.quantize_weight(&weight).unwrap();
        assert_eq!(out[0].dims(), &[2, 8]);
        assert_eq!(out[1].dims(), &[2, 2]);
        let expected = q.artifacts("x", &[2, 40]).unwrap();
        assert_eq!(out[0].dims(), expected[0].shape.as_slice());
    }

    #[test]
    fn final_fc_detection() {
        assert!(is_final_fc("language_model.lm_head.weight"));
        assert!(is_final_fc("lm_head.linear.weight"));
        assert!(!is_final_fc("transformer.h.0.mixer.out_proj.weight"));
    }
}
