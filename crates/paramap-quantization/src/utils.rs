//! Utility functions for quantization operations

use candle_core::{DType, Device, Tensor};
use paramap_common::{DataType, QuantizationError, Result};

/// Nibble order used by AWQ checkpoints when packing eight 4-bit values
/// into one 32-bit word: slot `i` holds column `AWQ_PACK_ORDER[i]`.
pub const AWQ_PACK_ORDER: [usize; 8] = [0, 2, 4, 6, 1, 3, 5, 7];

pub fn ceil_div(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

/// Largest positive value of a signed `bits`-bit integer
pub fn max_signed(bits: usize) -> u32 {
    (1u32 << (bits - 1)) - 1
}

/// Largest value of an unsigned `bits`-bit integer
pub fn max_unsigned(bits: usize) -> u32 {
    (1u32 << bits) - 1
}

/// Symmetric scale for one group: `max|x| / max_int`, 1.0 for an all-zero group
pub fn calculate_symmetric_scale(data: &[f32], max_int: u32) -> f32 {
    let max_val = data.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if max_val == 0.0 {
        return 1.0;
    }
    max_val / max_int as f32
}

/// Pack `bits`-wide unsigned values into 32-bit words, `32 / bits` per word,
/// lowest slot first. A trailing partial word is zero-filled.
pub fn pack_values(values: &[u32], bits: usize) -> Vec<u32> {
    let per_word = 32 / bits;
    let mask = max_unsigned(bits);
    values
        .chunks(per_word)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u32, |word, (i, &v)| word | ((v & mask) << (i * bits)))
        })
        .collect()
}

/// Inverse of [`pack_values`]
pub fn unpack_values(words: &[u32], bits: usize, output_len: usize) -> Vec<u32> {
    let per_word = 32 / bits;
    let mask = max_unsigned(bits);
    let mut values = Vec::with_capacity(output_len);

    for &word in words {
        for i in 0..per_word {
            if values.len() >= output_len {
                break;
            }
            values.push((word >> (i * bits)) & mask);
        }
    }

    values
}

/// Pack eight 4-bit values per word in [`AWQ_PACK_ORDER`]
pub fn pack_awq_values(values: &[u32]) -> Vec<u32> {
    values
        .chunks(8)
        .map(|chunk| {
            AWQ_PACK_ORDER.iter().enumerate().fold(0u32, |word, (slot, &col)| {
                let v = chunk.get(col).copied().unwrap_or(0) & 0xF;
                word | (v << (slot * 4))
            })
        })
        .collect()
}

/// Inverse of [`pack_awq_values`]
pub fn unpack_awq_values(words: &[u32], output_len: usize) -> Vec<u32> {
    let mut values = Vec::with_capacity(words.len() * 8);
    for &word in words {
        let mut block = [0u32; 8];
        for (slot, &col) in AWQ_PACK_ORDER.iter().enumerate() {
            block[col] = (word >> (slot * 4)) & 0xF;
        }
        values.extend_from_slice(&block);
    }
    values.truncate(output_len);
    values
}

/// Read a 2-D tensor as row-major f32 data plus `(rows, cols)`
pub fn extract_f32_matrix(tensor: &Tensor) -> Result<(Vec<f32>, usize, usize)> {
    let dims = tensor.dims();
    if dims.len() != 2 {
        return Err(QuantizationError::QuantizationFailed {
            reason: format!("expected a 2-D weight, got shape {dims:?}"),
        }
        .into());
    }
    let (rows, cols) = (dims[0], dims[1]);

    let f32_tensor =
        if tensor.dtype() != DType::F32 { tensor.to_dtype(DType::F32)? } else { tensor.clone() };
    let cpu_tensor = if f32_tensor.device().is_cpu() {
        f32_tensor
    } else {
        f32_tensor.to_device(&Device::Cpu)?
    };
    let data = cpu_tensor.flatten_all()?.to_vec1::<f32>()?;
    Ok((data, rows, cols))
}

/// Build a packed-word tensor
pub fn u32_tensor(data: Vec<u32>, shape: (usize, usize)) -> Result<Tensor> {
    Ok(Tensor::from_vec(data, shape, &Device::Cpu)?)
}

/// Build a float tensor from f32 data and cast it to `dtype`
pub fn float_tensor(data: Vec<f32>, shape: (usize, usize), dtype: DataType) -> Result<Tensor> {
    let tensor = Tensor::from_vec(data, shape, &Device::Cpu)?;
    Ok(tensor.to_dtype(dtype.to_candle())?)
}
