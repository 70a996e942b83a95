//! Transforms applied to source tensors when materializing a destination

use candle_core::Tensor;
use paramap_common::{DataType, MappingError, Result};
use serde::{Deserialize, Serialize};

/// How the source tensors of one entry become the destination tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Combinator {
    /// Single source, cast to the destination dtype
    Cast,
    /// `arity` sources joined along `axis` in registration order, then cast
    Concat { arity: usize, axis: usize },
}

impl Combinator {
    /// Concatenation of `arity` sources along axis 0
    pub fn concat(arity: usize) -> Self {
        Self::concat_along(arity, 0)
    }

    pub fn concat_along(arity: usize, axis: usize) -> Self {
        Combinator::Concat { arity, axis }
    }

    /// Number of source tensors this combinator takes
    pub fn arity(&self) -> usize {
        match self {
            Combinator::Cast => 1,
            Combinator::Concat { arity, .. } => *arity,
        }
    }

    /// Combine `inputs` into the destination tensor called `name`
    pub fn apply(&self, name: &str, inputs: &[Tensor], target: DataType) -> Result<Tensor> {
        if inputs.len() != self.arity() {
            return Err(MappingError::ArityMismatch {
                name: name.to_string(),
                expected: self.arity(),
                actual: inputs.len(),
            }
            .into());
        }

        match self {
            Combinator::Cast => cast(&inputs[0], target),
            Combinator::Concat { axis, .. } => {
                let joined = Tensor::cat(inputs, *axis)?;
                cast(&joined, target)
            }
        }
    }
}

/// Cast to `target`; a tensor already of that dtype is returned as is
fn cast(tensor: &Tensor, target: DataType) -> Result<Tensor> {
    let dtype = target.to_candle();
    if tensor.dtype() == dtype {
        return Ok(tensor.clone());
    }
    Ok(tensor.to_dtype(dtype)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn arity() {
        assert_eq!(Combinator::Cast.arity(), 1);
        assert_eq!(Combinator::concat(3).arity(), 3);
        assert_eq!(Combinator::concat_along(2, 1), Combinator::Concat { arity: 2, axis: 1 });
    }

    #[test]
    fn cast_changes_dtype() {
        let t = Tensor::new(&[1.5f32, -2.0], &Device::Cpu).unwrap();
        let out = Combinator::Cast.apply("x", &[t], DataType::Float16).unwrap();
        assert_eq!(out.dtype(), DType::F16);
    }

    #[test]
    fn concat_orders_sources() {
        let a = Tensor::new(&[[1f32, 2.0]], &Device::Cpu).unwrap();
        let b = Tensor::new(&[[3f32, 4.0]], &Device::Cpu).unwrap();
        let rows = Combinator::concat(2).apply("x", &[a.clone(), b.clone()], DataType::Float32).unwrap();
        assert_eq!(rows.to_vec2::<f32>().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let cols = Combinator::concat_along(2, 1).apply("x", &[a, b], DataType::Float32).unwrap();
        assert_eq!(cols.to_vec2::<f32>().unwrap(), vec![vec![1.0, 2.0, 3.0, 4.0]]);
    }

    #[test]
    fn wrong_input_count() {
        let t = Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap();
        let err = Combinator::concat(3).apply("qkv", &[t.clone(), t], DataType::Float32).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Mapping error: Arity mismatch for qkv: combinator takes 3 input(s), got 2"
        );
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&Combinator::concat(3)).unwrap();
        assert_eq!(json, r#"{"op":"concat","arity":3,"axis":0}"#);
        assert_eq!(serde_json::to_string(&Combinator::Cast).unwrap(), r#"{"op":"cast"}"#);
    }
}
