//! Identity strategy

use crate::mapping::QuantizeMapping;
use crate::{QuantizationKind, QuantizeStrategy};
use paramap_common::{DataType, ParameterSet, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keeps every parameter dense at `model_dtype`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoQuantize {
    pub name: String,
    pub model_dtype: DataType,
}

impl NoQuantize {
    pub fn new(name: impl Into<String>, model_dtype: DataType) -> Self {
        Self { name: name.into(), model_dtype }
    }
}

impl QuantizeStrategy for NoQuantize {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> QuantizationKind {
        QuantizationKind::NoQuant
    }

    fn model_dtype(&self) -> DataType {
        self.model_dtype
    }

    fn rewrite(
        &self,
        params: ParameterSet,
        _quant_map: &mut QuantizeMapping,
        _prefix: &str,
    ) -> Result<ParameterSet> {
        debug!(strategy = %self.name, params = params.len(), "no quantization applied");
        Ok(params)
    }
}
