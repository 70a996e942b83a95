//! Declaration helpers for common layer shapes.
//!
//! A [`ParamScope`] is a name prefix over a [`ParameterSet`], the way a var
//! builder is scoped with `pp`. Layers declare their parameters relative to
//! the scope they are given.

use paramap_common::{DataType, ParamKind, ParamSpec, ParameterSet, Result};

pub struct ParamScope<'a> {
    params: &'a mut ParameterSet,
    prefix: String,
    dtype: DataType,
}

impl<'a> ParamScope<'a> {
    pub fn root(params: &'a mut ParameterSet, dtype: DataType) -> Self {
        Self { params, prefix: String::new(), dtype }
    }

    /// Scope nested under `name`
    pub fn pp(&mut self, name: impl AsRef<str>) -> ParamScope<'_> {
        let prefix = self.path(name.as_ref());
        ParamScope { params: &mut *self.params, prefix, dtype: self.dtype }
    }

    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() { name.to_string() } else { format!("{}.{name}", self.prefix) }
    }

    pub fn param(&mut self, name: &str, shape: &[usize], kind: ParamKind) -> Result<()> {
        let path = self.path(name);
        self.params.insert(path, ParamSpec::new(shape.to_vec(), self.dtype, kind))
    }

    /// `weight [out, in]` plus an optional `bias [out]`
    pub fn linear(&mut self, name: &str, in_features: usize, out_features: usize, bias: bool) -> Result<()> {
        let mut scope = self.pp(name);
        scope.param("weight", &[out_features, in_features], ParamKind::Linear)?;
        if bias {
            scope.param("bias", &[out_features], ParamKind::Bias)?;
        }
        Ok(())
    }

    pub fn layer_norm(&mut self, name: &str, dim: usize) -> Result<()> {
        let mut scope = self.pp(name);
        scope.param("weight", &[dim], ParamKind::Norm)?;
        scope.param("bias", &[dim], ParamKind::Norm)
    }

    pub fn rms_norm(&mut self, name: &str, dim: usize) -> Result<()> {
        self.pp(name).param("weight", &[dim], ParamKind::Norm)
    }

    pub fn embedding(&mut self, name: &str, num: usize, dim: usize) -> Result<()> {
        self.pp(name).param("weight", &[num, dim], ParamKind::Embedding)
    }

    /// Square-kernel 2-D convolution, `weight [out, in, k, k]`
    pub fn conv2d(&mut self, name: &str, in_channels: usize, out_channels: usize, kernel: usize, bias: bool) -> Result<()> {
        let mut scope = self.pp(name);
        scope.param("weight", &[out_channels, in_channels, kernel, kernel], ParamKind::Conv)?;
        if bias {
            scope.param("bias", &[out_channels], ParamKind::Bias)?;
        }
        Ok(())
    }
}
