//! Construction of an [`ExternMapping`] against a live parameter set.
//!
//! Loaders register their explicit renames and fusions first and then sweep
//! whatever is left with a naming rule. Every destination's dtype is taken
//! from the parameter set, so a registration for a name the model does not
//! declare fails on the spot.

use crate::{Combinator, ExternMapping};
use paramap_common::{MappingError, ParameterSet, Result};
use tracing::{debug, info};

pub struct MappingBuilder<'a> {
    params: &'a ParameterSet,
    mapping: ExternMapping,
}

impl<'a> MappingBuilder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params, mapping: ExternMapping::new() }
    }

    pub fn params(&self) -> &ParameterSet {
        self.params
    }

    /// Whether `destination` already has an entry
    pub fn contains(&self, destination: &str) -> bool {
        self.mapping.contains(destination)
    }

    /// Map `destination` to a single `source`, cast to the declared dtype
    pub fn add(&mut self, destination: impl Into<String>, source: impl Into<String>) -> Result<()> {
        self.add_with(destination, vec![source.into()], Combinator::Cast)
    }

    /// Map `destination` to the axis-0 concatenation of `sources`
    pub fn add_concat<I, S>(&mut self, destination: impl Into<String>, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_concat_along(destination, sources, 0)
    }

    pub fn add_concat_along<I, S>(
        &mut self,
        destination: impl Into<String>,
        sources: I,
        axis: usize,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        let combinator = Combinator::concat_along(sources.len(), axis);
        self.add_with(destination, sources, combinator)
    }

    pub fn add_with(
        &mut self,
        destination: impl Into<String>,
        sources: Vec<String>,
        combinator: Combinator,
    ) -> Result<()> {
        let name = destination.into();
        let Some(spec) = self.params.get(&name) else {
            return Err(MappingError::UnknownDestination { name }.into());
        };
        self.mapping.add_mapping(name, sources, combinator, spec.dtype)
    }

    pub fn add_unused(&mut self, source: impl Into<String>) -> Result<()> {
        self.mapping.add_unused(source)
    }

    /// Register every still-unmapped parameter whose source `rule` can name,
    /// in parameter order. Returns the destinations added.
    pub fn fill_remaining<F>(&mut self, rule: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let params = self.params;
        let pending: Vec<&str> = params.names().filter(|name| !self.mapping.contains(name)).collect();
        let mut added = Vec::with_capacity(pending.len());
        for name in pending {
            if let Some(source) = rule(name) {
                self.add(name, source)?;
                added.push(name.to_string());
            }
        }
        debug!(added = added.len(), total = params.len(), "filled remaining destinations");
        Ok(added)
    }

    /// Check completeness and hand out the mapping
    pub fn finish(self) -> Result<ExternMapping> {
        self.mapping.validate_against(self.params)?;
        info!(
            entries = self.mapping.len(),
            unused = self.mapping.unused_source_names().count(),
            "built extern mapping"
        );
        Ok(self.mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramap_common::{DataType, ParamKind, ParamSpec};

    fn params() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("embd.weight", ParamSpec::new([8, 4], DataType::Float16, ParamKind::Embedding)).unwrap();
        params.insert("qkv.weight", ParamSpec::new([12, 4], DataType::Float16, ParamKind::Linear)).unwrap();
        params.insert("norm.weight", ParamSpec::new([4], DataType::Float32, ParamKind::Norm)).unwrap();
        params
    }

    #[test]
    fn dtype_comes_from_parameter_set() {
        let params = params();
        let mut builder = MappingBuilder::new(&params);
        builder.add("norm.weight", "model.norm.weight").unwrap();
        builder.add_concat("qkv.weight", ["q.weight", "k.weight", "v.weight"]).unwrap();
        builder.add("embd.weight", "model.embed_tokens.weight").unwrap();
        let mapping = builder.finish().unwrap();

        assert_eq!(mapping.get("norm.weight").unwrap().target_dtype, DataType::Float32);
        let qkv = mapping.get("qkv.weight").unwrap();
        assert_eq!(qkv.target_dtype, DataType::Float16);
        assert_eq!(qkv.combinator, Combinator::concat(3));
    }

    #[test]
    fn unknown_destination_fails_loudly() {
        let params = params();
        let mut builder = MappingBuilder::new(&params);
        let err = builder.add("h.7.ln.weight", "model.layers.7.input_layernorm.weight").unwrap_err();
        assert_eq!(err.to_string(), "Mapping error: Destination not in parameter set: h.7.ln.weight");
    }

    #[test]
    fn fill_remaining_skips_explicit_entries() {
        let params = params();
        let mut builder = MappingBuilder::new(&params);
        builder.add("embd.weight", "wte.weight").unwrap();
        let added = builder.fill_remaining(|name| Some(name.to_string())).unwrap();
        assert_eq!(added, vec!["qkv.weight", "norm.weight"]);
        let mapping = builder.finish().unwrap();
        assert_eq!(mapping.get("embd.weight").unwrap().source_names, vec!["wte.weight"]);
    }

    #[test]
    fn finish_rejects_gaps() {
        let params = params();
        let mut builder = MappingBuilder::new(&params);
        builder.fill_remaining(|name| (name != "norm.weight").then(|| name.to_string())).unwrap();
        assert!(!builder.contains("norm.weight"));
        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("never mapped: norm.weight"));
    }
}
