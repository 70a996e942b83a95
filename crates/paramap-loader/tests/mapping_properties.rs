//! Property tests for extern mappings and combinators

use candle_core::{DType, Device, Tensor};
use paramap_common::{DataType, ParamKind, ParamSpec, ParameterSet};
use paramap_loader::{Combinator, ExternMapping, MappingBuilder};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn float_dtype() -> impl Strategy<Value = DataType> {
    prop::sample::select(vec![DataType::Float16, DataType::BFloat16, DataType::Float32])
}

proptest! {
    #[test]
    fn prop_cast_to_own_dtype_is_bit_identical(
        data in prop::collection::vec(-1e3f32..1e3, 1..64),
        dtype in float_dtype(),
    ) {
        let tensor = Tensor::from_vec(data.clone(), data.len(), &Device::Cpu)
            .unwrap()
            .to_dtype(dtype.to_candle())
            .unwrap();
        let out = Combinator::Cast.apply("w", &[tensor.clone()], dtype).unwrap();
        prop_assert_eq!(out.dtype(), tensor.dtype());
        let a = tensor.to_dtype(DType::F32).unwrap().to_vec1::<f32>().unwrap();
        let b = out.to_dtype(DType::F32).unwrap().to_vec1::<f32>().unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_concat_slices_back_to_sources(
        rows in prop::collection::vec(1usize..6, 1..5),
        cols in 1usize..8,
    ) {
        let parts: Vec<Tensor> = rows
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let data: Vec<f32> = (0..r * cols).map(|j| (i * 100 + j) as f32).collect();
                Tensor::from_vec(data, (r, cols), &Device::Cpu).unwrap()
            })
            .collect();
        let fused = Combinator::concat(parts.len()).apply("fused", &parts, DataType::Float32).unwrap();
        prop_assert_eq!(fused.dims(), &[rows.iter().sum::<usize>(), cols]);

        let mut offset = 0;
        for (part, &r) in parts.iter().zip(rows.iter()) {
            let slice = fused.narrow(0, offset, r).unwrap();
            prop_assert_eq!(slice.to_vec2::<f32>().unwrap(), part.to_vec2::<f32>().unwrap());
            offset += r;
        }
    }

    #[test]
    fn prop_unused_never_consumed(
        ops in prop::collection::vec((any::<bool>(), 0usize..6), 1..30),
    ) {
        let mut mapping = ExternMapping::new();
        for (i, (unused, source)) in ops.into_iter().enumerate() {
            let source = format!("src.{source}");
            let _ = if unused {
                mapping.add_unused(source)
            } else {
                mapping.add_mapping(format!("dst.{i}"), vec![source], Combinator::Cast, DataType::Float32)
            };
        }
        let unused: BTreeSet<&str> = mapping.unused_source_names().collect();
        let consumed: BTreeSet<&str> = mapping.consumed_source_names().collect();
        prop_assert!(unused.is_disjoint(&consumed));
        for (_, entry) in mapping.entries() {
            prop_assert_eq!(entry.combinator.arity(), entry.source_names.len());
        }
    }

    #[test]
    fn prop_builder_maps_every_parameter_once(names in prop::collection::btree_set("[a-z]{1,6}", 1..20)) {
        let mut params = ParameterSet::new();
        for name in &names {
            params.insert(format!("{name}.weight"), ParamSpec::new([2], DataType::Float16, ParamKind::Other)).unwrap();
        }
        let mut builder = MappingBuilder::new(&params);
        let first = params.names().next().unwrap().to_string();
        builder.add(first.clone(), format!("hf.{first}")).unwrap();
        let added = builder.fill_remaining(|name| Some(name.to_string())).unwrap();
        prop_assert_eq!(added.len(), params.len() - 1);
        prop_assert!(!added.contains(&first));

        let mapping = builder.finish().unwrap();
        prop_assert_eq!(mapping.len(), params.len());
        prop_assert_eq!(mapping.get(&first).unwrap().source_names.clone(), vec![format!("hf.{first}")]);
    }
}

#[test]
fn mapping_serializes_for_inspection() {
    let mut params = ParameterSet::new();
    params.insert("qkv.weight", ParamSpec::new([6, 2], DataType::Float16, ParamKind::Linear)).unwrap();
    let mut builder = MappingBuilder::new(&params);
    builder.add_concat("qkv.weight", ["q", "k", "v"]).unwrap();
    builder.add_unused("rotary.inv_freq").unwrap();
    let mapping = builder.finish().unwrap();

    let json = serde_json::to_string(&mapping).unwrap();
    insta::assert_snapshot!(json, @r#"{"entries":{"qkv.weight":{"source_names":["q","k","v"],"combinator":{"op":"concat","arity":3,"axis":0},"target_dtype":"float16"}},"unused_source_names":["rotary.inv_freq"]}"#);
}
