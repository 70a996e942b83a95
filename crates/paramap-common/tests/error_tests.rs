//! Error handling tests for paramap-common

use paramap_common::*;
use proptest::prelude::*;
use std::io;

#[test]
fn test_top_level_variants() {
    let config_error = ParamapError::Config("hidden size".to_string());
    assert_eq!(format!("{}", config_error), "Configuration error: hidden size");

    let validation_error = ParamapError::Validation("bad dtype".to_string());
    assert_eq!(format!("{}", validation_error), "Validation error: bad dtype");

    let mapping_error =
        ParamapError::Mapping(MappingError::DuplicateDestination { name: "w".to_string() });
    assert_eq!(format!("{}", mapping_error), "Mapping error: Destination already mapped: w");
}

#[test]
fn test_mapping_error_messages() {
    let unresolved = MappingError::UnresolvedDestination {
        names: vec!["a.weight".to_string(), "b.weight".to_string()],
    };
    assert_eq!(
        format!("{}", unresolved),
        "2 destination parameter(s) never mapped: a.weight, b.weight"
    );

    let arity = MappingError::ArityMismatch { name: "qkv".to_string(), expected: 3, actual: 2 };
    assert_eq!(
        format!("{}", arity),
        "Arity mismatch for qkv: combinator takes 3 input(s), got 2"
    );

    let missing = MappingError::MissingSource { name: "model.norm.weight".to_string() };
    assert_eq!(format!("{}", missing), "Source tensor not found: model.norm.weight");

    let dtype = MappingError::DtypeMismatch {
        name: "w".to_string(),
        expected: "float16".to_string(),
        actual: "float32".to_string(),
    };
    assert_eq!(format!("{}", dtype), "Dtype mismatch for w: expected float16, got float32");
}

#[test]
fn test_quantization_and_model_error_messages() {
    let preset = QuantizationError::UnknownPreset { name: "q9f9".to_string() };
    assert_eq!(format!("{}", preset), "Unknown quantization preset: q9f9");

    let group = QuantizationError::InvalidGroupSize { size: 0 };
    assert_eq!(format!("{}", group), "Invalid group size: 0");

    let source = ModelError::UnsupportedSource {
        model_type: "imp".to_string(),
        format: "awq".to_string(),
    };
    assert_eq!(format!("{}", source), "Model imp has no loader for source format awq");
}

#[test]
fn test_error_conversions() {
    let err: ParamapError = MappingError::EmptySources { name: "x".to_string() }.into();
    assert!(matches!(err, ParamapError::Mapping(_)));

    let err: ParamapError =
        QuantizationError::UnsupportedType { qtype: "int3".to_string() }.into();
    assert!(matches!(err, ParamapError::Quantization(_)));

    let err: ParamapError = ModelError::UnknownModelType { model_type: "gpt".to_string() }.into();
    assert!(matches!(err, ParamapError::Model(_)));

    let err: ParamapError = io::Error::new(io::ErrorKind::NotFound, "config.json").into();
    assert!(matches!(err, ParamapError::Io(_)));

    let json_err = serde_json::from_str::<DataType>("\"int4\"").unwrap_err();
    let err: ParamapError = json_err.into();
    assert!(matches!(err, ParamapError::Json(_)));
}

#[test]
fn test_error_chain() {
    use std::error::Error as _;

    let err = ParamapError::Mapping(MappingError::UnknownDestination { name: "h.3".to_string() });
    let source = err.source().expect("mapping errors carry a source");
    assert_eq!(source.to_string(), "Destination not in parameter set: h.3");
}

proptest! {
    #[test]
    fn test_duplicate_destination_with_arbitrary_names(name in "\\PC*") {
        let error = MappingError::DuplicateDestination { name: name.clone() };
        let rendered = format!("{}", error);
        prop_assert!(rendered.contains(&name));
    }

    #[test]
    fn test_group_size_error_with_arbitrary_sizes(size in any::<usize>()) {
        let error = QuantizationError::InvalidGroupSize { size };
        let rendered = format!("{}", error);
        prop_assert!(rendered.contains(&size.to_string()));
    }
}
