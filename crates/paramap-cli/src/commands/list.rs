//! `models` and `quantizations` listings

use anyhow::Result;
use paramap_models::registry::MODELS;
use paramap_quantization::{PRESET_NAMES, Quantization};
use std::io::{self, Write};

pub fn list_models() -> Result<()> {
    let mut out = io::stdout().lock();
    for family in MODELS {
        let sources: Vec<_> = family.source_formats.iter().map(|s| s.as_str()).collect();
        let kinds: Vec<_> = family.quantization_kinds.iter().map(|k| k.as_str()).collect();
        writeln!(out, "{:<8} {}", family.name, family.description)?;
        writeln!(out, "         sources: {}", sources.join(", "))?;
        writeln!(out, "         quantizations: {}", kinds.join(", "))?;
    }
    Ok(())
}

pub fn list_quantizations() -> Result<()> {
    let mut out = io::stdout().lock();
    for name in PRESET_NAMES {
        writeln!(out, "{}", Quantization::from_name(name)?.summary())?;
    }
    Ok(())
}
