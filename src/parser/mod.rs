//! Input side: turns a build manifest or a single source into a `RawProject`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::model::{Manifest, ManifestUnit, RawProject, RawUnit, UnitKind};
use crate::processor::opcode::OpcodeMap;

/// Loads `input`, which is either a `.json` build manifest or one source file.
///
/// `opcodes` overrides the manifest's opcode definition file.
pub fn load(input: &Path, opcodes: Option<&Path>) -> Result<RawProject> {
    let is_manifest = input.extension().is_some_and(|e| e == "json");
    let (manifest, base) = if is_manifest {
        let json = fs::read_to_string(input)
            .with_context(|| format!("Reading {}", input.display()))?;
        let manifest = load_from_json(&json)
            .with_context(|| format!("Parsing manifest {}", input.display()))?;
        let base = input.parent().map(Path::to_path_buf).unwrap_or_default();
        (manifest, base)
    } else {
        let manifest = Manifest {
            opcodes: None,
            units: vec![ManifestUnit {
                source: input.to_path_buf(),
                kind: None,
                output: None,
            }],
        };
        (manifest, PathBuf::new())
    };

    let opcodes_path = match opcodes {
        Some(path) => Some(path.to_path_buf()),
        None => manifest.opcodes.as_ref().map(|p| base.join(p)),
    };
    let opcodes = load_opcodes(opcodes_path.as_deref())?;

    let mut units = Vec::with_capacity(manifest.units.len());
    for entry in &manifest.units {
        let unit = resolve_unit(entry, &base);
        let text = fs::read_to_string(&unit.source)
            .with_context(|| format!("Reading {}", unit.source.display()))?;
        debug!(
            "{} ({:?}, {} bytes) -> {}",
            unit.source.display(),
            unit.kind,
            text.len(),
            unit.output.display()
        );
        units.push(RawUnit { text, ..unit });
    }
    info!("loaded {} unit(s)", units.len());

    Ok(RawProject { opcodes, units })
}

/// Parses the JSON build manifest.
pub fn load_from_json(json: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_str(json)?;
    if manifest.units.is_empty() {
        return Err(anyhow!("manifest lists no units"));
    }
    Ok(manifest)
}

/// Applies defaults and resolves the source against `base`; text is left empty.
pub fn resolve_unit(entry: &ManifestUnit, base: &Path) -> RawUnit {
    let source = base.join(&entry.source);
    let kind = entry.kind.unwrap_or_else(|| UnitKind::from_path(&entry.source));
    let output = entry
        .output
        .clone()
        .unwrap_or_else(|| default_output(&entry.source, kind));
    RawUnit {
        kind,
        source,
        output,
        text: String::new(),
    }
}

/// Source file stem with the extension of the unit kind.
pub fn default_output(source: &Path, kind: UnitKind) -> PathBuf {
    let stem = source.file_stem().unwrap_or(source.as_os_str());
    Path::new(stem).with_extension(kind.extension())
}

/// Reads a `plop_op.inc` file, or returns the built-in numbering.
pub fn load_opcodes(path: Option<&Path>) -> Result<OpcodeMap> {
    let Some(path) = path else {
        return Ok(OpcodeMap::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let map = OpcodeMap::from_inc(&text)
        .with_context(|| format!("Loading opcodes from {}", path.display()))?;
    info!("opcodes loaded from {}", path.display());
    Ok(map)
}
