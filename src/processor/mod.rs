//! The functional core: compiles every loaded source into an in-memory unit.
pub mod ast;
pub mod blob;
pub mod compiler;
pub mod disasm;
pub mod drama;
pub mod lexer;
pub mod opcode;
pub mod script_parser;
pub mod strings;

use anyhow::{Context, Result};
use log::info;

use crate::model::{CompiledUnit, ProcessedProject, ProcessedUnit, RawProject, UnitKind};
use blob::ScriptUnit;
use drama::DramaDocument;

/// Runs every processing pass and returns a read-only structure for writers.
///
/// Any unit that cannot be compiled at all fails the whole project, so that
/// nothing is written for a partial build.
pub fn run(raw: &RawProject) -> Result<ProcessedProject> {
    let mut units = Vec::with_capacity(raw.units.len());

    for unit in &raw.units {
        let compiled = match unit.kind {
            UnitKind::Script => CompiledUnit::Script(ScriptUnit::compile(&unit.text, &raw.opcodes)),
            UnitKind::Drama => CompiledUnit::Drama(
                DramaDocument::compile(&unit.text, &raw.opcodes)
                    .with_context(|| format!("Compiling {}", unit.source.display()))?,
            ),
        };
        info!(
            "{}: {} diagnostic(s)",
            unit.source.display(),
            compiled.diagnostics().len()
        );
        units.push(ProcessedUnit {
            source: unit.source.clone(),
            output: unit.output.clone(),
            compiled,
        });
    }

    Ok(ProcessedProject {
        opcodes: raw.opcodes.clone(),
        units,
    })
}
