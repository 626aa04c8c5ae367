pub mod cli;
pub mod model;
pub mod parser;
pub mod processor;
pub mod reader;
pub mod writer;

use std::path::Path;

use anyhow::Context;

use cli::{Cli, Command};

pub fn run(args: Cli) -> anyhow::Result<()> {
    match args.command {
        Command::Build {
            input,
            output,
            opcodes,
            disasm,
            emit_inc,
        } => build(&input, &output, opcodes.as_deref(), disasm, emit_inc),
        Command::Info { file, opcodes } => info(&file, opcodes.as_deref()),
    }
}

pub fn build(
    input: &Path,
    output: &Path,
    opcodes: Option<&Path>,
    disasm: bool,
    emit_inc: bool,
) -> anyhow::Result<()> {
    // 1. ── Parse ──────────────────────────────────────────────────────
    let raw_project = parser::load(input, opcodes)
        .with_context(|| format!("Loading {}", input.display()))?;

    // 2. ── Process ────────────────────────────────────────────────────
    let processed =
        processor::run(&raw_project).with_context(|| "Compiling scripts and dramas")?;

    // 3. ── Write outputs ──────────────────────────────────────────────
    std::fs::create_dir_all(output)
        .with_context(|| format!("Creating {}", output.display()))?;

    writer::bin::emit(&processed, output).with_context(|| "Writing binary artifacts")?;
    if disasm {
        writer::listing::emit(&processed, output).with_context(|| "Writing listings")?;
    }
    if emit_inc {
        writer::c::emit(&processed.opcodes, output).with_context(|| "Writing opcode include")?;
    }

    Ok(())
}

pub fn info(file: &Path, opcodes: Option<&Path>) -> anyhow::Result<()> {
    let opcodes = parser::load_opcodes(opcodes)?;
    let bytes = std::fs::read(file).with_context(|| format!("Reading {}", file.display()))?;
    let view = reader::read(&bytes).with_context(|| format!("Decoding {}", file.display()))?;
    let text = writer::listing::container(&view, &opcodes)
        .with_context(|| format!("Disassembling {}", file.display()))?;
    print!("{text}");
    Ok(())
}
