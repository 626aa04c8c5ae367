use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a script/drama source or a .json build manifest
    Build {
        /// Input source file or .json manifest
        input: PathBuf,
        /// Output directory
        output: PathBuf,
        /// plop_op.inc opcode definitions (overrides the manifest)
        #[arg(long)]
        opcodes: Option<PathBuf>,
        /// Also write a .dis listing for every binary
        #[arg(long)]
        disasm: bool,
        /// Also write plop_op.inc for the opcode numbering in use
        #[arg(long)]
        emit_inc: bool,
    },
    /// Dump a compiled .plop/.drac binary
    Info {
        file: PathBuf,
        /// plop_op.inc opcode definitions the binary was built with
        #[arg(long)]
        opcodes: Option<PathBuf>,
    },
}

impl Cli {
    /// Log filter implied by `-v`, used when RUST_LOG is not set.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
