// layout constants shared by every emitted container
pub const ALIGN: usize = 0x10;
pub const HEADER_SIZE: u32 = 24;

pub const KIND_SCRIPT: &[u8; 4] = b"PLOP";
pub const KIND_DRAMA: &[u8; 4] = b"DRAC";

/// `-1` for every absent index or string reference.
pub const ABSENT: i32 = -1;

use std::fmt;
use std::path::PathBuf;

use log::{error, warn};
use serde::Deserialize;

use crate::processor::blob::ScriptUnit;
use crate::processor::drama::DramaDocument;
use crate::processor::opcode::OpcodeMap;

/// Where a diagnostic points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// 1-based source line.
    Line(usize),
    /// Ordinal of a `node` element in document order.
    Node(usize),
    /// Line inside an embedded dialogue snippet.
    Snippet { snippet: usize, line: usize },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(line) => write!(f, "line {line}"),
            Location::Node(node) => write!(f, "node #{node}"),
            Location::Snippet { snippet, line } => write!(f, "snippet {snippet}, line {line}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The line or node was skipped.
    Error,
    Warning,
}

/// Advisory message about a skipped or suspicious input unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn error(location: Location, message: impl fmt::Display) -> Self {
        let message = message.to_string();
        error!("{location}: {message}");
        Self {
            severity: Severity::Error,
            location,
            message,
        }
    }

    pub fn warning(location: Location, message: impl fmt::Display) -> Self {
        let message = message.to_string();
        warn!("{location}: {message}");
        Self {
            severity: Severity::Warning,
            location,
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}: {}", self.location, self.message)
    }
}

/// ─────────────────────────────────────────────────────
/// Build manifest (JSON)
/// ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Script,
    Drama,
}

impl UnitKind {
    /// `.drama` sources are dialogue trees, everything else is script.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("drama") => UnitKind::Drama,
            _ => UnitKind::Script,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            UnitKind::Script => "plop",
            UnitKind::Drama => "drac",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestUnit {
    pub source: PathBuf,
    #[serde(default)]
    pub kind: Option<UnitKind>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub opcodes: Option<PathBuf>,
    pub units: Vec<ManifestUnit>,
}

/// One source to compile, with its text already read.
#[derive(Debug, Clone)]
pub struct RawUnit {
    pub kind: UnitKind,
    pub source: PathBuf,
    /// Output file name, relative to the output directory.
    pub output: PathBuf,
    pub text: String,
}

/// Everything the processor needs, as it comes out of the loader.
#[derive(Debug, Clone)]
pub struct RawProject {
    pub opcodes: OpcodeMap,
    pub units: Vec<RawUnit>,
}

#[derive(Debug, Clone)]
pub enum CompiledUnit {
    Script(ScriptUnit),
    Drama(DramaDocument),
}

impl CompiledUnit {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompiledUnit::Script(script) => script.diagnostics(),
            CompiledUnit::Drama(drama) => drama.diagnostics(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedUnit {
    pub source: PathBuf,
    pub output: PathBuf,
    pub compiled: CompiledUnit,
}

/// Fully processed output handed to `writer`.
#[derive(Debug, Clone)]
pub struct ProcessedProject {
    pub opcodes: OpcodeMap,
    pub units: Vec<ProcessedUnit>,
}
