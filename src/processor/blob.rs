//! A script unit: every line of one source compiled into its own block.
//!
//! Lines are independent. A line that fails to lex, parse or compile is
//! reported as a diagnostic and skipped; the rest of the unit still builds.

use log::{debug, log_enabled};

use crate::model::{Diagnostic, Location};

use super::compiler::{Block, compile_block};
use super::disasm;
use super::lexer::tokenize_line;
use super::opcode::OpcodeMap;
use super::script_parser::parse_line;
use super::strings::{StrId, StringTable, WriteIds};

#[derive(Debug, Clone)]
pub struct ScriptUnit {
    strings: StringTable,
    blocks: Vec<Block>,
    opcodes: OpcodeMap,
    diagnostics: Vec<Diagnostic>,
}

impl ScriptUnit {
    /// Compiles a whole script source, one form per line.
    pub fn compile(src: &str, opcodes: &OpcodeMap) -> Self {
        let mut unit = Self {
            strings: StringTable::new(),
            blocks: Vec::new(),
            opcodes: opcodes.clone(),
            diagnostics: Vec::new(),
        };
        for (i, line) in src.lines().enumerate() {
            unit.compile_line(i + 1, line);
        }
        debug!(
            "script unit: {} block(s), {} string(s), {} diagnostic(s)",
            unit.blocks.len(),
            unit.strings.len(),
            unit.diagnostics.len()
        );
        unit
    }

    fn compile_line(&mut self, line_no: usize, line: &str) {
        let location = Location::Line(line_no);
        let line = line.replace('\t', " ");

        let tokens = match tokenize_line(&line, &mut self.strings) {
            Ok(tokens) => tokens,
            Err(e) => return self.diagnostics.push(Diagnostic::error(location, e)),
        };
        let parsed = match parse_line(tokens) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return,
            Err(e) => return self.diagnostics.push(Diagnostic::error(location, e)),
        };
        if parsed.trailing > 0 {
            self.diagnostics.push(Diagnostic::warning(
                location,
                format!("{} token(s) after the first form ignored", parsed.trailing),
            ));
        }

        debug!("{}: {}", self.blocks.len(), parsed.expr);
        match compile_block(&parsed.expr, &mut self.strings, &self.opcodes) {
            Ok(block) => {
                if log_enabled!(log::Level::Trace) {
                    if let Ok(text) = disasm::listing(block.code(), &self.opcodes, &self.strings) {
                        log::trace!("block {}:\n{text}", self.blocks.len());
                    }
                }
                self.blocks.push(block);
            }
            Err(e) => self.diagnostics.push(Diagnostic::error(location, e)),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every string reference of the unit, block by block, in code order.
    pub fn string_refs(&self) -> impl Iterator<Item = StrId> + '_ {
        self.blocks.iter().flat_map(Block::string_refs)
    }

    /// Assigns write ids across all blocks of the unit.
    pub fn write_ids(&self) -> WriteIds<'_> {
        self.strings.resolve(self.string_refs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    #[test]
    fn test_one_block_per_line() {
        let src = "\
; header comment
(defvar hp 10)

(set hp (- hp 1))\t; tabs and comments
42
";
        let unit = ScriptUnit::compile(src, &OpcodeMap::default());
        assert_eq!(unit.blocks().len(), 3);
        assert!(unit.diagnostics().is_empty());
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let src = "(f 1\n(g 2)\n(if a b)\n) \n(h \"x)\n(k)";
        let unit = ScriptUnit::compile(src, &OpcodeMap::default());
        assert_eq!(unit.blocks().len(), 2);

        let lines: Vec<_> = unit
            .diagnostics()
            .iter()
            .map(|d| (d.location, d.severity))
            .collect();
        assert_eq!(
            lines,
            vec![
                (Location::Line(1), Severity::Error),
                (Location::Line(3), Severity::Error),
                (Location::Line(4), Severity::Error),
                (Location::Line(5), Severity::Error),
            ]
        );
    }

    #[test]
    fn test_trailing_form_warns() {
        let unit = ScriptUnit::compile("(a) (b)", &OpcodeMap::default());
        assert_eq!(unit.blocks().len(), 1);
        assert_eq!(unit.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_stray_close_after_form_is_an_error() {
        let test_cases = vec!["(f 1))", "(f 1) (g))", "(f 1) (g"];

        for src in test_cases {
            let unit = ScriptUnit::compile(src, &OpcodeMap::default());
            assert!(unit.blocks().is_empty(), "source: {src}");
            let lines: Vec<_> = unit
                .diagnostics()
                .iter()
                .map(|d| (d.location, d.severity))
                .collect();
            assert_eq!(lines, vec![(Location::Line(1), Severity::Error)], "source: {src}");
        }
    }

    #[test]
    fn test_deep_nesting_is_a_line_error() {
        let deep = format!("{}{}", "(f ".repeat(100_000), ")".repeat(100_000));
        let unit = ScriptUnit::compile(&format!("{deep}
(g)"), &OpcodeMap::default());
        assert_eq!(unit.blocks().len(), 1);
        assert_eq!(unit.diagnostics().len(), 1);
        assert_eq!(unit.diagnostics()[0].location, Location::Line(1));
        assert_eq!(unit.diagnostics()[0].severity, Severity::Error);
    }

    #[test]
    fn test_write_ids_across_blocks() {
        let unit = ScriptUnit::compile("(f a b)\n(f b c)", &OpcodeMap::default());
        let ids = unit.write_ids();
        let order: Vec<_> = ids.strings().collect();
        assert_eq!(order, vec!["f", "a", "b", "c"]);

        let unit = ScriptUnit::compile("(list \"a\" \"b\")\n(list \"b\" \"c\")", &OpcodeMap::default());
        let ids = unit.write_ids();
        for (text, expected) in [("a", 0), ("b", 1), ("c", 2)] {
            let sid = unit.strings().find(text).unwrap();
            assert_eq!(ids.write_id(sid), Some(expected), "{text}");
        }
    }

    #[test]
    fn test_failed_line_strings_are_not_referenced() {
        let unit = ScriptUnit::compile("(f \"lost\" (\n(g \"kept\")", &OpcodeMap::default());
        assert!(unit.strings().find("lost").is_some());
        let ids = unit.write_ids();
        assert_eq!(ids.strings().collect::<Vec<_>>(), vec!["g", "kept"]);
    }
}
