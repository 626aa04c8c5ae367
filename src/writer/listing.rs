//! Human-readable dumps of emitted containers.
//!
//! Listings are produced from the bytes as written, so they show write ids
//! and exactly the offsets the runtime will see.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use crate::model::ProcessedProject;
use crate::processor::disasm::{self, DisasmError};
use crate::processor::opcode::OpcodeMap;
use crate::reader::{self, Container, DramaView, ScriptView, StringList};

use super::bin::export_unit;

const RULE: &str = "____________________________________";

pub fn script(view: &ScriptView<'_>, opcodes: &OpcodeMap) -> Result<String, DisasmError> {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = writeln!(out, "{} block(s), {} string(s)", view.blocks.len(), view.strings.len());
    for (i, block) in view.blocks.iter().enumerate() {
        let _ = writeln!(out, "\nblock {i} ({} words)", block.len());
        out.push_str(&disasm::listing(block, opcodes, &view.strings)?);
    }
    Ok(out)
}

fn text_or_none<'a>(strings: &StringList<'a>, id: i32) -> &'a str {
    strings.get(id).unwrap_or("[NONE]")
}

fn snippet_ref(id: i32, view: &DramaView<'_>) -> String {
    match usize::try_from(id).ok().and_then(|i| view.scripts.get(i)) {
        Some(s) => format!("snippet {id} ; {} block(s)", s.blocks.len()),
        None => "[NONE]".to_owned(),
    }
}

pub fn drama(view: &DramaView<'_>, opcodes: &OpcodeMap) -> Result<String, DisasmError> {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = writeln!(out, "Total {} nodes", view.nodes.len());
    for (i, node) in view.nodes.iter().enumerate() {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Node {i} id='{}'\n", text_or_none(&view.strings, node.id));
        let _ = writeln!(out, "[Before]: {}", snippet_ref(node.before, view));
        let _ = writeln!(out, "[Player says]: {}", text_or_none(&view.strings, node.plsay));
        let _ = writeln!(out, "[Character says]: {}", text_or_none(&view.strings, node.say));
        let _ = writeln!(out, "[After]: {}", snippet_ref(node.after, view));
    }
    for (i, snippet) in view.scripts.iter().enumerate() {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Snippet {i}: {}", script(snippet, opcodes)?);
    }
    Ok(out)
}

pub fn container(view: &Container<'_>, opcodes: &OpcodeMap) -> Result<String, DisasmError> {
    match view {
        Container::Script(s) => script(s, opcodes),
        Container::Drama(d) => drama(d, opcodes),
    }
}

/// Listing file name: the output name with `.dis` appended.
pub fn listing_path(out_dir: &Path, output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".dis");
    out_dir.join(name)
}

/// Writes a `.dis` listing next to every binary.
pub fn emit(project: &ProcessedProject, out_dir: &Path) -> anyhow::Result<()> {
    for unit in &project.units {
        let w = export_unit(&unit.compiled)?;
        let view = reader::read(w.as_bytes())
            .with_context(|| format!("Reading back {}", unit.output.display()))?;
        let text = container(&view, &project.opcodes)?;
        let path = listing_path(out_dir, &unit.output);
        fs::write(&path, text).with_context(|| format!("Writing {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::blob::ScriptUnit;
    use crate::processor::drama::DramaDocument;
    use crate::writer::bin::Exporter;

    #[test]
    fn test_script_listing_uses_write_ids() {
        let map = OpcodeMap::default();
        let unit = ScriptUnit::compile("(f \"dropped\" (\n(set x \"hi\")", &map);
        let bytes = unit.to_bytes().unwrap();
        let Container::Script(view) = reader::read(&bytes).unwrap() else {
            panic!("expected a script container");
        };
        let text = script(&view, &map).unwrap();
        let expected = "\
1 block(s), 2 string(s)

block 0 (7 words)
    0: BEGIN <7>
    2: SET 0 ; x
    4: SVAL 1 ; hi
    6: END
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_drama_listing() {
        let map = OpcodeMap::default();
        let src = ";$<node id=\"a\"><plsay>Yes?</plsay><after>(g)</after></node>";
        let doc = DramaDocument::compile(src, &map).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let view = reader::read(&bytes).unwrap();
        let text = container(&view, &map).unwrap();

        let lines: Vec<&str> = text.lines().take(8).collect();
        assert_eq!(
            lines,
            vec![
                "Total 1 nodes",
                RULE,
                "Node 0 id='a'",
                "",
                "[Before]: [NONE]",
                "[Player says]: Yes?",
                "[Character says]: [NONE]",
                "[After]: snippet 0 ; 1 block(s)",
            ]
        );
        assert!(text.contains("Snippet 0: 1 block(s), 1 string(s)"));
        assert!(text.contains("CALL (0)"));
    }

    #[test]
    fn test_listing_path() {
        let path = listing_path(Path::new("out"), Path::new("intro.plop"));
        assert_eq!(path, Path::new("out").join("intro.plop.dis"));
    }
}
