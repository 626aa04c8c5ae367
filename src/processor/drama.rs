//! Dialogue trees ("drama") and the script snippets they embed.
//!
//! Drama sources live inside comment blocks of other files, so every line
//! may carry a `;$` marker. Lines are stripped of it, wrapped in a synthetic
//! `<drama>` root and read as markup:
//!
//! ```text
//! ;$ <node id="greet">
//! ;$   <before>(set met 1)</before>
//! ;$   <plsay>Good evening.</plsay>
//! ;$   <say>Hey.</say>
//! ;$ </node>
//! ```
//!
//! Script snippets (`before` / `after`) are compiled into standalone script
//! units once the whole document has been read.

use log::{debug, info};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::model::{Diagnostic, Location};

use super::blob::ScriptUnit;
use super::opcode::OpcodeMap;
use super::strings::{StrId, StringTable, WriteIds};

const LINE_MARKER: &str = ";$";

#[derive(Debug, Error)]
pub enum DramaError {
    #[error("malformed dialogue markup at byte {position}: {source}")]
    Xml {
        position: u64,
        source: quick_xml::Error,
    },
}

/// One dialogue node, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueNode {
    pub id: Option<StrId>,
    /// Index into the document's snippets.
    pub before: Option<usize>,
    pub after: Option<usize>,
    /// Polite (formal) utterance.
    pub plsay: Option<StrId>,
    pub say: Option<StrId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Before,
    After,
    PlSay,
    Say,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"before" => Some(Field::Before),
            b"after" => Some(Field::After),
            b"plsay" => Some(Field::PlSay),
            b"say" => Some(Field::Say),
            _ => None,
        }
    }
}

/// A node as read from markup, before interning.
#[derive(Debug, Default)]
struct NodeDraft {
    ordinal: usize,
    id: Option<String>,
    fields: [Option<String>; 4],
}

impl NodeDraft {
    fn new(ordinal: usize, start: &BytesStart<'_>) -> Self {
        let id = start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == b"id")
            .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string())
            .filter(|id| !id.is_empty());
        Self {
            ordinal,
            id,
            ..Self::default()
        }
    }

    /// First occurrence wins; blank text counts as absent.
    fn set(&mut self, field: Field, text: &str) {
        let slot = &mut self.fields[field as usize];
        let text = text.trim();
        if slot.is_none() && !text.is_empty() {
            *slot = Some(text.to_owned());
        }
    }

    fn take(&mut self, field: Field) -> Option<String> {
        self.fields[field as usize].take()
    }
}

/// Lines of a drama source turned into a single markup document.
pub fn prepare_markup(src: &str) -> String {
    let mut xml = String::from("<drama>\n");
    for line in src.lines() {
        let line = line.replace('\t', " ");
        let line = line.trim_start();
        let line = line.strip_prefix(LINE_MARKER).unwrap_or(line).trim_start();
        if !line.is_empty() {
            xml.push_str(line);
            xml.push('\n');
        }
    }
    xml.push_str("</drama>\n");
    xml
}

#[derive(Debug, Clone, Default)]
pub struct DramaDocument {
    strings: StringTable,
    nodes: Vec<DialogueNode>,
    snippets: Vec<String>,
    scripts: Vec<ScriptUnit>,
    diagnostics: Vec<Diagnostic>,
}

impl DramaDocument {
    /// Reads a drama source and compiles its snippets.
    pub fn compile(src: &str, opcodes: &OpcodeMap) -> Result<Self, DramaError> {
        let markup = prepare_markup(src);
        let mut doc = Self::default();
        doc.read_markup(&markup)?;
        doc.compile_snippets(opcodes);
        info!(
            "drama: {} node(s), {} snippet(s), {} diagnostic(s)",
            doc.nodes.len(),
            doc.snippets.len(),
            doc.diagnostics.len()
        );
        Ok(doc)
    }

    fn read_markup(&mut self, markup: &str) -> Result<(), DramaError> {
        let mut reader = Reader::from_str(markup);

        let mut depth = 0usize;
        let mut ordinal = 0usize;
        let mut node: Option<NodeDraft> = None;
        let mut field: Option<(Field, String)> = None;

        loop {
            let event = reader.read_event().map_err(|source| DramaError::Xml {
                position: reader.error_position() as u64,
                source,
            })?;
            match event {
                Event::Eof => break,
                Event::Start(e) => {
                    depth += 1;
                    if depth == 2 && e.name().as_ref() == b"node" {
                        node = Some(NodeDraft::new(ordinal, &e));
                        ordinal += 1;
                    } else if depth == 3 && node.is_some() {
                        field = Field::from_tag(e.name().as_ref()).map(|f| (f, String::new()));
                    }
                }
                Event::Empty(e) => {
                    if depth == 1 && e.name().as_ref() == b"node" {
                        self.add_node(NodeDraft::new(ordinal, &e));
                        ordinal += 1;
                    }
                }
                Event::Text(e) => {
                    if let (3, Some((_, text))) = (depth, field.as_mut()) {
                        let unescaped = e.unescape().map_err(|source| DramaError::Xml {
                            position: reader.buffer_position() as u64,
                            source,
                        })?;
                        text.push_str(&unescaped);
                    }
                }
                Event::CData(e) => {
                    if let (3, Some((_, text))) = (depth, field.as_mut()) {
                        text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::End(_) => {
                    if depth == 3 {
                        if let (Some(draft), Some((f, text))) = (node.as_mut(), field.take()) {
                            draft.set(f, &text);
                        }
                    } else if depth == 2 {
                        if let Some(draft) = node.take() {
                            self.add_node(draft);
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_node(&mut self, mut draft: NodeDraft) {
        let Some(id) = draft.id.take() else {
            self.diagnostics.push(Diagnostic::error(
                Location::Node(draft.ordinal),
                "node has no `id` attribute, skipped",
            ));
            return;
        };

        let id = self.strings.add(&id);
        let before = draft.take(Field::Before).map(|src| self.add_snippet(src));
        let after = draft.take(Field::After).map(|src| self.add_snippet(src));
        let plsay = draft.take(Field::PlSay).map(|text| self.strings.add(&text));
        let say = draft.take(Field::Say).map(|text| self.strings.add(&text));

        debug!(
            "node #{} `{}`: before={before:?} after={after:?}",
            draft.ordinal,
            self.strings.get(id).unwrap_or_default()
        );
        self.nodes.push(DialogueNode {
            id: Some(id),
            before,
            after,
            plsay,
            say,
        });
    }

    fn add_snippet(&mut self, src: String) -> usize {
        self.snippets.push(src);
        self.snippets.len() - 1
    }

    fn compile_snippets(&mut self, opcodes: &OpcodeMap) {
        for (snippet, src) in self.snippets.iter().enumerate() {
            let unit = ScriptUnit::compile(src, opcodes);
            for d in unit.diagnostics() {
                let line = match d.location {
                    Location::Line(line) => line,
                    _ => 0,
                };
                // already logged by the script unit
                self.diagnostics.push(Diagnostic {
                    location: Location::Snippet { snippet, line },
                    ..d.clone()
                });
            }
            self.scripts.push(unit);
        }
    }

    pub fn nodes(&self) -> &[DialogueNode] {
        &self.nodes
    }

    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }

    /// Compiled unit of every snippet, same order as `snippets()`.
    pub fn scripts(&self) -> &[ScriptUnit] {
        &self.scripts
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// String references in node record order: id, plsay, say.
    pub fn string_refs(&self) -> impl Iterator<Item = StrId> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| [n.id, n.plsay, n.say].into_iter().flatten())
    }

    pub fn write_ids(&self) -> WriteIds<'_> {
        self.strings.resolve(self.string_refs())
    }
}
