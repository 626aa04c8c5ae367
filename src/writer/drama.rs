//! `DRAC` container: dialogue node table plus one embedded script per snippet.
//!
//! ```text
//! head   node count, snippet count, body offset, snippet offset * count
//! body   (aligned) { id, before, after, plsay, say } * nodes   (i32, -1 = absent)
//!        (aligned) PLOP container * snippets
//! ```
//!
//! A document without nodes stops after `head`.

use crate::model::{ABSENT, ALIGN, KIND_DRAMA};
use crate::processor::drama::DramaDocument;
use crate::processor::strings::{StrId, StringTable, WriteIds};

use super::bin::{BinWriter, ExportError, Exporter};

/// Size of one node record in bytes.
pub const NODE_RECORD_SIZE: usize = 5 * 4;

fn index_field(index: Option<usize>) -> Result<i32, ExportError> {
    match index {
        None => Ok(ABSENT),
        Some(i) => i32::try_from(i).map_err(|_| ExportError::OffsetOverflow(i)),
    }
}

fn string_field(id: Option<StrId>, ids: &WriteIds<'_>) -> Result<i32, ExportError> {
    let Some(id) = id else {
        return Ok(ABSENT);
    };
    let wid = ids.write_id(id).ok_or(ExportError::UnresolvedString(id))?;
    // write ids are bounded by the table size, which never nears i32::MAX
    Ok(wid as i32)
}

impl Exporter for DramaDocument {
    fn kind(&self) -> &'static [u8; 4] {
        KIND_DRAMA
    }

    fn strings(&self) -> &StringTable {
        DramaDocument::strings(self)
    }

    fn string_refs(&self) -> Vec<StrId> {
        DramaDocument::string_refs(self).collect()
    }

    fn write_chunks(
        &self,
        w: &mut BinWriter,
        top: usize,
        ids: &WriteIds<'_>,
    ) -> Result<(), ExportError> {
        let nodes = self.nodes();
        let scripts = self.scripts();

        w.write_fourcc(b"head");
        w.write_u32(nodes.len() as u32);
        w.write_u32(scripts.len() as u32);
        let body_at = w.reserve_u32();
        let entries: Vec<usize> = scripts.iter().map(|_| w.reserve_u32()).collect();

        if nodes.is_empty() {
            return Ok(());
        }

        w.align(ALIGN);
        w.write_fourcc(b"body");
        w.patch_here(body_at, top)?;
        for node in nodes {
            w.write_i32(string_field(node.id, ids)?);
            w.write_i32(index_field(node.before)?);
            w.write_i32(index_field(node.after)?);
            w.write_i32(string_field(node.plsay, ids)?);
            w.write_i32(string_field(node.say, ids)?);
        }

        for (script, entry) in scripts.iter().zip(entries) {
            w.align(ALIGN);
            w.patch_here(entry, top)?;
            script.export(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HEADER_SIZE;
    use crate::processor::opcode::OpcodeMap;

    fn word(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn record(bytes: &[u8], at: usize) -> [i32; 5] {
        std::array::from_fn(|i| word(bytes, at + i * 4) as i32)
    }

    #[test]
    fn test_layout() {
        let src = "\
;$<node id=\"greet\">
;$  <before>(set seen 1)</before>
;$  <say>Hello</say>
;$</node>
;$<node id=\"bye\">
;$  <plsay>Farewell</plsay>
;$  <after>(f)</after>
;$</node>
";
        let doc = DramaDocument::compile(src, &OpcodeMap::default()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let head = HEADER_SIZE as usize;

        assert_eq!(&bytes[0..4], b"DRAC");
        assert_eq!(&bytes[head..head + 4], b"head");
        assert_eq!(word(&bytes, head + 4), 2);
        assert_eq!(word(&bytes, head + 8), 2);

        let body = word(&bytes, head + 12) as usize;
        assert_eq!(&bytes[body - 4..body], b"body");
        assert_eq!((body - 4) % ALIGN, 0);

        // write ids: greet, Hello, bye, Farewell
        assert_eq!(record(&bytes, body), [0, 0, -1, -1, 1]);
        assert_eq!(record(&bytes, body + NODE_RECORD_SIZE), [2, -1, 1, 3, -1]);

        for i in 0..2 {
            let at = word(&bytes, head + 16 + i * 4) as usize;
            assert_eq!(at % ALIGN, 0, "snippet {i}");
            assert_eq!(&bytes[at..at + 4], b"PLOP");
            let size = word(&bytes, at + 8) as usize;
            assert!(at + size <= bytes.len());
        }
    }

    #[test]
    fn test_zero_nodes_skip_body() {
        let src = ";$<node><say>lost</say></node>";
        let doc = DramaDocument::compile(src, &OpcodeMap::default()).unwrap();
        assert!(doc.nodes().is_empty());
        let bytes = doc.to_bytes().unwrap();
        let head = HEADER_SIZE as usize;

        assert_eq!(word(&bytes, head + 4), 0);
        assert_eq!(word(&bytes, head + 8), 0);
        assert_eq!(word(&bytes, head + 12), 0);
        assert_eq!(bytes.len(), head + 16);
        assert!(!bytes.windows(4).any(|w| w == b"body"));
    }

    #[test]
    fn test_missing_id_is_left_out() {
        let src = "\
;$<node><say>skipped</say></node>
;$<node id=\"kept\"><say>shown</say></node>
";
        let doc = DramaDocument::compile(src, &OpcodeMap::default()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let head = HEADER_SIZE as usize;
        assert_eq!(word(&bytes, head + 4), 1);
        let body = word(&bytes, head + 12) as usize;
        assert_eq!(record(&bytes, body), [0, -1, -1, -1, 1]);
    }
}
