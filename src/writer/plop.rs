//! `PLOP` container: one code block per script line.
//!
//! ```text
//! info   block count, body offset, { code offset, length in words } * count
//! code   (aligned) block words, each block aligned on its own
//! ```

use crate::model::{ALIGN, KIND_SCRIPT};
use crate::processor::blob::ScriptUnit;
use crate::processor::strings::{StrId, StringTable, WriteIds};

use super::bin::{BinWriter, ExportError, Exporter};

impl Exporter for ScriptUnit {
    fn kind(&self) -> &'static [u8; 4] {
        KIND_SCRIPT
    }

    fn strings(&self) -> &StringTable {
        ScriptUnit::strings(self)
    }

    fn string_refs(&self) -> Vec<StrId> {
        ScriptUnit::string_refs(self).collect()
    }

    fn write_chunks(
        &self,
        w: &mut BinWriter,
        top: usize,
        ids: &WriteIds<'_>,
    ) -> Result<(), ExportError> {
        let blocks = self.blocks();

        w.write_fourcc(b"info");
        w.write_u32(blocks.len() as u32);
        let body_at = w.reserve_u32();
        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            entries.push(w.reserve_u32());
            w.write_u32(block.len() as u32);
        }

        w.align(ALIGN);
        w.patch_here(body_at, top)?;
        w.write_fourcc(b"code");

        for (block, entry) in blocks.iter().zip(entries) {
            w.align(ALIGN);
            w.patch_here(entry, top)?;
            let words = block.resolved(ids).map_err(ExportError::UnresolvedString)?;
            for word in words {
                w.write_u32(word);
            }
        }
        Ok(())
    }
}
