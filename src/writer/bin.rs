//! Binary emitter and the container framing shared by every unit kind.
//!
//! A container is laid out as
//!
//! ```text
//! +0   kind         FourCC (PLOP / DRAC)
//! +4   flags        0
//! +8   file size    patched last
//! +12  header size  24
//! +16  strings      offset of the `strs` list, 0 when no string is used
//! +20  reserved     0
//! +24  unit chunks  (Exporter::write_chunks)
//!      strs         aligned list of the referenced strings
//! ```
//!
//! Every offset stored in a container is relative to its first byte.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use log::info;
use thiserror::Error;

use crate::model::{ALIGN, CompiledUnit, HEADER_SIZE, ProcessedProject};
use crate::processor::strings::{StrId, StringTable, WriteIds};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("patch at {at} is outside the {len} byte stream")]
    PatchOutOfRange { at: usize, len: usize },
    #[error("offset {0} does not fit 32 bits")]
    OffsetOverflow(usize),
    #[error("string #{} is referenced but has no write id", .0.index())]
    UnresolvedString(StrId),
}

/// Little-endian, append-only byte stream with patchable words.
#[derive(Debug, Default)]
pub struct BinWriter {
    buf: Vec<u8>,
}

impl BinWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_fourcc(&mut self, tag: &[u8; 4]) {
        self.buf.extend_from_slice(tag);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a zero placeholder and returns where it lives.
    pub fn reserve_u32(&mut self) -> usize {
        let at = self.position();
        self.write_u32(0);
        at
    }

    /// Pads with zero bytes up to the next multiple of `boundary`.
    pub fn align(&mut self, boundary: usize) {
        let rem = self.buf.len() % boundary;
        if rem != 0 {
            self.buf.resize(self.buf.len() + boundary - rem, 0);
        }
    }

    /// Overwrites the word at absolute position `at`.
    pub fn patch(&mut self, at: usize, value: u32) -> Result<(), ExportError> {
        let len = self.buf.len();
        let word = self
            .buf
            .get_mut(at..at + 4)
            .ok_or(ExportError::PatchOutOfRange { at, len })?;
        word.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Current position relative to `top`.
    pub fn offset_from(&self, top: usize) -> Result<u32, ExportError> {
        let rel = self.position() - top;
        u32::try_from(rel).map_err(|_| ExportError::OffsetOverflow(rel))
    }

    /// Patches `at` with the current position relative to `top`.
    pub fn patch_here(&mut self, at: usize, top: usize) -> Result<(), ExportError> {
        let rel = self.offset_from(top)?;
        self.patch(at, rel)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.buf)
    }
}

/// A compiled unit that knows how to lay itself out in a container.
pub trait Exporter {
    fn kind(&self) -> &'static [u8; 4];

    fn strings(&self) -> &StringTable;

    /// String references in serialization order.
    fn string_refs(&self) -> Vec<StrId>;

    /// Writes the unit's own chunks; offsets are relative to `top`.
    fn write_chunks(
        &self,
        w: &mut BinWriter,
        top: usize,
        ids: &WriteIds<'_>,
    ) -> Result<(), ExportError>;

    /// Appends a complete container to `w`, starting on an aligned offset.
    fn export(&self, w: &mut BinWriter) -> Result<(), ExportError> {
        w.align(ALIGN);
        let top = w.position();
        let ids = self.strings().resolve(self.string_refs());

        w.write_fourcc(self.kind());
        w.write_u32(0); // flags
        let size_at = w.reserve_u32();
        w.write_u32(HEADER_SIZE);
        let strs_at = w.reserve_u32();
        w.write_u32(0); // reserved

        self.write_chunks(w, top, &ids)?;

        if !ids.is_empty() {
            w.align(ALIGN);
            w.patch_here(strs_at, top)?;
            write_string_list(w, &ids)?;
        }
        w.patch_here(size_at, top)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let mut w = BinWriter::new();
        self.export(&mut w)?;
        Ok(w.into_bytes())
    }
}

/// `strs` tag, count, per-string offsets from the tag, NUL-terminated text.
fn write_string_list(w: &mut BinWriter, ids: &WriteIds<'_>) -> Result<(), ExportError> {
    let base = w.position();
    w.write_fourcc(b"strs");
    w.write_u32(ids.len() as u32);
    let table_at = w.position();
    for _ in 0..ids.len() {
        w.write_u32(0);
    }
    for (i, text) in ids.strings().enumerate() {
        w.patch_here(table_at + i * 4, base)?;
        w.write_bytes(text.as_bytes());
        w.write_bytes(&[0]);
    }
    Ok(())
}

/// Lays out the complete container of one compiled unit.
pub fn export_unit(unit: &CompiledUnit) -> Result<BinWriter, ExportError> {
    let mut w = BinWriter::new();
    match unit {
        CompiledUnit::Script(script) => script.export(&mut w)?,
        CompiledUnit::Drama(drama) => drama.export(&mut w)?,
    }
    Ok(w)
}

/// Writes one binary per processed unit into `out_dir`.
///
/// Every container is laid out before the first file is created.
pub fn emit(project: &ProcessedProject, out_dir: &Path) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(project.units.len());
    for unit in &project.units {
        let w = export_unit(&unit.compiled)
            .with_context(|| format!("Laying out {}", unit.source.display()))?;
        files.push((out_dir.join(&unit.output), w));
    }
    for (path, w) in files {
        w.save(&path)
            .with_context(|| format!("Writing {}", path.display()))?;
        info!("wrote {} ({} bytes)", path.display(), w.position());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_pads_with_zeroes() {
        let mut w = BinWriter::new();
        w.write_fourcc(b"abcd");
        w.write_i32(-1);
        w.align(16);
        assert_eq!(w.position(), 16);
        assert_eq!(&w.as_bytes()[4..8], &[0xff; 4]);
        assert!(w.as_bytes()[8..].iter().all(|b| *b == 0));

        // already aligned: no padding
        w.align(16);
        assert_eq!(w.position(), 16);
    }

    #[test]
    fn test_patch() {
        let mut w = BinWriter::new();
        w.write_u32(7);
        let at = w.reserve_u32();
        w.write_u32(9);
        w.patch(at, 0x0102_0304).unwrap();
        assert_eq!(&w.as_bytes()[4..8], &[4, 3, 2, 1]);
        assert_eq!(
            w.patch(10, 1),
            Err(ExportError::PatchOutOfRange { at: 10, len: 12 })
        );
    }

    #[test]
    fn test_patch_here_is_relative() {
        let mut w = BinWriter::new();
        w.write_bytes(&[0; 32]);
        let top = w.position();
        let at = w.reserve_u32();
        w.write_u32(0);
        w.patch_here(at, top).unwrap();
        assert_eq!(&w.as_bytes()[32..36], &8u32.to_le_bytes());
    }

    struct Empty(StringTable);

    impl Exporter for Empty {
        fn kind(&self) -> &'static [u8; 4] {
            b"TEST"
        }

        fn strings(&self) -> &StringTable {
            &self.0
        }

        fn string_refs(&self) -> Vec<StrId> {
            self.0.find("used").into_iter().collect()
        }

        fn write_chunks(
            &self,
            w: &mut BinWriter,
            _top: usize,
            _ids: &WriteIds<'_>,
        ) -> Result<(), ExportError> {
            w.write_fourcc(b"body");
            Ok(())
        }
    }

    #[test]
    fn test_container_framing() {
        let mut table = StringTable::new();
        table.add("unused");
        table.add("used");
        let bytes = Empty(table).to_bytes().unwrap();

        let word = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        assert_eq!(&bytes[0..4], b"TEST");
        assert_eq!(word(8) as usize, bytes.len());
        assert_eq!(word(12), HEADER_SIZE);
        assert_eq!(&bytes[24..28], b"body");

        let strs = word(16) as usize;
        assert_eq!(strs % ALIGN, 0);
        assert_eq!(&bytes[strs..strs + 4], b"strs");
        assert_eq!(word(strs + 4), 1);
        let text_at = strs + word(strs + 8) as usize;
        assert_eq!(&bytes[text_at..], b"used\0");
    }

    #[test]
    fn test_container_without_strings() {
        let bytes = Empty(StringTable::new()).to_bytes().unwrap();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[16..20], &[0; 4]);
    }

    #[test]
    fn test_nested_container_starts_aligned() {
        let mut w = BinWriter::new();
        w.write_bytes(&[1, 2, 3]);
        Empty(StringTable::new()).export(&mut w).unwrap();
        assert_eq!(&w.as_bytes()[16..20], b"TEST");
        // size is relative to the nested container
        assert_eq!(&w.as_bytes()[24..28], &28u32.to_le_bytes());
    }
}
