//! Read-back of emitted containers, for inspection and verification.
//!
//! Everything borrows from the input bytes; nothing is copied except the
//! decoded code words.

use thiserror::Error;

use crate::model::{ABSENT, HEADER_SIZE, KIND_DRAMA, KIND_SCRIPT};
use crate::processor::strings::StringLookup;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("truncated: need {needed} byte(s) at {at}, have {len}")]
    Truncated { at: usize, needed: usize, len: usize },
    #[error("unknown container kind {0:?}")]
    UnknownKind([u8; 4]),
    #[error("expected `{expected}` tag at {at}")]
    MissingTag { at: usize, expected: &'static str },
    #[error("unsupported header size {0}")]
    HeaderSize(u32),
    #[error("string {index} is not NUL-terminated UTF-8")]
    BadString { index: usize },
    #[error("node {node}: {field} {value} is out of range")]
    BadReference {
        node: usize,
        field: &'static str,
        value: i32,
    },
}

/// Bounds-checked view of one container's bytes.
#[derive(Clone, Copy)]
struct Bytes<'a>(&'a [u8]);

impl<'a> Bytes<'a> {
    fn slice(&self, at: usize, needed: usize) -> Result<&'a [u8], ReadError> {
        at.checked_add(needed)
            .and_then(|end| self.0.get(at..end))
            .ok_or(ReadError::Truncated {
                at,
                needed,
                len: self.0.len(),
            })
    }

    /// Checks that `count` entries of `stride` bytes fit from `at` on.
    fn table(&self, at: usize, count: usize, stride: usize) -> Result<usize, ReadError> {
        self.slice(at, count.saturating_mul(stride))?;
        Ok(count)
    }

    fn u32_at(&self, at: usize) -> Result<u32, ReadError> {
        let raw = self.slice(at, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32_at(&self, at: usize) -> Result<i32, ReadError> {
        Ok(self.u32_at(at)? as i32)
    }

    fn usize_at(&self, at: usize) -> Result<usize, ReadError> {
        Ok(self.u32_at(at)? as usize)
    }

    fn expect_tag(&self, at: usize, tag: &'static str) -> Result<(), ReadError> {
        if self.slice(at, 4)? == tag.as_bytes() {
            Ok(())
        } else {
            Err(ReadError::MissingTag { at, expected: tag })
        }
    }
}

/// Strings of a container, indexed by write id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList<'a> {
    strings: Vec<&'a str>,
}

impl<'a> StringList<'a> {
    pub fn get(&self, id: i32) -> Option<&'a str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.strings.get(i).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.strings.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl StringLookup for StringList<'_> {
    fn lookup(&self, id: u32) -> Option<&str> {
        self.strings.get(id as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptView<'a> {
    pub blocks: Vec<Vec<u32>>,
    pub strings: StringList<'a>,
}

/// One node record as stored; `-1` marks an absent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: i32,
    pub before: i32,
    pub after: i32,
    pub plsay: i32,
    pub say: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DramaView<'a> {
    pub nodes: Vec<NodeRecord>,
    pub scripts: Vec<ScriptView<'a>>,
    pub strings: StringList<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container<'a> {
    Script(ScriptView<'a>),
    Drama(DramaView<'a>),
}

/// Parses a container starting at the first byte of `bytes`.
pub fn read(bytes: &[u8]) -> Result<Container<'_>, ReadError> {
    let (kind, body) = read_header(bytes)?;
    match &kind {
        k if k == KIND_SCRIPT => read_script(body).map(Container::Script),
        k if k == KIND_DRAMA => read_drama(body).map(Container::Drama),
        _ => Err(ReadError::UnknownKind(kind)),
    }
}

/// Checks the header and returns the kind and the container's own bytes.
fn read_header(bytes: &[u8]) -> Result<([u8; 4], Bytes<'_>), ReadError> {
    let all = Bytes(bytes);
    let head = all.slice(0, HEADER_SIZE as usize)?;
    let kind = [head[0], head[1], head[2], head[3]];
    let header_size = all.u32_at(12)?;
    if header_size != HEADER_SIZE {
        return Err(ReadError::HeaderSize(header_size));
    }
    let size = all.usize_at(8)?;
    Ok((kind, Bytes(all.slice(0, size)?)))
}

fn read_strings(c: Bytes<'_>) -> Result<StringList<'_>, ReadError> {
    let base = c.usize_at(16)?;
    if base == 0 {
        return Ok(StringList::default());
    }
    c.expect_tag(base, "strs")?;
    let count = c.table(base + 8, c.usize_at(base + 4)?, 4)?;
    let mut strings = Vec::with_capacity(count);
    for index in 0..count {
        let at = base + c.usize_at(base + 8 + index * 4)?;
        let tail = c.0.get(at..).ok_or(ReadError::BadString { index })?;
        let end = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or(ReadError::BadString { index })?;
        let text = std::str::from_utf8(&tail[..end]).map_err(|_| ReadError::BadString { index })?;
        strings.push(text);
    }
    Ok(StringList { strings })
}

fn read_script(c: Bytes<'_>) -> Result<ScriptView<'_>, ReadError> {
    let info = HEADER_SIZE as usize;
    c.expect_tag(info, "info")?;
    let count = c.table(info + 12, c.usize_at(info + 4)?, 8)?;
    c.expect_tag(c.usize_at(info + 8)?, "code")?;

    let mut blocks = Vec::with_capacity(count);
    for i in 0..count {
        let entry = info + 12 + i * 8;
        let at = c.usize_at(entry)?;
        let len = c.usize_at(entry + 4)?;
        let words = (0..len)
            .map(|w| c.u32_at(at + w * 4))
            .collect::<Result<Vec<_>, _>>()?;
        blocks.push(words);
    }

    Ok(ScriptView {
        blocks,
        strings: read_strings(c)?,
    })
}

fn read_drama(c: Bytes<'_>) -> Result<DramaView<'_>, ReadError> {
    let head = HEADER_SIZE as usize;
    c.expect_tag(head, "head")?;
    let node_count = c.usize_at(head + 4)?;
    let script_count = c.table(head + 16, c.usize_at(head + 8)?, 4)?;
    let strings = read_strings(c)?;

    let mut nodes = Vec::new();
    let mut scripts = Vec::with_capacity(script_count);
    if node_count > 0 {
        let body = c.usize_at(head + 12)?;
        c.expect_tag(body.saturating_sub(4), "body")?;
        c.table(body, node_count, 20)?;
        for i in 0..node_count {
            let at = body + i * 20;
            let node = NodeRecord {
                id: c.i32_at(at)?,
                before: c.i32_at(at + 4)?,
                after: c.i32_at(at + 8)?,
                plsay: c.i32_at(at + 12)?,
                say: c.i32_at(at + 16)?,
            };
            check_node(i, &node, strings.len(), script_count)?;
            nodes.push(node);
        }
        for i in 0..script_count {
            let at = c.usize_at(head + 16 + i * 4)?;
            let (kind, inner) = read_header(c.0.get(at..).unwrap_or_default())?;
            if &kind != KIND_SCRIPT {
                return Err(ReadError::UnknownKind(kind));
            }
            scripts.push(read_script(inner)?);
        }
    }

    Ok(DramaView {
        nodes,
        scripts,
        strings,
    })
}

fn check_node(
    node: usize,
    record: &NodeRecord,
    strings: usize,
    scripts: usize,
) -> Result<(), ReadError> {
    let fields = [
        ("id", record.id, strings),
        ("before", record.before, scripts),
        ("after", record.after, scripts),
        ("plsay", record.plsay, strings),
        ("say", record.say, strings),
    ];
    for (field, value, limit) in fields {
        let in_range = value == ABSENT || usize::try_from(value).is_ok_and(|v| v < limit);
        if !in_range {
            return Err(ReadError::BadReference { node, field, value });
        }
    }
    Ok(())
}
