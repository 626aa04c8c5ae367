//! Read-only decoding of code words into an annotated listing.

use std::fmt::Write as _;

use thiserror::Error;

use super::opcode::{Op, OpcodeMap, Operands};
use super::strings::StringLookup;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisasmError {
    #[error("{ip:3}: unknown opcode word {word:#x}")]
    UnknownOpcode { ip: usize, word: u32 },
    #[error("{ip:3}: `{op}` needs {needed} operand word(s) past the end of the block")]
    Truncated {
        ip: usize,
        op: &'static str,
        needed: usize,
    },
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub ip: usize,
    /// Nesting level used for indentation.
    pub depth: usize,
    pub op: Op,
    pub operands: Vec<u32>,
}

impl Instruction {
    /// Text of the instruction without address or indentation.
    pub fn render(&self, strings: &dyn StringLookup) -> String {
        let name = self.op.mnemonic();
        let str_of = |id: u32| strings.lookup(id).unwrap_or("<?>");
        match (self.op.operands(), self.operands.as_slice()) {
            (Operands::Offset, [end]) => format!("{name} <{end}>"),
            (Operands::Offsets, [yes, alt]) => format!("{name} ({yes}, {alt})"),
            (Operands::Str, [sid]) => format!("{name} {sid} ; {}", str_of(*sid)),
            (Operands::StrOffset, [sid, val]) => {
                format!("{name} {sid} <{val}> ; {}", str_of(*sid))
            }
            (Operands::Float, [bits]) => format!("{name} {}", f32::from_bits(*bits)),
            (Operands::Argc, [narg]) => format!("{name} ({narg})"),
            _ => name.to_owned(),
        }
    }
}

/// Decodes a whole block.
pub fn decode(code: &[u32], opcodes: &OpcodeMap) -> Result<Vec<Instruction>, DisasmError> {
    let mut out = Vec::new();
    let mut ip = 0;
    let mut depth = 0usize;

    while let Some(word) = code.get(ip).copied() {
        let op = opcodes
            .decode(word)
            .ok_or(DisasmError::UnknownOpcode { ip, word })?;
        let needed = op.operands().count();
        let operands = code
            .get(ip + 1..ip + 1 + needed)
            .ok_or(DisasmError::Truncated {
                ip,
                op: op.name(),
                needed,
            })?
            .to_vec();

        if op == Op::Begin {
            depth += 1;
        }
        out.push(Instruction {
            ip,
            depth,
            op,
            operands,
        });
        if op == Op::End {
            depth = depth.saturating_sub(1);
        }
        ip += 1 + needed;
    }

    Ok(out)
}

/// Formats a block as one line per instruction.
pub fn listing(
    code: &[u32],
    opcodes: &OpcodeMap,
    strings: &dyn StringLookup,
) -> Result<String, DisasmError> {
    let mut text = String::new();
    for ins in decode(code, opcodes)? {
        let indent = "  ".repeat(ins.depth);
        // writing to a String cannot fail
        let _ = writeln!(text, "{indent}{:3}: {}", ins.ip, ins.render(strings));
    }
    Ok(text)
}
