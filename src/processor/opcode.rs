//! The closed opcode set of the script VM and its numeric encoding.
//!
//! The runtime shares its numbering through a `plop_op.inc` file made of
//! `PLOP_OP(NAME, VALUE)` lines. The default numbering is built in; a file
//! can be loaded to override it, and it must name every opcode exactly once.

use std::collections::HashMap;

use thiserror::Error;

/// One VM instruction kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Op {
    /// `BEGIN <end>`: frame bracket, operand is the offset past the `END`.
    Begin = 100,
    End = 101,
    /// `VAR <sid>` followed by the initializer.
    Var = 102,
    /// `SYM <sid>`: bare symbol reference.
    Sym = 103,
    Set = 104,
    /// `FVAL <bits>`: IEEE-754 single precision literal.
    Fval = 105,
    /// `SVAL <sid>`: string literal.
    Sval = 106,
    /// `IF <then> <else>` followed by condition, then, else.
    If = 107,
    Add = 108,
    Sub = 109,
    Mul = 110,
    Div = 111,
    Eq = 112,
    Ne = 113,
    Lt = 114,
    Gt = 115,
    Le = 116,
    Ge = 117,
    Not = 118,
    And = 119,
    Or = 120,
    Xor = 121,
    Min = 122,
    Max = 123,
    /// `CALL <argc>` followed by the callee and its arguments.
    Call = 124,
    Neg = 125,
    List = 126,
    /// `LSET <sid> <value>` followed by index and value.
    Lset = 127,
    /// `LGET <sid>` followed by index.
    Lget = 128,
}

/// How an instruction's inline operands are laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One code offset.
    Offset,
    /// Two code offsets.
    Offsets,
    /// One string id.
    Str,
    /// A string id then a code offset.
    StrOffset,
    Float,
    /// Argument count of a variadic form.
    Argc,
}

impl Operands {
    pub const fn count(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::Offset
            | Operands::Str
            | Operands::Float
            | Operands::Argc => 1,
            Operands::Offsets | Operands::StrOffset => 2,
        }
    }
}

impl Op {
    pub const ALL: [Op; 29] = [
        Op::Begin,
        Op::End,
        Op::Var,
        Op::Sym,
        Op::Set,
        Op::Fval,
        Op::Sval,
        Op::If,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Eq,
        Op::Ne,
        Op::Lt,
        Op::Gt,
        Op::Le,
        Op::Ge,
        Op::Not,
        Op::And,
        Op::Or,
        Op::Xor,
        Op::Min,
        Op::Max,
        Op::Call,
        Op::Neg,
        Op::List,
        Op::Lset,
        Op::Lget,
    ];

    /// Name used in `plop_op.inc`.
    pub const fn name(self) -> &'static str {
        match self {
            Op::Begin => "BEGIN",
            Op::End => "END",
            Op::Var => "VAR",
            Op::Sym => "SYM",
            Op::Set => "SET",
            Op::Fval => "FVAL",
            Op::Sval => "SVAL",
            Op::If => "IF",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Eq => "EQ",
            Op::Ne => "NE",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::Le => "LE",
            Op::Ge => "GE",
            Op::Not => "NOT",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Xor => "XOR",
            Op::Min => "MIN",
            Op::Max => "MAX",
            Op::Call => "CALL",
            Op::Neg => "NEG",
            Op::List => "LIST",
            Op::Lset => "LSET",
            Op::Lget => "LGET",
        }
    }

    /// Mnemonic printed by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            other => other.name(),
        }
    }

    pub const fn operands(self) -> Operands {
        match self {
            Op::Begin => Operands::Offset,
            Op::End => Operands::None,
            Op::Var | Op::Sym | Op::Set | Op::Sval | Op::Lget => Operands::Str,
            Op::Lset => Operands::StrOffset,
            Op::Fval => Operands::Float,
            Op::If => Operands::Offsets,
            _ => Operands::Argc,
        }
    }

    /// Generic (variadic) form selected by an operator symbol.
    pub fn from_operator(symbol: &str) -> Option<Op> {
        let op = match symbol {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "neg" => Op::Neg,
            "=" => Op::Eq,
            "/=" => Op::Ne,
            "<" => Op::Lt,
            ">" => Op::Gt,
            "<=" => Op::Le,
            ">=" => Op::Ge,
            "not" => Op::Not,
            "and" => Op::And,
            "or" => Op::Or,
            "xor" => Op::Xor,
            "min" => Op::Min,
            "max" => Op::Max,
            "list" => Op::List,
            _ => return None,
        };
        Some(op)
    }

    pub fn from_name(name: &str) -> Option<Op> {
        Op::ALL.into_iter().find(|op| op.name() == name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpcodeError {
    #[error("line {line}: malformed opcode definition `{text}`")]
    Malformed { line: usize, text: String },
    #[error("line {line}: unknown opcode `{name}`")]
    UnknownName { line: usize, name: String },
    #[error("line {line}: opcode `{name}` defined twice")]
    DuplicateName { line: usize, name: String },
    #[error("line {line}: value {value} of `{name}` already used by `{other}`")]
    DuplicateValue {
        line: usize,
        name: String,
        value: u32,
        other: &'static str,
    },
    #[error("opcodes missing from definition file: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Mapping between opcodes and the words emitted for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeMap {
    words: HashMap<Op, u32>,
    ops: HashMap<u32, Op>,
}

impl Default for OpcodeMap {
    fn default() -> Self {
        let words: HashMap<Op, u32> = Op::ALL.into_iter().map(|op| (op, op as u32)).collect();
        let ops = words.iter().map(|(op, word)| (*word, *op)).collect();
        Self { words, ops }
    }
}

impl OpcodeMap {
    /// Reads `PLOP_OP(NAME, VALUE)` definitions. Other lines are ignored.
    pub fn from_inc(text: &str) -> Result<Self, OpcodeError> {
        let mut words = HashMap::new();
        let mut ops: HashMap<u32, Op> = HashMap::new();

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            let Some(rest) = trimmed.strip_prefix("PLOP_OP(") else {
                continue;
            };
            let malformed = || OpcodeError::Malformed {
                line,
                text: trimmed.to_owned(),
            };
            let body = rest.split(')').next().ok_or_else(malformed)?;
            let (name, value) = body.split_once(',').ok_or_else(malformed)?;
            let name = name.trim();
            let value: u32 = value.trim().parse().map_err(|_| malformed())?;

            let op = Op::from_name(name).ok_or_else(|| OpcodeError::UnknownName {
                line,
                name: name.to_owned(),
            })?;
            if words.contains_key(&op) {
                return Err(OpcodeError::DuplicateName {
                    line,
                    name: name.to_owned(),
                });
            }
            if let Some(other) = ops.get(&value) {
                return Err(OpcodeError::DuplicateValue {
                    line,
                    name: name.to_owned(),
                    value,
                    other: other.name(),
                });
            }
            words.insert(op, value);
            ops.insert(value, op);
        }

        let missing: Vec<_> = Op::ALL
            .into_iter()
            .filter(|op| !words.contains_key(op))
            .map(Op::name)
            .collect();
        if !missing.is_empty() {
            return Err(OpcodeError::Missing(missing));
        }

        Ok(Self { words, ops })
    }

    pub fn word(&self, op: Op) -> u32 {
        // every map holds all opcodes, enforced at construction
        self.words.get(&op).copied().unwrap_or(op as u32)
    }

    pub fn decode(&self, word: u32) -> Option<Op> {
        self.ops.get(&word).copied()
    }

    /// Opcodes with their words, in ascending word order.
    pub fn entries(&self) -> Vec<(Op, u32)> {
        let mut entries: Vec<_> = self.words.iter().map(|(op, w)| (*op, *w)).collect();
        entries.sort_by_key(|(_, word)| *word);
        entries
    }
}
