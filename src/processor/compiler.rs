//! Lowers one expression tree into a block of 32-bit code words.
//!
//! Every list is bracketed by `BEGIN <end>` … `END`, where `<end>` is
//! backpatched to the offset just past the `END` so the VM can skip a whole
//! sub-expression. `IF` and `LSET` carry further forward offsets that are
//! patched once the code they point at is about to be emitted.
//!
//! String operands hold *insertion* ids while compiling; their positions
//! are recorded so that emission can swap in the unit's write ids.

use thiserror::Error;

use super::ast::{Atom, Expr};
use super::opcode::{Op, OpcodeMap};
use super::strings::{StrId, StringTable, WriteIds};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("empty form `()`")]
    EmptyForm,
    #[error("`{form}` expects {expected} operand(s), found {found}")]
    Arity {
        form: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("`{form}` expects a symbol name, found `{found}`")]
    ExpectedName { form: &'static str, found: String },
    #[error("block too large: offset {0} does not fit a code word")]
    TooLarge(usize),
}

/// Compiled code of one top-level form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    code: Vec<u32>,
    string_slots: Vec<usize>,
}

impl Block {
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Offsets of words that hold string ids.
    pub fn string_slots(&self) -> &[usize] {
        &self.string_slots
    }

    /// Strings referenced by this block, in code order.
    pub fn string_refs(&self) -> impl Iterator<Item = StrId> + '_ {
        self.string_slots
            .iter()
            .filter_map(|at| self.code.get(*at))
            .map(|word| StrId::from_index(*word))
    }

    /// Code words with every string slot rewritten to its write id.
    pub fn resolved(&self, ids: &WriteIds<'_>) -> Result<Vec<u32>, StrId> {
        let mut code = self.code.clone();
        for at in &self.string_slots {
            if let Some(word) = code.get_mut(*at) {
                let sid = StrId::from_index(*word);
                *word = ids.write_id(sid).ok_or(sid)?;
            }
        }
        Ok(code)
    }
}

/// Per-block compilation state.
pub struct BlockCompiler<'a> {
    strings: &'a mut StringTable,
    opcodes: &'a OpcodeMap,
    code: Vec<u32>,
    string_slots: Vec<usize>,
}

impl<'a> BlockCompiler<'a> {
    pub fn new(strings: &'a mut StringTable, opcodes: &'a OpcodeMap) -> Self {
        Self {
            strings,
            opcodes,
            code: Vec::new(),
            string_slots: Vec::new(),
        }
    }

    pub fn compile(mut self, expr: &Expr) -> Result<Block, CompileError> {
        self.compile_expr(expr)?;
        Ok(Block {
            code: self.code,
            string_slots: self.string_slots,
        })
    }

    fn emit_op(&mut self, op: Op) {
        self.code.push(self.opcodes.word(op));
    }

    /// Emits a zero word to be patched later; returns its offset.
    fn reserve(&mut self) -> usize {
        self.code.push(0);
        self.code.len() - 1
    }

    /// Writes the current code offset into a reserved word.
    fn patch_here(&mut self, at: usize) -> Result<(), CompileError> {
        let here = self.here()?;
        self.code[at] = here;
        Ok(())
    }

    fn here(&self) -> Result<u32, CompileError> {
        u32::try_from(self.code.len()).map_err(|_| CompileError::TooLarge(self.code.len()))
    }

    fn emit_str(&mut self, id: StrId) {
        self.string_slots.push(self.code.len());
        self.code.push(id.index());
    }

    fn emit_name(&mut self, form: &'static str, expr: &Expr) -> Result<(), CompileError> {
        let name = expr.as_symbol().ok_or_else(|| CompileError::ExpectedName {
            form,
            found: expr.to_string(),
        })?;
        let id = self.strings.add(name);
        self.emit_str(id);
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Atom(atom) => {
                self.compile_atom(atom);
                Ok(())
            }
            Expr::List(items) => self.compile_list(items),
        }
    }

    fn compile_atom(&mut self, atom: &Atom) {
        match atom {
            Atom::Number(n) => {
                self.emit_op(Op::Fval);
                self.code.push(n.to_bits());
            }
            Atom::Str(id) => {
                self.emit_op(Op::Sval);
                self.emit_str(*id);
            }
            Atom::Symbol(name) => {
                self.emit_op(Op::Sym);
                let id = self.strings.add(name);
                self.emit_str(id);
            }
        }
    }

    fn compile_list(&mut self, items: &[Expr]) -> Result<(), CompileError> {
        let (head, operands) = items.split_first().ok_or(CompileError::EmptyForm)?;

        self.emit_op(Op::Begin);
        let end_at = self.reserve();

        match head.as_symbol() {
            Some("defvar") => self.compile_binding("defvar", Op::Var, operands)?,
            Some("set") => self.compile_binding("set", Op::Set, operands)?,
            Some("lset") => {
                let [name, index, value] = expect_operands::<3>("lset", operands)?;
                self.emit_op(Op::Lset);
                self.emit_name("lset", name)?;
                let value_at = self.reserve();
                self.compile_expr(index)?;
                self.patch_here(value_at)?;
                self.compile_expr(value)?;
            }
            Some("lget") => {
                let [name, index] = expect_operands::<2>("lget", operands)?;
                self.emit_op(Op::Lget);
                self.emit_name("lget", name)?;
                self.compile_expr(index)?;
            }
            Some("if") => {
                let [cond, then, alt] = expect_operands::<3>("if", operands)?;
                self.emit_op(Op::If);
                let then_at = self.reserve();
                let alt_at = self.reserve();
                self.compile_expr(cond)?;
                self.patch_here(then_at)?;
                self.compile_expr(then)?;
                self.patch_here(alt_at)?;
                self.compile_expr(alt)?;
            }
            operator => {
                let op = operator.and_then(Op::from_operator).unwrap_or(Op::Call);
                self.emit_op(op);
                self.code.push(operands.len() as u32);
                if op == Op::Call {
                    self.compile_expr(head)?;
                }
                for operand in operands {
                    self.compile_expr(operand)?;
                }
            }
        }

        self.emit_op(Op::End);
        self.patch_here(end_at)
    }

    fn compile_binding(
        &mut self,
        form: &'static str,
        op: Op,
        operands: &[Expr],
    ) -> Result<(), CompileError> {
        let [name, value] = expect_operands::<2>(form, operands)?;
        self.emit_op(op);
        self.emit_name(form, name)?;
        self.compile_expr(value)
    }
}

fn expect_operands<'e, const N: usize>(
    form: &'static str,
    operands: &'e [Expr],
) -> Result<&'e [Expr; N], CompileError> {
    operands.try_into().map_err(|_| CompileError::Arity {
        form,
        expected: N,
        found: operands.len(),
    })
}

/// Compiles one expression into a fresh block.
pub fn compile_block(
    expr: &Expr,
    strings: &mut StringTable,
    opcodes: &OpcodeMap,
) -> Result<Block, CompileError> {
    BlockCompiler::new(strings, opcodes).compile(expr)
}
