//! Expression tree for one top-level form *before* it is lowered to byte-code.

use std::fmt;

use super::strings::StrId;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Number(f32),
    Symbol(String),
    /// String literal, already interned.
    Str(StrId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Atom(Atom),
    /// `(head operand…)`; the head selects the compiled form.
    List(Vec<Expr>),
}

impl Expr {
    pub fn number(value: f32) -> Self {
        Expr::Atom(Atom::Number(value))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Atom(Atom::Symbol(name.into()))
    }

    pub fn string(id: StrId) -> Self {
        Expr::Atom(Atom::Str(id))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Atom(Atom::Symbol(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(Atom::Number(n)) => write!(f, "{n}"),
            Expr::Atom(Atom::Symbol(s)) => write!(f, "{s}"),
            Expr::Atom(Atom::Str(id)) => write!(f, "\"#{}\"", id.index()),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
