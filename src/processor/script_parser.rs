//! Recursive-descent parser turning one line's tokens into an `Expr`.

use std::collections::VecDeque;

use thiserror::Error;

use super::ast::{Atom, Expr};
use super::lexer::Token;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unbalanced parentheses: {0} list(s) left open")]
    Unclosed(usize),
    #[error("unexpected `)`")]
    UnexpectedClose,
    #[error("invalid number `{0}`")]
    BadNumber(String),
    #[error("lists nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Deepest list nesting accepted on one line.
pub const MAX_DEPTH: usize = 256;

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub expr: Expr,
    /// Tokens left over after the first complete form.
    pub trailing: usize,
}

/// Parses the first form of a line. Returns `None` for a line without tokens.
pub fn parse_line(tokens: Vec<Token>) -> Result<Option<Parsed>, ParseError> {
    let mut toks = VecDeque::from(tokens);
    if toks.is_empty() {
        return Ok(None);
    }
    let expr = parse_expr(&mut toks, 0)?;
    check_balanced(&toks)?;
    Ok(Some(Parsed {
        expr,
        trailing: toks.len(),
    }))
}

/// Leftover tokens may hold further forms, but never a stray or missing `)`.
fn check_balanced(toks: &VecDeque<Token>) -> Result<(), ParseError> {
    let mut open = 0usize;
    for tok in toks {
        match tok {
            Token::Open => open += 1,
            Token::Close => open = open.checked_sub(1).ok_or(ParseError::UnexpectedClose)?,
            _ => {}
        }
    }
    match open {
        0 => Ok(()),
        n => Err(ParseError::Unclosed(n)),
    }
}

/// Consumes one expression from the front of `toks`.
pub fn parse_expr(toks: &mut VecDeque<Token>, depth: usize) -> Result<Expr, ParseError> {
    match toks.pop_front() {
        None => Err(ParseError::Unclosed(depth)),
        Some(Token::Open) => {
            if depth >= MAX_DEPTH {
                return Err(ParseError::TooDeep(MAX_DEPTH));
            }
            let mut items = Vec::new();
            loop {
                match toks.front() {
                    None => return Err(ParseError::Unclosed(depth + 1)),
                    Some(Token::Close) => {
                        toks.pop_front();
                        return Ok(Expr::List(items));
                    }
                    Some(_) => items.push(parse_expr(toks, depth + 1)?),
                }
            }
        }
        Some(Token::Close) => Err(ParseError::UnexpectedClose),
        Some(Token::Number(text)) => text
            .parse::<f64>()
            .map(|n| Expr::Atom(Atom::Number(n as f32)))
            .map_err(|_| ParseError::BadNumber(text)),
        Some(Token::Symbol(name)) => Ok(Expr::Atom(Atom::Symbol(name))),
        Some(Token::Str(id)) => Ok(Expr::Atom(Atom::Str(id))),
    }
}
