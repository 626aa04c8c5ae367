//! Line-oriented lexer for the script language.
//
//  One source line holds one top-level form:
//
//      line    ::= form? comment?
//      comment ::= ';' .*            (first ';' on the line, even inside quotes)
//
//  Lexical items:
//
//      Open     ::= '('
//      Close    ::= ')'
//      Str      ::= '"' ( '\' any | [^"\\] )* '"'
//      Word     ::= [^\s()"]+        (Number if it parses as a float)
//
//  Tabs count as whitespace. String literals are interned as soon as they
//  are recognised; the token only carries the insertion id.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use super::strings::{StrId, StringTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Symbol(String),
    Number(String),
    Str(StrId), // interned literal
    Open,       // '('
    Close,      // ')'
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at column {0}")]
    UnterminatedString(usize),
}

/// Drops the comment part of a line.
pub fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(at) => &line[..at],
        None => line,
    }
}

pub struct Lexer<'a, 's> {
    chars: Peekable<Chars<'a>>,
    column: usize,
    strings: &'s mut StringTable,
}

impl<'a, 's> Lexer<'a, 's> {
    /// Lexes a single line; the comment is stripped here.
    pub fn new(line: &'a str, strings: &'s mut StringTable) -> Self {
        Self {
            chars: strip_comment(line).chars().peekable(),
            column: 0,
            strings,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.column += 1;
        }
        c
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn read_word(&mut self, first: char) -> String {
        let mut word = String::new();
        word.push(first);
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
                break;
            }
            word.push(c);
            self.next_char();
        }
        word
    }

    /// Reads a quoted literal; the opening quote is already consumed.
    fn read_string(&mut self) -> Result<String, LexError> {
        let start = self.column;
        let mut text = String::new();
        while let Some(c) = self.next_char() {
            match c {
                '"' => return Ok(text),
                '\\' => {
                    // kept verbatim, the escape only protects the next char
                    text.push(c);
                    match self.next_char() {
                        Some(escaped) => text.push(escaped),
                        None => break,
                    }
                }
                c => text.push(c),
            }
        }
        Err(LexError::UnterminatedString(start))
    }
}

impl Iterator for Lexer<'_, '_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.next_char();
        }

        let tok = match self.next_char()? {
            '(' => Ok(Token::Open),
            ')' => Ok(Token::Close),
            '"' => self
                .read_string()
                .map(|text| Token::Str(self.strings.add(&text))),
            c => {
                let word = self.read_word(c);
                if is_number(&word) {
                    Ok(Token::Number(word))
                } else {
                    Ok(Token::Symbol(word))
                }
            }
        };
        Some(tok)
    }
}

fn is_number(word: &str) -> bool {
    word.parse::<f64>().is_ok()
}

/// Tokenizes one line, interning its string literals into `strings`.
pub fn tokenize_line(line: &str, strings: &mut StringTable) -> Result<Vec<Token>, LexError> {
    Lexer::new(line, strings).collect()
}
