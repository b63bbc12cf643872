//! Statement lexer
//!
//! Quoted strings and `HH:MM:SS` literals are recognized as whole tokens, so
//! the colon inside a time or any punctuation inside quotes never reaches the
//! structural split performed by the parser. Generator keywords are emitted as
//! positional [`Token::Keyword`] tokens.

use crate::vocabulary::Vocabulary;
use thiserror::Error;

/// One lexical token of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Run of name characters
    Word(String),
    /// Single- or double-quoted text, kept verbatim without its quotes
    Quoted { text: String, quote: char },
    /// Literal time value such as `08:30:00`
    Time(String),
    /// Occurrence of a generator keyword, matched case-insensitively
    Keyword {
        keyword: String,
        raw: String,
        ordinal: usize,
    },
    Dot,
    Colon,
    Equals,
    Comma,
    /// Collapsed run of whitespace
    Space,
}

impl Token {
    /// Text this token contributes to a parsed field
    pub fn text(&self) -> &str {
        match self {
            Self::Word(text) | Self::Time(text) => text,
            Self::Quoted { text, .. } => text,
            Self::Keyword { raw, .. } => raw,
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Equals => "=",
            Self::Comma => ",",
            Self::Space => " ",
        }
    }

    pub fn is_space(&self) -> bool {
        matches!(self, Self::Space)
    }

    /// Word or keyword made only of `[A-Za-z0-9_]`
    pub fn is_identifier(&self) -> bool {
        match self {
            Self::Word(text) | Self::Keyword { raw: text, .. } => {
                text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}

/// Concatenated text of a token run, with surrounding spaces trimmed
pub fn join_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::text)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Drop leading and trailing [`Token::Space`] tokens
pub fn trim_spaces(tokens: &[Token]) -> &[Token] {
    let start = tokens
        .iter()
        .position(|t| !t.is_space())
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| !t.is_space())
        .map_or(start, |i| i + 1);
    &tokens[start..end]
}

/// Lexical error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated {quote} quote at offset {offset}")]
    UnterminatedQuote { quote: char, offset: usize },

    #[error("Line break inside quoted text at offset {offset}")]
    LineBreakInQuote { offset: usize },

    #[error("Illegal character {ch:?} at offset {offset}")]
    IllegalCharacter { ch: char, offset: usize },

    #[error("Unbalanced parentheses")]
    UnbalancedParentheses,

    #[error("More than one colon outside quotes")]
    ExtraColon,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | ';' | '_' | '(' | ')' | '/' | '\\')
}

fn is_time_at(chars: &[char], at: usize) -> bool {
    const SHAPE: &[u8] = b"dd:dd:dd";
    chars.len() >= at + SHAPE.len()
        && SHAPE.iter().enumerate().all(|(i, s)| {
            let c = chars[at + i];
            if *s == b':' {
                c == ':'
            } else {
                c.is_ascii_digit()
            }
        })
}

/// Split statement text into tokens
pub fn tokenize(text: &str, vocab: &Vocabulary) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut keyword_ordinal = 0;
    let mut colons = 0;
    let mut open_parens = 0usize;
    let mut close_parens = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                tokens.push(Token::Space);
                continue;
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or(LexError::UnterminatedQuote {
                        quote: c,
                        offset: i,
                    })?;
                // Stored values are one `path:value` line each
                if let Some(at) = chars[i + 1..i + 1 + close]
                    .iter()
                    .position(|&q| q == '\n' || q == '\r')
                {
                    return Err(LexError::LineBreakInQuote { offset: i + 1 + at });
                }
                let text: String = chars[i + 1..i + 1 + close].iter().collect();
                tokens.push(Token::Quoted { text, quote: c });
                i += close + 2;
                continue;
            }
            '.' => tokens.push(Token::Dot),
            '=' => tokens.push(Token::Equals),
            ',' => tokens.push(Token::Comma),
            ':' => {
                colons += 1;
                tokens.push(Token::Colon);
            }
            c if is_word_char(c) => {
                if is_time_at(&chars, i) {
                    tokens.push(Token::Time(chars[i..i + 8].iter().collect()));
                    i += 8;
                    continue;
                }
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    match chars[i] {
                        '(' => open_parens += 1,
                        ')' => close_parens += 1,
                        _ => {}
                    }
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match vocab.generator_keyword_ignore_case(&word) {
                    Some(keyword) => {
                        tokens.push(Token::Keyword {
                            keyword: keyword.to_string(),
                            raw: word,
                            ordinal: keyword_ordinal,
                        });
                        keyword_ordinal += 1;
                    }
                    None => tokens.push(Token::Word(word)),
                }
                continue;
            }
            other => {
                return Err(LexError::IllegalCharacter {
                    ch: other,
                    offset: i,
                })
            }
        }
        i += 1;
    }

    if open_parens != close_parens {
        return Err(LexError::UnbalancedParentheses);
    }
    if colons > 1 {
        return Err(LexError::ExtraColon);
    }
    Ok(tokens)
}
