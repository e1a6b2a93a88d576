// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tokenizer for the Gremlin-Groovy subset accepted by the compiler.

use crate::error::CompileError;

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

impl Tok {
    /// Short description used in parser diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("identifier `{name}`"),
            Tok::Str(s) => format!("string {s:?}"),
            Tok::Int(n) => format!("number {n}"),
            Tok::Float(n) => format!("number {n}"),
            Tok::LParen => "`(`".into(),
            Tok::RParen => "`)`".into(),
            Tok::LBracket => "`[`".into(),
            Tok::RBracket => "`]`".into(),
            Tok::Comma => "`,`".into(),
            Tok::Dot => "`.`".into(),
            Tok::Eof => "end of input".into(),
        }
    }
}

/// A token plus the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) tok: Tok,
    pub(crate) offset: usize,
}

/// Split `text` into tokens. The returned vector always ends with [`Tok::Eof`].
pub(crate) fn tokenize(text: &str) -> Result<Vec<Spanned>, CompileError> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => push(&mut out, Tok::LParen, start, &mut i),
            b')' => push(&mut out, Tok::RParen, start, &mut i),
            b'[' => push(&mut out, Tok::LBracket, start, &mut i),
            b']' => push(&mut out, Tok::RBracket, start, &mut i),
            b',' => push(&mut out, Tok::Comma, start, &mut i),
            b'.' => push(&mut out, Tok::Dot, start, &mut i),
            b'\'' | b'"' => {
                let (s, next) = lex_string(text, start)?;
                out.push(Spanned {
                    tok: Tok::Str(s),
                    offset: start,
                });
                i = next;
            }
            b'-' | b'0'..=b'9' => {
                let (tok, next) = lex_number(text, start)?;
                out.push(Spanned { tok, offset: start });
                i = next;
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric())
                {
                    end += 1;
                }
                out.push(Spanned {
                    tok: Tok::Ident(text[start..end].to_string()),
                    offset: start,
                });
                i = end;
            }
            _ => {
                let found = text[start..].chars().next().unwrap_or('\u{fffd}');
                return Err(CompileError::UnexpectedChar {
                    found,
                    offset: start,
                });
            }
        }
    }

    out.push(Spanned {
        tok: Tok::Eof,
        offset: text.len(),
    });
    Ok(out)
}

fn push(out: &mut Vec<Spanned>, tok: Tok, offset: usize, i: &mut usize) {
    out.push(Spanned { tok, offset });
    *i += 1;
}

fn lex_string(text: &str, start: usize) -> Result<(String, usize), CompileError> {
    let mut chars = text[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(CompileError::UnterminatedString { offset: start }),
    };
    let mut value = String::new();
    let mut escaped = false;
    for (rel, ch) in chars {
        if escaped {
            value.push(match ch {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((value, start + rel + ch.len_utf8()));
        } else {
            value.push(ch);
        }
    }
    Err(CompileError::UnterminatedString { offset: start })
}

fn lex_number(text: &str, start: usize) -> Result<(Tok, usize), CompileError> {
    let bytes = text.as_bytes();
    let mut end = start;
    if bytes[end] == b'-' {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut is_float = false;
    // `1.5` is a float, `1.foo()` never occurs in Gremlin so a dot followed
    // by a digit is the only fraction form we accept.
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let literal = &text[start..end];
    if end == digits_start {
        return Err(CompileError::UnexpectedChar {
            found: '-',
            offset: start,
        });
    }

    // Groovy numeric suffixes: 44L, 1.5d, 2.0f
    let mut next = end;
    if next < bytes.len() {
        match bytes[next] {
            b'L' | b'l' if !is_float => next += 1,
            b'd' | b'D' | b'f' | b'F' => {
                is_float = true;
                next += 1;
            }
            _ => {}
        }
    }

    let invalid = || CompileError::InvalidNumber {
        text: text[start..next].to_string(),
        offset: start,
    };
    let tok = if is_float {
        Tok::Float(literal.parse::<f64>().map_err(|_| invalid())?)
    } else {
        Tok::Int(literal.parse::<i64>().map_err(|_| invalid())?)
    };
    Ok((tok, next))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Tok> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|s| s.tok)
            .collect()
    }

    #[test]
    fn tokenizes_mixed_quotes_and_suffixes() {
        assert_eq!(
            kinds(r#"has("age", 44L).is(1.5d)"#),
            vec![
                Tok::Ident("has".into()),
                Tok::LParen,
                Tok::Str("age".into()),
                Tok::Comma,
                Tok::Int(44),
                Tok::RParen,
                Tok::Dot,
                Tok::Ident("is".into()),
                Tok::LParen,
                Tok::Float(1.5),
                Tok::RParen,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r"'O\'Brien'"),
            vec![Tok::Str("O'Brien".into()), Tok::Eof]
        );
    }

    #[test]
    fn unterminated_string_reports_opening_offset() {
        let err = tokenize("g.V('abc").unwrap_err();
        assert_eq!(err, CompileError::UnterminatedString { offset: 4 });
    }

    #[test]
    fn stray_character_is_rejected() {
        let err = tokenize("g.V();").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnexpectedChar {
                found: ';',
                offset: 5
            }
        );
    }

    #[test]
    fn negative_numbers_lex_as_one_token() {
        assert_eq!(kinds("-3"), vec![Tok::Int(-3), Tok::Eof]);
    }
}
