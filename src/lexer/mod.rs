use std::fmt;

use miette::Result;

use crate::error;
use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};

pub mod cursor;

/// Carries the kind of token and where it sits in the source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonics, directives, registers, shift names and labels
    Ident,
    /// `#12`, `#-4`, `#0x1F`
    Imm(u32),
    /// Unprefixed number: `12`, `-4`, `0x1F`
    Num(u32),
    /// String literal, quotes included
    Str,
    /// `=` introducing a load target
    Eq,
    LBracket,
    RBracket,
    /// Write-back marker after `]`
    Bang,
    /// Optional terminator after a label
    Colon,
    /// Statements end at line breaks
    Newline,
    Comment,
    /// Commas count as whitespace
    Whitespace,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Imm(_) => "immediate",
            TokenKind::Num(_) => "number",
            TokenKind::Str => "string literal",
            TokenKind::Eq => "`=`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Bang => "`!`",
            TokenKind::Colon => "`:`",
            TokenKind::Newline => "end of line",
            TokenKind::Comment => "comment",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Eof => "end of file",
        };
        f.write_str(name)
    }
}

/// Tokenize the whole source, dropping whitespace and comments.
///
/// The result always ends with a single [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor::new(src);
    let mut toks = Vec::new();
    loop {
        let tok = cursor.advance_token(src)?;
        match tok.kind {
            TokenKind::Whitespace | TokenKind::Comment => continue,
            TokenKind::Eof => {
                toks.push(tok);
                break;
            }
            _ => toks.push(tok),
        }
    }
    Ok(toks)
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | ',')
}

/// Test if a character can start an identifier.
pub(crate) fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '.')
}

/// Test if a character can continue an identifier.
pub(crate) fn is_id(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self, src: &str) -> Result<Token> {
        let start = self.token_start();
        let first_char = match self.bump() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, Span::new(Idx(start as u32), 0))),
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            '\n' => TokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            c if is_id_start(c) => {
                self.take_while(is_id);
                TokenKind::Ident
            }
            '#' => TokenKind::Imm(self.number(src, start)?),
            c if c.is_ascii_digit() || ((c == '-' || c == '+') && self.first().is_ascii_digit()) => {
                // `number` expects to start at the literal
                TokenKind::Num(self.number_from(c, src, start)?)
            }
            '"' => {
                let mut terminated = false;
                while let Some(c) = self.bump() {
                    match c {
                        '\\' => {
                            self.bump();
                        }
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\n' => break,
                        _ => (),
                    }
                }
                if !terminated {
                    let span = Span::new(Idx(start as u32), self.pos_in_token());
                    return Err(error::lex_unclosed_str(span, src));
                }
                TokenKind::Str
            }
            '=' => TokenKind::Eq,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '!' => TokenKind::Bang,
            ':' => TokenKind::Colon,
            _ => {
                let span = Span::new(Idx(start as u32), self.pos_in_token());
                return Err(error::lex_unknown(span, src));
            }
        };
        let tok = Token::new(kind, Span::new(Idx(start as u32), self.pos_in_token()));
        self.reset_pos();
        Ok(tok)
    }

    /// Lex the literal following a `#`.
    fn number(&mut self, src: &str, start: usize) -> Result<u32> {
        match self.bump() {
            Some(c) => self.number_from(c, src, start),
            None => Err(error::lex_invalid_lit(
                Span::new(Idx(start as u32), self.pos_in_token()),
                src,
            )),
        }
    }

    /// Lex a literal whose first char has already been consumed.
    fn number_from(&mut self, first: char, src: &str, start: usize) -> Result<u32> {
        let lit_start = start + self.pos_in_token() as usize - first.len_utf8();
        self.take_while(is_id);
        let span = Span::new(Idx(start as u32), self.pos_in_token());
        let text = &src[lit_start..span.end()];
        parse_number(text).ok_or_else(|| error::lex_invalid_lit(span, src))
    }
}

/// Parse a signed decimal, hex (`0x`) or binary (`0b`) literal into its
/// 32-bit two's-complement pattern.
pub(crate) fn parse_number(text: &str) -> Option<u32> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<u64>().ok()?
    };
    if negative {
        (magnitude <= 1 << 31).then(|| (magnitude as u32).wrapping_neg())
    } else {
        u32::try_from(magnitude).ok()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn instruction_line() {
        assert_eq!(
            kinds("loop ADDS R0, R1, #-1 ; count down\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Imm(0xFFFF_FFFF),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn addressing_tokens() {
        assert_eq!(
            kinds("LDR r0, [r1, #0x10]!\nLDR r2, =msg"),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::LBracket,
                TokenKind::Ident,
                TokenKind::Imm(0x10),
                TokenKind::RBracket,
                TokenKind::Bang,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let src = "msg DCB \"hi\\n\", 0";
        let toks = tokenize(src).unwrap();
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert_eq!(&src[toks[2].span.as_range()], "\"hi\\n\"");
        assert_eq!(toks[3].kind, TokenKind::Num(0));
        assert_eq!(toks[3].span.offs(), src.len() - 1);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("-0x10"), Some(0xFFFF_FFF0));
        assert_eq!(parse_number("0b101"), Some(5));
        assert_eq!(parse_number("0xFFFFFFFF"), Some(u32::MAX));
        assert_eq!(parse_number("-2147483648"), Some(0x8000_0000));
        assert_eq!(parse_number("0x100000000"), None);
        assert_eq!(parse_number("12ab"), None);
    }

    #[test]
    fn lex_errors() {
        assert!(tokenize("DCB \"open").is_err());
        assert!(tokenize("MOV R0, #").is_err());
        assert!(tokenize("MOV R0, #zz").is_err());
        assert!(tokenize("MOV R0, $1").is_err());
    }
}
