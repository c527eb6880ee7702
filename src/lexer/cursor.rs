// Modelled on the cursor in `rustc_lexer`.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

pub(crate) const EOF_CHAR: char = '\0';

/// Peekable iterator over a char sequence that remembers where the current
/// token started.
#[derive(Clone)]
pub struct Cursor<'a> {
    /// Total length of the source, to turn remaining lengths into offsets
    src_len: usize,
    /// Length remaining when the current token started
    len_remaining: usize,
    chars: Chars<'a>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            src_len: input.len(),
            len_remaining: input.len(),
            chars: input.chars(),
        }
    }

    /// Peek the next char without consuming it. `EOF_CHAR` at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Consume chars while `predicate` holds.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }

    /// Byte length of the token consumed so far.
    pub fn pos_in_token(&self) -> u32 {
        (self.len_remaining - self.chars.as_str().len()) as u32
    }

    /// Byte offset of the start of the current token.
    pub fn token_start(&self) -> usize {
        self.src_len - self.len_remaining
    }

    /// Start a new token at the current position.
    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
    }
}
