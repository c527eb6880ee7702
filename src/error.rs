use std::fmt;

use miette::{miette, Diagnostic, LabeledSpan, Report, Severity};
use thiserror::Error;

use crate::span::Span;

/// Width of a single memory access.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Width {
    Byte,
    Halfword,
    Word,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Halfword => 2,
            Width::Word => 4,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Byte => write!(f, "byte"),
            Width::Halfword => write!(f, "halfword"),
            Width::Word => write!(f, "word"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum MemoryError {
    #[error("misaligned {width} access at address 0x{addr:08x}")]
    #[diagnostic(
        code(memory::misaligned),
        help("halfword and word accesses must be aligned to their size")
    )]
    Misaligned { addr: u32, width: Width },

    #[error("out of bounds access at address 0x{addr:08x}")]
    #[diagnostic(
        code(memory::out_of_bounds),
        help("data memory spans 0x{base:08x}..0x{end:08x}")
    )]
    OutOfBounds { addr: u32, base: u32, end: u32 },
}

/// Raised while turning parser output into a runnable program.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum BuildError {
    #[error("AREA {name} cannot have both CODE and DATA attributes")]
    #[diagnostic(code(build::area), help("split the area into a CODE area and a DATA area"))]
    ConflictingArea { name: String },

    #[error("label `{name}` is defined more than once")]
    #[diagnostic(code(build::duplicate_label), help("labels are only allowed once per file"))]
    DuplicateSymbol { name: String },

    #[error("label `{name}` is never defined")]
    #[diagnostic(code(build::unresolved_label))]
    UnresolvedSymbol { name: String },

    #[error("{mnemonic} cannot load or store through a `=` target")]
    #[diagnostic(
        code(build::pseudo_target),
        help("only LDR accepts the `LDR Rd, =value` form")
    )]
    PseudoTargetNotAllowed { mnemonic: &'static str },

    #[error("data does not fit in memory")]
    #[diagnostic(code(build::data_overflow))]
    Memory(#[from] MemoryError),
}

/// Raised by a single instruction or by the fetch step.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum ExecError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error("label `{name}` is never defined")]
    #[diagnostic(code(exec::unresolved_label))]
    UnresolvedSymbol { name: String },

    #[error("program counter {pc} is outside the code segment")]
    #[diagnostic(
        code(exec::pc_out_of_range),
        help("the code segment holds {len} instructions")
    )]
    PcOutOfRange { pc: u32, len: usize },
}

// Lexer errors

pub fn lex_unclosed_str(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::str_lit",
        help = "make sure to close string literals with a \" character.",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an unterminated string literal.",
    )
    .with_source_code(src.to_owned())
}

pub fn lex_invalid_lit(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_lit",
        help = "literals must fit in 32 bits, e.g. #42, #-4 or #0xFF",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid literal.",
    )
    .with_source_code(src.to_owned())
}

pub fn lex_unknown(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unknown",
        help = "make sure that your immediate literals start with #",
        labels = vec![LabeledSpan::at(span, "unknown token")],
        "Encountered an unknown token",
    )
    .with_source_code(src.to_owned())
}

// Parser errors

pub fn parse_unexpected(span: Span, src: &str, expected: &str, found: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_token",
        help = "check the operands for this instruction",
        labels = vec![LabeledSpan::at(span, "unexpected token")],
        "Expected {expected}, found {found}",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_eol(span: Span, src: &str, expected: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_eol",
        help = "you may be missing operands in this statement",
        labels = vec![LabeledSpan::at(span, "statement ends here")],
        "Expected {expected}, found end of line",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_trailing(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::trailing_tokens",
        help = "only one statement is allowed per line",
        labels = vec![LabeledSpan::at(span, "unexpected operand")],
        "Too many operands for this statement",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_unknown_mnemonic(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::mnemonic",
        help = "labels must start at the beginning of a line; instructions follow them",
        labels = vec![LabeledSpan::at(span, "unknown mnemonic")],
        "Encountered an unknown instruction or directive.",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_unsupported(span: Span, src: &str, mnemonic: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unsupported",
        help = "block transfers, swaps and PSR transfers are not simulated",
        labels = vec![LabeledSpan::at(span, "unsupported instruction")],
        "{mnemonic} is not supported by this simulator",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_dangling_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::dangling_label",
        help = "a label must be followed by an instruction or data directive",
        labels = vec![LabeledSpan::at(span, "label without statement")],
        "Label does not refer to any statement",
    )
    .with_source_code(src.to_owned())
}

pub fn parse_bad_value(span: Span, src: &str, help: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::bad_value",
        help = help,
        labels = vec![LabeledSpan::at(span, "invalid value")],
        "Operand value is out of range",
    )
    .with_source_code(src.to_owned())
}

/// Attach a source span to a construction error raised while parsing.
pub fn parse_build(span: Span, src: &str, err: BuildError) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::invalid_operands",
        labels = vec![LabeledSpan::at(span, "invalid statement")],
        "{err}",
    )
    .with_source_code(src.to_owned())
}
