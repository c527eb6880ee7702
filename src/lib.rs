// Parsing
mod lexer;
mod parser;
pub use parser::AsmParser;
pub mod air;
pub use air::Air;

// Machine model
pub mod condition;
pub mod instruction;
pub mod memory;
pub mod operand;
pub mod registers;
pub mod symbol;
pub use instruction::Instruction;
pub use memory::Memory;
pub use registers::RegisterFile;

// Running
pub mod breakpoint;
pub mod program;
pub use program::{Program, ProgramState, StepOutcome};
#[macro_use]
pub mod output;
mod debugger;
pub use debugger::{Debugger, DebuggerOptions};

pub mod error;
pub use error::{BuildError, ExecError, MemoryError};
pub mod span;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
