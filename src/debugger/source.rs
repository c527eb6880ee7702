use std::collections::VecDeque;
use std::io::{self, IsTerminal, Lines, StdinLock, Write};

use colored::Colorize;

/// Where debugger commands come from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
}

// Command-line argument
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

// Standard input, either piped or an interactive terminal
#[derive(Debug)]
struct Stdin {
    lines: Lines<StdinLock<'static>>,
    /// Commands left over from a line holding several
    pending: VecDeque<String>,
    /// Command must be stored somewhere to be referenced
    buffer: String,
    is_terminal: bool,
}

pub trait SourceReader {
    /// `None` indicates EOF
    /// Returned string slice MAY include leading or trailing whitespace
    fn read(&mut self) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return SourceMode::Argument(Argument::from(argument));
        }
        SourceMode::Stdin(Stdin::new())
    }

    /// Whether commands are typed by a person, who sees them already.
    fn is_interactive(&self) -> bool {
        matches!(self, Self::Stdin(stdin) if stdin.is_terminal)
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self) -> Option<&str> {
        let interactive = self.is_interactive();
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
        };
        // Echo command for non-terminal source
        if !interactive {
            if let Some(command) = &command {
                dprintln!(Sometimes, "\x1b[1m(armsim)\x1b[0m {}", command.trim());
            }
        }
        command
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceReader for Argument {
    fn read(&mut self) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        // Take characters until delimiter
        let rest = &self.buffer[self.cursor..];
        let len = rest.find(['\n', ';']).unwrap_or(rest.len());
        let start = self.cursor;
        self.cursor += len + 1;
        self.buffer.get(start..start + len)
    }
}

impl Stdin {
    pub fn new() -> Self {
        let stdin = io::stdin();
        Self {
            is_terminal: stdin.is_terminal(),
            lines: stdin.lines(),
            pending: VecDeque::new(),
            buffer: String::new(),
        }
    }

    fn print_prompt(&self) {
        eprint!("{} ", "(armsim)".blue().bold());
        let _ = io::stderr().flush();
    }
}

impl SourceReader for Stdin {
    fn read(&mut self) -> Option<&str> {
        if self.pending.is_empty() {
            if self.is_terminal {
                self.print_prompt();
            }
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!("failed to read command: {err}");
                    return None;
                }
            };
            self.pending = line.split(';').map(str::to_string).collect();
        }
        self.buffer = self.pending.pop_front().unwrap_or_default();
        Some(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_splits_on_delimiters() {
        let mut source = Argument::from("s 2;r\nbreak list;;q".to_string());
        assert_eq!(source.read(), Some("s 2"));
        assert_eq!(source.read(), Some("r"));
        assert_eq!(source.read(), Some("break list"));
        assert_eq!(source.read(), Some(""));
        assert_eq!(source.read(), Some("q"));
        assert_eq!(source.read(), None);
    }
}
