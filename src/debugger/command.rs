use std::fmt;
use std::str::SplitWhitespace;

use super::error::{ArgumentError, CommandError, ValueError};
use crate::lexer::{is_id, is_id_start, parse_number};

/// Bytes shown by `memory` when no length is given.
const DEFAULT_MEMORY_LEN: u32 = 16;

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum Command<'a> {
    Help,
    Step { count: u32 },
    Continue,
    Registers,
    Memory { location: Location<'a>, len: u32 },
    BreakAdd { location: Location<'a> },
    BreakRemove { location: Location<'a> },
    BreakList,
    Symbols,
    Reset,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Step,
    Continue,
    Registers,
    Memory,
    BreakAdd,
    BreakRemove,
    BreakList,
    Symbols,
    Reset,
    Quit,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help"),
            Self::Step => write!(f, "step"),
            Self::Continue => write!(f, "continue"),
            Self::Registers => write!(f, "registers"),
            Self::Memory => write!(f, "memory"),
            Self::BreakAdd => write!(f, "break add"),
            Self::BreakRemove => write!(f, "break remove"),
            Self::BreakList => write!(f, "break list"),
            Self::Symbols => write!(f, "symbols"),
            Self::Reset => write!(f, "reset"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

/// Label or literal number. What the number means depends on the command:
/// a data address for `memory`, a code offset for `break`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Location<'a> {
    Label(&'a str),
    Number(u32),
}

impl<'a> TryFrom<&'a str> for Command<'a> {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &'a str) -> Result<Self, Self::Error> {
        let mut iter = ArgIter::from(line);
        let command_name = iter.get_command_name()?;
        Command::parse_arguments(command_name, &mut iter).map_err(|error| {
            CommandError::InvalidArgument {
                command_name,
                error,
            }
        })
    }
}

impl<'a> Command<'a> {
    fn parse_arguments(name: CommandName, iter: &mut ArgIter<'a>) -> Result<Self, ArgumentError> {
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Continue => Self::Continue,
            CommandName::Registers => Self::Registers,
            CommandName::BreakList => Self::BreakList,
            CommandName::Symbols => Self::Symbols,
            CommandName::Reset => Self::Reset,
            CommandName::Quit => Self::Quit,

            CommandName::Step => {
                expected_args = 1;
                let count = iter.next_positive_integer("count")?.unwrap_or(1);
                Self::Step { count }
            }
            CommandName::Memory => {
                expected_args = 2;
                let location = iter.next_location("location")?;
                let len = iter
                    .next_positive_integer("length")?
                    .unwrap_or(DEFAULT_MEMORY_LEN);
                Self::Memory { location, len }
            }
            CommandName::BreakAdd => {
                expected_args = 1;
                let location = iter.next_location("location")?;
                Self::BreakAdd { location }
            }
            CommandName::BreakRemove => {
                expected_args = 1;
                let location = iter.next_location("location")?;
                Self::BreakRemove { location }
            }
        };

        iter.expect_end(expected_args)?;
        Ok(command)
    }
}

struct ArgIter<'a> {
    words: SplitWhitespace<'a>,
    /// Arguments consumed so far, excluding command names
    count: u8,
}

impl<'a> From<&'a str> for ArgIter<'a> {
    fn from(line: &'a str) -> Self {
        Self {
            words: line.split_whitespace(),
            count: 0,
        }
    }
}

impl<'a> ArgIter<'a> {
    fn get_command_name(&mut self) -> Result<CommandName, CommandError> {
        let Some(word) = self.words.next() else {
            return Err(CommandError::InvalidCommand {
                command_name: String::new(),
            });
        };
        let name = match word.to_lowercase().as_str() {
            "help" | "h" => CommandName::Help,
            "step" | "s" => CommandName::Step,
            "continue" | "c" => CommandName::Continue,
            "registers" | "r" | "p" => CommandName::Registers,
            "memory" | "m" => CommandName::Memory,
            "symbols" | "sym" => CommandName::Symbols,
            "reset" => CommandName::Reset,
            "quit" | "q" | "exit" => CommandName::Quit,
            "break" | "b" => {
                let command_name = "break";
                let Some(sub) = self.words.next() else {
                    return Err(CommandError::MissingSubcommand { command_name });
                };
                match sub.to_lowercase().as_str() {
                    "add" | "a" => CommandName::BreakAdd,
                    "remove" | "r" | "delete" | "d" => CommandName::BreakRemove,
                    "list" | "l" => CommandName::BreakList,
                    _ => {
                        return Err(CommandError::InvalidSubcommand {
                            command_name,
                            subcommand_name: sub.to_string(),
                        })
                    }
                }
            }
            _ => {
                return Err(CommandError::InvalidCommand {
                    command_name: word.to_string(),
                })
            }
        };
        Ok(name)
    }

    fn next_word(&mut self) -> Option<&'a str> {
        let word = self.words.next()?;
        self.count += 1;
        Some(word)
    }

    fn next_positive_integer(
        &mut self,
        argument_name: &'static str,
    ) -> Result<Option<u32>, ArgumentError> {
        let Some(word) = self.next_word() else {
            return Ok(None);
        };
        let invalid = |error| ArgumentError::InvalidValue {
            argument_name,
            error,
        };
        match parse_number(word) {
            Some(0) => Err(invalid(ValueError::Zero)),
            Some(value) if !word.starts_with('-') => Ok(Some(value)),
            _ => Err(invalid(ValueError::MalformedInteger)),
        }
    }

    fn next_location(&mut self, argument_name: &'static str) -> Result<Location<'a>, ArgumentError> {
        let Some(word) = self.next_word() else {
            return Err(ArgumentError::MissingArgument { argument_name });
        };
        let error = if word.starts_with(|c: char| c.is_ascii_digit()) {
            match parse_number(word) {
                Some(value) => return Ok(Location::Number(value)),
                None => ValueError::MalformedInteger,
            }
        } else if word.starts_with(is_id_start) && word.chars().all(is_id) {
            return Ok(Location::Label(word));
        } else {
            ValueError::MalformedLabel
        };
        Err(ArgumentError::InvalidValue {
            argument_name,
            error,
        })
    }

    fn expect_end(&mut self, expected_count: u8) -> Result<(), ArgumentError> {
        let extra = self.words.by_ref().count();
        if extra == 0 {
            return Ok(());
        }
        Err(ArgumentError::TooManyArguments {
            expected_count,
            actual_count: usize::from(self.count) + extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases() {
        assert_eq!(Command::try_from("s"), Ok(Command::Step { count: 1 }));
        assert_eq!(Command::try_from("step 0x10"), Ok(Command::Step { count: 16 }));
        assert_eq!(Command::try_from("C"), Ok(Command::Continue));
        assert_eq!(Command::try_from("p"), Ok(Command::Registers));
        assert_eq!(Command::try_from("q"), Ok(Command::Quit));
        assert_eq!(Command::try_from("b l"), Ok(Command::BreakList));
        assert_eq!(Command::try_from("help me please"), Ok(Command::Help));
    }

    #[test]
    fn locations() {
        assert_eq!(
            Command::try_from("m msg"),
            Ok(Command::Memory {
                location: Location::Label("msg"),
                len: 16
            })
        );
        assert_eq!(
            Command::try_from("memory 0xA1000000 4"),
            Ok(Command::Memory {
                location: Location::Number(0xA100_0000),
                len: 4
            })
        );
        assert_eq!(
            Command::try_from("break add 3"),
            Ok(Command::BreakAdd {
                location: Location::Number(3)
            })
        );
        assert_eq!(
            Command::try_from("break remove loop"),
            Ok(Command::BreakRemove {
                location: Location::Label("loop")
            })
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            Command::try_from("frobnicate"),
            Err(CommandError::InvalidCommand {
                command_name: "frobnicate".into()
            })
        );
        assert_eq!(
            Command::try_from("break"),
            Err(CommandError::MissingSubcommand {
                command_name: "break"
            })
        );
        assert_eq!(
            Command::try_from("step 0"),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::Step,
                error: ArgumentError::InvalidValue {
                    argument_name: "count",
                    error: ValueError::Zero
                }
            })
        );
        assert_eq!(
            Command::try_from("step 1 2"),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::Step,
                error: ArgumentError::TooManyArguments {
                    expected_count: 1,
                    actual_count: 2
                }
            })
        );
        assert_eq!(
            Command::try_from(format!("registers{}", " x".repeat(256)).as_str()),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::Registers,
                error: ArgumentError::TooManyArguments {
                    expected_count: 0,
                    actual_count: 256
                }
            })
        );
        assert_eq!(
            Command::try_from(format!("step 1{}", " x".repeat(255)).as_str()),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::Step,
                error: ArgumentError::TooManyArguments {
                    expected_count: 1,
                    actual_count: 256
                }
            })
        );
        assert_eq!(
            Command::try_from("break add"),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::BreakAdd,
                error: ArgumentError::MissingArgument {
                    argument_name: "location"
                }
            })
        );
        assert_eq!(
            Command::try_from("m 12zz"),
            Err(CommandError::InvalidArgument {
                command_name: CommandName::Memory,
                error: ArgumentError::InvalidValue {
                    argument_name: "location",
                    error: ValueError::MalformedInteger
                }
            })
        );
    }
}
