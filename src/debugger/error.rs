use thiserror::Error;

use super::command::CommandName;

/// Error parsing a command.
#[derive(Debug, PartialEq, Error)]
pub enum CommandError {
    #[error("Not a command: `{command_name}`")]
    InvalidCommand { command_name: String },
    #[error("Missing subcommand for `{command_name}`")]
    MissingSubcommand { command_name: &'static str },
    #[error("Invalid subcommand `{subcommand_name}` for command `{command_name}`")]
    InvalidSubcommand {
        command_name: &'static str,
        subcommand_name: String,
    },
    #[error("In command `{command_name}`: {error}")]
    InvalidArgument {
        command_name: CommandName,
        error: ArgumentError,
    },
}

/// Error parsing command arguments.
#[derive(Debug, PartialEq, Error)]
pub enum ArgumentError {
    #[error("Missing argument `{argument_name}`")]
    MissingArgument { argument_name: &'static str },
    #[error("Too many arguments (expected {expected_count}, found {actual_count})")]
    TooManyArguments {
        expected_count: u8,
        actual_count: usize,
    },
    #[error("For argument `{argument_name}`: {error}")]
    InvalidValue {
        argument_name: &'static str,
        error: ValueError,
    },
}

/// Error parsing an argument value.
#[derive(Debug, PartialEq, Error)]
pub enum ValueError {
    #[error("Malformed integer")]
    MalformedInteger,
    #[error("Malformed label")]
    MalformedLabel,
    #[error("Must be greater than zero")]
    Zero,
}
