mod command;
mod error;
mod source;

use self::command::{Command, Location};
use self::source::{SourceMode, SourceReader};
use crate::output::{Output, Visibility};
use crate::program::{Program, StepOutcome};
use crate::registers::{RegisterSnapshot, CPSR_INDEX};

/// Leave this as a struct, in case more options are added in the future. Plus it is more explicit.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    /// Commands separated by `;` or newlines, instead of reading stdin
    pub command: Option<String>,
}

/// Line-driven debugger over an assembled [`Program`].
pub struct Debugger<'a> {
    program: &'a mut Program,
    /// Assembly source, to show the lines breakpoints sit on.
    src: &'a str,
    command_source: SourceMode,
    /// Repeated when an empty line is entered.
    last_command: Option<String>,
    /// Whether PC should be displayed on next command prompt.
    should_echo_pc: bool,
}

/// What to do after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Proceed,
    Quit,
}

impl<'a> Debugger<'a> {
    pub fn new(opts: DebuggerOptions, program: &'a mut Program, src: &'a str) -> Self {
        Self {
            program,
            src,
            command_source: SourceMode::from(opts.command),
            last_command: None,
            should_echo_pc: true,
        }
    }

    /// Read and execute commands until `quit` or the end of input.
    pub fn run(&mut self) {
        loop {
            Output::Debugger(Visibility::Always).start_new_line();
            if self.should_echo_pc {
                dprintln!(Sometimes, "Program counter at: {}.", self.program.registers().regs[15]);
                self.should_echo_pc = false;
            }

            // Convert `EOF` to `quit` command
            let Some(line) = self.next_line() else {
                break;
            };
            let command = match Command::try_from(line.as_str()) {
                Ok(command) => command,
                Err(error) => {
                    dprintln!(Always, "{}", error);
                    dprintln!(Always, "Type `help` for a list of commands.");
                    continue;
                }
            };
            if self.execute(command) == Action::Quit {
                break;
            }
        }
        self.program.halt();
    }

    /// Next non-empty line, substituting the previous one for an empty line.
    fn next_line(&mut self) -> Option<String> {
        loop {
            let line = self.command_source.read()?.trim().to_string();
            if !line.is_empty() {
                self.last_command = Some(line.clone());
                return Some(line);
            }
            if let Some(previous) = &self.last_command {
                return Some(previous.clone());
            }
        }
    }

    fn execute(&mut self, command: Command) -> Action {
        match command {
            Command::Quit => return Action::Quit,

            Command::Help => {
                dprintln!(Always, "\n{}", include_str!("./help.txt"));
            }

            Command::Step { count } => {
                let mut executed: u32 = 0;
                for _ in 0..count {
                    let instruction = self.program.current_instruction();
                    if !self.step_once() {
                        break;
                    }
                    executed += 1;
                    if let Some(instruction) = instruction {
                        self.print_step(&instruction);
                    }
                }
                if count > 1 {
                    dprintln!(Sometimes, "Executed {} instruction{}.", executed, plural(executed));
                }
                self.should_echo_pc = true;
            }

            Command::Continue => {
                dprintln!(Sometimes, "Continuing...");
                let mut executed: u64 = 0;
                while self.step_once() {
                    executed += 1;
                }
                dprintln!(Always, "Executed {} instruction{}.", executed, plural(executed));
                self.should_echo_pc = true;
            }

            Command::Registers => {
                dprintln!(Sometimes, "Registers:");
                Output::Debugger(Visibility::Always)
                    .print_registers(&self.program.registers(), self.program.changed_registers());
            }

            Command::Memory { location, len } => {
                let Some(addr) = self.resolve_location(location) else {
                    return Action::Proceed;
                };
                let memory = self.program.memory();
                if !memory.contains(addr) {
                    dprintln!(
                        Always,
                        "Address 0x{:08X} is outside data memory [0x{:08X}, 0x{:08X}).",
                        addr,
                        memory.base(),
                        memory.base() as u64 + memory.size() as u64
                    );
                    return Action::Proceed;
                }
                let bytes = memory.range_to_bytes(addr, len as usize);
                dprintln!(Sometimes, "Memory at address 0x{:08X}:", addr);
                Output::Debugger(Visibility::Always).print_memory(addr, &bytes);
            }

            Command::BreakAdd { location } => {
                let Some(offset) = self.resolve_location(location) else {
                    return Action::Proceed;
                };
                if offset as usize > self.program.code().len() {
                    dprintln!(Always, "Offset {} is not in the program.", offset);
                } else if self.program.add_breakpoint(offset) {
                    dprintln!(Always, "Added breakpoint at {}.", offset);
                } else {
                    dprintln!(Always, "Breakpoint already exists at {}.", offset);
                }
            }
            Command::BreakRemove { location } => {
                let Some(offset) = self.resolve_location(location) else {
                    return Action::Proceed;
                };
                if self.program.remove_breakpoint(offset) {
                    dprintln!(Always, "Removed breakpoint at {}.", offset);
                } else {
                    dprintln!(Always, "No removable breakpoint exists at {}.", offset);
                }
            }
            Command::BreakList => self.print_breakpoints(),

            Command::Symbols => {
                let symbols = self.program.symbol_table();
                if symbols.is_empty() {
                    dprintln!(Always, "No symbols defined.");
                }
                for (name, value) in symbols.iter() {
                    dprintln!(Always, "{:<16} 0x{:08X}", name, value);
                }
            }

            Command::Reset => {
                self.program.start();
                self.should_echo_pc = true;
                dprintln!(Always, "Reset program to initial state.");
            }
        }
        Action::Proceed
    }

    /// Execute one step, reporting why execution stopped if it did.
    ///
    /// Returns whether execution can go on.
    fn step_once(&mut self) -> bool {
        let pc = self.program.registers().regs[15];
        match self.program.step() {
            Ok(StepOutcome::Continued) => true,
            Ok(StepOutcome::Breakpoint) => {
                let hit = self.program.breakpoint_hit();
                match hit.and_then(|offset| self.program.breakpoints().get(offset)) {
                    Some(bp) if bp.is_predefined => {
                        dprintln!(Always, "Reached end of program. Use `reset` to restart.")
                    }
                    Some(_) => dprintln!(Always, "Reached breakpoint at {}. Pausing execution.", pc),
                    None => dprintln!(Always, "Reached BKPT at {}. Pausing execution.", pc),
                }
                false
            }
            Err(err) => {
                dprintln!(Always, "Execution error at {}: {}", pc, err);
                false
            }
        }
    }

    /// Show the executed instruction and every register it changed.
    fn print_step(&self, instruction: &str) {
        dprintln!(Always, "{}", instruction);
        let regs: RegisterSnapshot = self.program.registers();
        for &idx in self.program.changed_registers() {
            if idx == CPSR_INDEX {
                dprintln!(Always, "\tCPSR = 0x{:08X}   {}", regs.cpsr, regs.flags());
            } else if let Some(value) = regs.regs.get(idx) {
                let name = format!("R{}", idx);
                dprintln!(Always, "\t{:<4} = 0x{:08X} = {}", name, value, *value as i32);
            }
        }
    }

    fn print_breakpoints(&self) {
        let breakpoints = self.program.breakpoints();
        dprintln!(Always, "Breakpoints:");
        for (i, breakpoint) in breakpoints.iter().enumerate() {
            let line = match self.program.span_at(breakpoint.offset) {
                Some(span) => &self.src[span.as_range()],
                None => "(end of program)",
            };
            if Output::is_minimal() {
                dprintln!(Always, "{} {}", breakpoint.offset, line);
                continue;
            }
            let branch = if i + 1 == breakpoints.len() {
                "╰─"
            } else {
                "├─"
            };
            dprint!(Always, "{} {:>4}  ──  ", branch, breakpoint.offset);
            dprintln!(Always, "{}", line);
        }
    }

    fn resolve_location(&self, location: Location) -> Option<u32> {
        match location {
            Location::Number(value) => Some(value),
            Location::Label(name) => {
                let value = self.program.symbol_table().get(name);
                if value.is_none() {
                    dprintln!(Always, "Label not found named `{}`.", name);
                }
                value
            }
        }
    }
}

fn plural(count: impl Into<u64>) -> &'static str {
    if count.into() == 1 {
        ""
    } else {
        "s"
    }
}
