use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use armsim::output::Output;
use armsim::{Debugger, DebuggerOptions, Program};

/// armsim assembles ARM assembly and runs it on a simulated ARMv4/v5 core.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.s` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an assembly file to completion and print the final registers
    Run {
        /// Assembly file to run
        name: PathBuf,
        /// Give up after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run an assembly file under the step debugger
    Debug {
        /// Assembly file to run
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Check assembly files without running them
    Check {
        /// Files or glob patterns to check
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ARMSIM_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
    armsim::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(armsim::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Some(Command::Run {
            name,
            max_steps,
            minimal,
        }) => run(&name, max_steps, minimal),
        Some(Command::Debug {
            name,
            command,
            minimal,
        }) => debug(&name, DebuggerOptions { command }, minimal),
        Some(Command::Check { patterns }) => {
            let mut failed = 0;
            let mut checked = 0;
            for path in expand_patterns(&patterns)? {
                checked += 1;
                file_message(Green, "Checking", &path);
                let src = fs::read_to_string(&path).into_diagnostic()?;
                if let Err(report) = assemble(&src) {
                    eprintln!("{:?}", report);
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{failed} of {checked} files failed to assemble");
            }
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        None => match args.path {
            Some(path) => run(&path, None, false),
            None => {
                println!("\n~ armsim v{VERSION} ~");
                println!("{SHORT_INFO}");
                Ok(())
            }
        },
    }
}

enum MsgColor {
    Green,
    Cyan,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
    };
    eprintln!("{left:>12} {right}");
}

fn run(name: &Path, max_steps: Option<u64>, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    file_message(MsgColor::Green, "Assembling", name);
    let src = fs::read_to_string(name).into_diagnostic()?;
    let mut program = assemble(&src)?;

    message(MsgColor::Green, "Running", "assembled program");
    let outcome = match max_steps {
        Some(max) => program.run_bounded(max).map(|taken| taken.is_some()),
        None => program.run().map(|()| true),
    };
    match outcome {
        Ok(true) => {}
        Ok(false) => {
            print_final(&program);
            bail!("Stopped after {} steps without reaching the end", max_steps.unwrap_or(0));
        }
        Err(err) => {
            print_final(&program);
            let pc = program.registers().regs[15];
            let report = miette::Report::new(err);
            // PC has already moved past the faulting instruction
            return Err(match program.span_at(pc.wrapping_sub(1)) {
                Some(span) => report
                    .wrap_err(format!("while executing `{}`", &src[span.as_range()])),
                None => report,
            });
        }
    }

    if program.breakpoint_hit().is_none() {
        message(MsgColor::Cyan, "Paused", "at BKPT");
    }
    print_final(&program);
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn debug(name: &Path, opts: DebuggerOptions, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    file_message(MsgColor::Green, "Assembling", name);
    let src = fs::read_to_string(name).into_diagnostic()?;
    let mut program = assemble(&src)?;

    message(MsgColor::Green, "Debugging", "assembled program");
    Debugger::new(opts, &mut program, &src).run();
    print_final(&program);
    Ok(())
}

fn print_final(program: &Program) {
    Output::Normal.print_registers(&program.registers(), &[]);
}

/// Assemble and load a program, ready to run.
fn assemble(src: &str) -> Result<Program> {
    let mut program = Program::with_memory_size(armsim::env::memory_size());
    program.assemble(src)?;
    program.start();
    Ok(program)
}

/// Expand glob patterns into paths. A pattern matching nothing is an error.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern).into_diagnostic()? {
            paths.push(entry.into_diagnostic()?);
        }
        if paths.len() == before {
            bail!("No files match `{pattern}`");
        }
    }
    Ok(paths)
}

const SHORT_INFO: &str = r"
Welcome to armsim, an assembler and simulator for ARMv4/v5 assembly.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
