use std::{fs, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

use evoscript::{EvoError, Repl, RunMode, Runtime};

#[derive(Parser)]
#[command(author, version, about = "evoscript language interpreter")]
struct Args {
    /// Log interpreter internals to stderr (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    trace: u8,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an evoscript file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of evoscript code and print its value
    Eval { source: String },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.trace);
    let result = match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script),
        Command::Repl => Repl::new().run(),
        Command::Eval { source } => {
            let mut runtime = Runtime::new();
            runtime.run_code(&source, RunMode::Repl).map(|_| ())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Script errors are reported by the runtime itself.
        Err(EvoError::Syntax(_) | EvoError::Diagnostic(_) | EvoError::Exception(_)) => {
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: PathBuf) -> Result<(), EvoError> {
    let source = fs::read_to_string(&path)?;
    let mut runtime = Runtime::new();
    runtime.run_code(&source, RunMode::Script)?;
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => return,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
