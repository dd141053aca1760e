//! Command-line driver for the Nomad scripting language.
//!
//! `nomad <sourcefile>` runs a file to completion; the sentinel
//! argument `nomad repl` enters an interactive loop instead.

mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nomad::{Diagnostic, Interpreter, Limits};

#[derive(Parser)]
#[command(name = "nomad", version, about = "Run Nomad source files")]
struct Args {
    /// Source file to execute, or `repl` to start the interactive loop.
    target: String,

    /// Operand-stack bound.
    #[arg(long, default_value_t = 16_384)]
    max_stack: usize,

    /// Call-stack depth bound.
    #[arg(long, default_value_t = 16_384)]
    max_call_depth: usize,

    /// Log level for internal tracing (off by default).
    #[arg(long)]
    log: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log.as_deref());

    let limits = Limits { max_stack: args.max_stack, max_call_depth: args.max_call_depth };

    if args.target == "repl" {
        repl::run(limits);
        return ExitCode::SUCCESS;
    }

    run_file(&PathBuf::from(&args.target), limits)
}

fn run_file(path: &PathBuf, limits: Limits) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("nomad: cannot read {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new();
    interp.limit(limits);

    match interp.capture(&source) {
        Ok(output) => {
            for line in output.output {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", Diagnostic::from_error(&err, source));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let Some(level) = level else { return };
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
