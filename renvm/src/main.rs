//! renvm Interpreter
//!
//! Command line entry point: assembles a program file and runs it.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Run a compiled Ren program.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Program in the text assembly format
    program: PathBuf,

    /// Print the value returned by the entry function
    #[arg(long)]
    print_result: bool,

    /// Arguments passed to the entry function
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let log_level = std::env::var("RENVM_LOG").unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("Interpreting program: {}", args.program.display());

    match renvm::run_main(&args.program, &args.args, args.print_result) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            error!("Interpretation failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
