//! renvm Interpreter Library
//!
//! Executes compiled Ren programs: a table of functions made of flat instruction
//! sequences over numbered reference slots. The engine models values, scopes,
//! calls, loops, memoized constants and structured exceptions with `finally`.
//!
//! Programs are usually loaded from the text format understood by
//! [`assembler::assemble`].

pub mod assembler;
pub mod error;
pub mod interpreter;
pub mod memory;
pub mod program;
pub mod ty;
pub mod value;

use crate::interpreter::operator::OperatorRegistry;
use crate::interpreter::{Interpreter, Outcome};
use crate::program::Program;
use crate::value::Value;
use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, trace};

/// Runs `program` with the standard operators.
///
/// # Arguments
/// * `program` - The program to execute; function 0 is the entry point
/// * `args` - Strings passed to the entry function as one array
///
/// # Returns
/// * `Ok(Outcome)` - The entry function returned or threw
/// * `Err(anyhow::Error)` - The program is malformed or hit an engine fault
///
/// # Examples
/// ```
/// use renvm::interpreter::Outcome;
/// use renvm::value::Value;
///
/// let program = renvm::assembler::assemble("fn main 1\n int r0 7\n return r0\nend\n")?;
/// let outcome = renvm::run_program(&program, &[])?;
/// assert_eq!(outcome, Outcome::Returned(Some(Value::Integer(7))));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn run_program(program: &Program, args: &[String]) -> Result<Outcome> {
    let operators = OperatorRegistry::standard();
    Interpreter::new(program, &operators)?.run(args)
}

/// Assembles and runs program text.
pub fn run_source(source: &str, args: &[String]) -> Result<Outcome> {
    let program = assembler::assemble(source)?;
    run_program(&program, args)
}

/// Runs the program file at `path` and reports its outcome like a process.
///
/// An unhandled error is printed to stderr. The returned value is printed to
/// stdout when `print_result` is set or when it has no exit-code meaning.
pub fn run_main(path: &Path, args: &[String], print_result: bool) -> Result<ExitCode> {
    let program = assembler::assemble_file(path)?;
    trace!("Assembled {}:\n{}", path.display(), program);
    let operators = OperatorRegistry::standard();
    let mut interpreter = Interpreter::new(&program, &operators)?;
    let outcome = interpreter.run(args)?;

    let code = exit_code(&outcome);
    match &outcome {
        Outcome::Threw(error) => {
            eprintln!("uncaught error: {}", error.render(interpreter.references()));
        }
        Outcome::Returned(Some(value)) if print_result || !has_exit_meaning(value) => {
            println!("{}", value.render(interpreter.references()));
        }
        Outcome::Returned(_) => {}
    }
    info!("Program exited with code {}", code);
    Ok(ExitCode::from(code))
}

/// Process exit code for a finished run.
pub fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Threw(_) => 1,
        Outcome::Returned(Some(Value::Integer(n))) => (*n).clamp(0, 255) as u8,
        Outcome::Returned(Some(Value::Bool(false))) => 1,
        Outcome::Returned(_) => 0,
    }
}

fn has_exit_meaning(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::Bool(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let returned = |value| Outcome::Returned(Some(value));
        assert_eq!(exit_code(&returned(Value::Integer(3))), 3);
        assert_eq!(exit_code(&returned(Value::Integer(-4))), 0);
        assert_eq!(exit_code(&returned(Value::Integer(1000))), 255);
        assert_eq!(exit_code(&returned(Value::Bool(true))), 0);
        assert_eq!(exit_code(&returned(Value::Bool(false))), 1);
        assert_eq!(exit_code(&returned(Value::String("x".into()))), 0);
        assert_eq!(exit_code(&Outcome::Returned(None)), 0);
        assert_eq!(exit_code(&Outcome::Threw(Value::Integer(0))), 1);
    }

    #[test]
    fn test_run_source() {
        let source = "fn main 1\n  int r0 2\n  int r1 3\n  binop r2 r0 + r1\n  return r2\nend\n";
        let outcome = run_source(source, &[]).unwrap();
        assert_eq!(outcome, Outcome::Returned(Some(Value::Integer(5))));
        assert!(run_source("fn main 1\n  jump nowhere\nend\n", &[]).is_err());
    }
}
