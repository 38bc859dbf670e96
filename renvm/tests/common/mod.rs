//! Common test utilities and macros

use renvm::assembler::assemble_file;
use renvm::interpreter::operator::OperatorRegistry;
use renvm::interpreter::{Interpreter, Outcome};
use std::path::Path;

#[derive(Debug)]
pub enum TestResult {
    /// The entry function returned without a value.
    Success,
    /// The entry function returned this value, rendered deeply.
    SuccessWithValue(String),
    /// An error escaped the entry function; holds the rendered error value.
    Uncaught(String),
    /// Assembly failed or the engine faulted.
    Error(String),
    ErrorRegex(String),
}

impl PartialEq for TestResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TestResult::Success, TestResult::Success) => true,
            (TestResult::SuccessWithValue(a), TestResult::SuccessWithValue(b)) => a == b,
            (TestResult::Uncaught(a), TestResult::Uncaught(b)) => a == b,
            (TestResult::Error(a), TestResult::Error(b)) => a == b,
            (TestResult::ErrorRegex(pattern), TestResult::Error(msg)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            (TestResult::Error(msg), TestResult::ErrorRegex(pattern)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            _ => false,
        }
    }
}

pub fn run_interpreter_test(input_file: &Path, args: &[&str]) -> TestResult {
    let program = match assemble_file(input_file) {
        Ok(program) => program,
        Err(e) => return TestResult::Error(format!("{e:#}")),
    };
    let operators = OperatorRegistry::standard();
    let mut interpreter = match Interpreter::new(&program, &operators) {
        Ok(interpreter) => interpreter,
        Err(e) => return TestResult::Error(format!("{e:#}")),
    };
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();

    match interpreter.run(&args) {
        Ok(outcome) => {
            assert_eq!(interpreter.stack_depth(), 0, "frames left after the run");
            match outcome {
                Outcome::Returned(None) => TestResult::Success,
                Outcome::Returned(Some(value)) => {
                    TestResult::SuccessWithValue(value.render(interpreter.references()).to_string())
                }
                Outcome::Threw(error) => {
                    TestResult::Uncaught(error.render(interpreter.references()).to_string())
                }
            }
        }
        Err(e) => TestResult::Error(format!("{e:#}")),
    }
}

#[macro_export]
macro_rules! check_interpreter {
    ($test_name:ident, input=$input_file:expr, result=$expected:expr) => {
        check_interpreter!($test_name, input = $input_file, args = [], result = $expected);
    };
    (
        $test_name:ident,
        input=$input_file:expr,
        args=[$($arg:expr),* $(,)?],
        result=$expected:expr
    ) => {
        #[test]
        fn $test_name() {
            let input_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("tests")
                .join("inputs")
                .join($input_file);

            let result = crate::common::run_interpreter_test(&input_path, &[$($arg),*]);
            assert_eq!(result, $expected);
        }
    };
}
