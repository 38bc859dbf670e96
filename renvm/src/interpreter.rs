//! This module provides the core interpretation logic.
//!
//! It executes the instruction sequences of a [`Program`](crate::program::Program)
//! one instruction at a time, maintaining the call stack, the reference and
//! constant stores, and the error context used by structured exception handling.

mod control;
mod exception;
pub mod function;
pub mod operator;
mod rvalue;

pub use function::{Interpreter, Outcome};
