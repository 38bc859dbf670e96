//! Structured exception handling.
//!
//! A throw records the error value and switches the interpreter into error
//! context. While in error context no instruction runs; instead frames are
//! popped one at a time. A popped try frame first runs its finally block and
//! then tests its catch clauses in order against the pending error. On a match
//! the frame is pushed back without handlers, so the handler body still owns a
//! frame that its closing `PopFrame` removes, and execution resumes at the
//! handler. Popping a function frame returns to its caller and keeps unwinding
//! there. If the stack empties, the error is unhandled.
//!
//! A finally block runs as a nested region: error context is suspended, the
//! block executes until it reaches the end of its range, and the error context
//! is restored. The pending error stays readable inside the block. Errors the
//! block throws and catches itself overwrite it only until the block completes.
//! Unwinding inside the region never goes below the stack depth the region
//! started at. An error that reaches that depth ends the region and replaces
//! the error that was pending before it.

use crate::memory::{Frame, FrameKind, TryHandlers};
use crate::ty::MatchesValue;
use crate::value::Value;
use anyhow::{Result, anyhow, bail};
use std::ops::Range;
use tracing::debug;

/// Result of unwinding the stack for a pending error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Unwind {
    /// A handler matched; execution continues at it.
    Caught,
    /// The error reached the floor of the stack.
    Escaped,
}

/// How a finally block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RegionExit {
    Completed,
    /// The block threw an error it did not catch itself.
    Threw,
}

impl RegionExit {
    pub(super) fn threw(self) -> bool {
        self == RegionExit::Threw
    }
}

impl super::function::Interpreter<'_> {
    /// Records `value` as the pending error and enters error context.
    pub(super) fn throw(&mut self, value: Value) {
        debug!("Throwing {}", value.render(&self.references));
        self.error = Some(value);
        self.error_context = true;
    }

    /// Pops frames until a catch clause accepts the pending error or the stack
    /// depth reaches `floor`.
    pub(super) fn unwind_error(&mut self, floor: usize) -> Result<Unwind> {
        while self.stack.len() > floor {
            let frame = self
                .stack
                .pop()
                .ok_or_else(|| anyhow!("Unwinding an empty call stack"))?;
            match frame.kind {
                FrameKind::Try(handlers) => {
                    if let Some(range) = handlers.finally {
                        if self.run_finally(range)?.threw() {
                            // The replacement error skips this frame's catches.
                            continue;
                        }
                    }
                    let error = self
                        .error
                        .as_ref()
                        .ok_or_else(|| anyhow!("Error context without a pending error"))?;
                    if let Some(clause) = handlers.catches.iter().find(|c| c.ty.matches(error)) {
                        debug!(
                            "Caught {} by `{}` handler at {}",
                            error, clause.ty, clause.handler
                        );
                        self.pc = clause.handler;
                        self.error_context = false;
                        self.stack.push(Frame {
                            scope: frame.scope,
                            kind: FrameKind::Try(TryHandlers::default()),
                        });
                        return Ok(Unwind::Caught);
                    }
                }
                FrameKind::Function(call) => {
                    if let Some(caller) = call.caller {
                        self.current_fn = caller.function;
                        self.current_frame = caller.frame;
                        self.pc = caller.pc;
                    }
                }
                FrameKind::Scope | FrameKind::Loop { .. } => {}
            }
        }
        Ok(Unwind::Escaped)
    }

    /// Runs the finally block `range` of the current function as a nested
    /// region, then restores the program counter and the pending error.
    pub(super) fn run_finally(&mut self, range: Range<usize>) -> Result<RegionExit> {
        let floor = self.stack.len();
        let (function, frame, resume) = (self.current_fn, self.current_frame, self.pc);
        let pending = self.error.clone();
        let was_unwinding = std::mem::replace(&mut self.error_context, false);
        debug!("Running finally block {:?} at depth {}", range, floor);

        self.pc = range.start;
        loop {
            if self.error_context {
                if self.unwind_error(floor)? == Unwind::Escaped {
                    debug!("Finally block {:?} threw", range);
                    self.current_fn = function;
                    self.current_frame = frame;
                    self.pc = resume;
                    return Ok(RegionExit::Threw);
                }
                continue;
            }
            if self.current_frame == frame && self.pc >= range.end {
                break;
            }
            if self.stack.len() < floor {
                bail!("Finally block {:?} unwound its enclosing frames", range);
            }
            self.execute_next(floor)?;
        }

        if self.stack.len() != floor {
            bail!(
                "Finally block {:?} left {} frames on the stack",
                range,
                self.stack.len() - floor
            );
        }
        self.pc = resume;
        self.error = pending;
        self.error_context = was_unwinding;
        Ok(RegionExit::Completed)
    }
}
