//! Interpreter memory.
//!
//! All mutable state of a run lives here and is owned by a single
//! [`Interpreter`](crate::interpreter::Interpreter):
//! - [`ReferenceStore`]: flat reference slots addressed by compile-time ids.
//! - [`ConstantStore`]: memoized module-level constants.
//! - [`CallStack`]: scope, function, loop and try frames.

pub mod constants;
pub mod references;
pub mod stack;

pub use constants::ConstantStore;
pub use references::ReferenceStore;
pub use stack::{CallFrame, CallStack, Continuation, Frame, FrameKind, TryHandlers};
