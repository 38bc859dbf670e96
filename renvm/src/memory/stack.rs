//! Call stack of the interpreter.
//!
//! Every frame carries a [`Scope`] of name bindings plus a [`FrameKind`] that says
//! what introduced it: a block, a function call, a loop or a try construct.
//! Try frames sit on the stack like any other frame but are never a name scope.
//!
//! Invariants maintained by the interpreter:
//! - the bottom frame of an active run is the entry function's frame;
//! - loop and try frames are popped before the function frame that contains them.

use crate::program::{CatchClause, FunctionId, RefId};
use crate::value::Value;
use anyhow::{Result, anyhow};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::Range;

/// Name bindings introduced in one frame.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    bindings: HashMap<String, RefId>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<RefId> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    fn insert(&mut self, name: &str, reference: RefId) {
        self.bindings.insert(name.to_string(), reference);
    }
}

/// Where execution resumes once a function frame is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub function: FunctionId,
    /// Stack index of the caller's function frame.
    pub frame: usize,
    /// Program counter of the call instruction in the caller.
    pub pc: usize,
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: FunctionId,
    /// Bound argument values; parameter `i` is `args[i]`.
    pub args: SmallVec<[Value; 4]>,
    /// Reference that receives the return value, if any.
    pub return_target: Option<RefId>,
    /// `None` for the entry function.
    pub caller: Option<Continuation>,
}

#[derive(Debug, Clone, Default)]
pub struct TryHandlers {
    pub catches: Vec<CatchClause>,
    pub finally: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub enum FrameKind {
    /// Plain block scope.
    Scope,
    Function(CallFrame),
    Loop {
        start: usize,
        end: usize,
    },
    Try(TryHandlers),
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub scope: Scope,
    pub kind: FrameKind,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            scope: Scope::default(),
            kind,
        }
    }

    pub fn is_try(&self) -> bool {
        matches!(self.kind, FrameKind::Try(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, FrameKind::Function(_))
    }
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The function frame stored at `index`.
    pub fn call_frame(&self, index: usize) -> Result<&CallFrame> {
        match self.frames.get(index).map(|frame| &frame.kind) {
            Some(FrameKind::Function(call)) => Ok(call),
            _ => Err(anyhow!("Frame {} is not a function frame", index)),
        }
    }

    /// Binds `name` to `reference`.
    ///
    /// The frame is found by scanning from the top of the stack, skipping try
    /// frames. A frame that already binds `name` wins, so re-assigning a name
    /// updates its original owner even if scopes were pushed since. Otherwise the
    /// innermost non-try frame receives the new binding.
    pub fn bind(&mut self, name: &str, reference: RefId) -> Result<()> {
        let mut innermost = None;
        let mut owner = None;
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if frame.is_try() {
                continue;
            }
            innermost.get_or_insert(index);
            if frame.scope.contains(name) {
                owner = Some(index);
                break;
            }
        }
        let index = owner
            .or(innermost)
            .ok_or_else(|| anyhow!("No scope available to bind `{}`", name))?;
        self.frames[index].scope.insert(name, reference);
        Ok(())
    }

    /// Finds the reference bound to `name` in the nearest scope that binds it.
    pub fn resolve(&self, name: &str) -> Option<RefId> {
        self.frames
            .iter()
            .rev()
            .filter(|frame| !frame.is_try())
            .find_map(|frame| frame.scope.get(name))
    }
}
