//! Frame-structuring and control-transfer instructions.
use super::function::Flow;
use crate::memory::{Frame, FrameKind, TryHandlers};
use crate::program::Instruction;
use anyhow::{Result, anyhow, bail};
use tracing::debug;

impl super::function::Interpreter<'_> {
    pub(super) fn execute_scope(
        &mut self,
        instruction: &Instruction,
        floor: usize,
    ) -> Result<Flow> {
        match instruction {
            Instruction::PushScope => {
                self.stack.push(Frame::new(FrameKind::Scope));
            }
            Instruction::PushLoop { start, end } => {
                self.stack.push(Frame::new(FrameKind::Loop {
                    start: *start,
                    end: *end,
                }));
            }
            Instruction::PushTry { catches, finally } => {
                self.stack.push(Frame::new(FrameKind::Try(TryHandlers {
                    catches: catches.clone(),
                    finally: finally.clone(),
                })));
            }
            Instruction::PopFrame => return self.pop_frame(floor),
            _ => bail!("Unsupported scope instruction: {:?}", instruction),
        }
        Ok(Flow::Next)
    }

    pub(super) fn execute_control(
        &mut self,
        instruction: &Instruction,
        floor: usize,
    ) -> Result<Flow> {
        match instruction {
            Instruction::Jump { target } => Ok(Flow::Goto(*target)),
            Instruction::BranchTrue { condition, target } => {
                if self.condition(*condition)? {
                    Ok(Flow::Goto(*target))
                } else {
                    Ok(Flow::Next)
                }
            }
            Instruction::BranchFalse { condition, target } => {
                if self.condition(*condition)? {
                    Ok(Flow::Next)
                } else {
                    Ok(Flow::Goto(*target))
                }
            }
            Instruction::ConstBranch { constant, target } => {
                if self.constants.contains(*constant) {
                    Ok(Flow::Goto(*target))
                } else {
                    Ok(Flow::Next)
                }
            }
            Instruction::Break { depth } => self.exit_loop(*depth, floor, false),
            Instruction::Continue { depth } => self.exit_loop(*depth, floor, true),
            _ => bail!("Unsupported control instruction: {:?}", instruction),
        }
    }

    fn condition(&self, reference: usize) -> Result<bool> {
        let value = self.references.read(reference)?;
        value.as_bool().ok_or_else(|| {
            anyhow!(
                "Branch condition #{} holds {} `{}`, expected a bool",
                reference,
                value.kind(),
                value
            )
        })
    }

    /// Pops the top frame, running its finally block if it is a try frame.
    fn pop_frame(&mut self, floor: usize) -> Result<Flow> {
        if self.stack.len() <= floor.max(self.current_frame + 1) {
            bail!("PopFrame would remove the function frame or leave a finally block");
        }
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| anyhow!("PopFrame on an empty call stack"))?;
        if let FrameKind::Try(TryHandlers {
            finally: Some(range),
            ..
        }) = frame.kind
        {
            if self.run_finally(range)?.threw() {
                return Ok(Flow::Resume);
            }
        }
        Ok(Flow::Next)
    }

    /// Leaves the loop `depth` levels out from the innermost one.
    ///
    /// Every frame above that loop is popped along with the loop frame itself.
    /// Finally blocks of popped try frames run on the way. A break resumes after
    /// the loop; a continue resumes at the loop's `PushLoop`, which pushes a fresh
    /// frame for the next iteration.
    fn exit_loop(&mut self, depth: usize, floor: usize, repeat: bool) -> Result<Flow> {
        let what = if repeat { "Continue" } else { "Break" };
        let mut remaining = depth;
        loop {
            if self.stack.len() <= floor {
                bail!("{} would leave a finally block", what);
            }
            if self.stack.top().is_none_or(Frame::is_function) {
                bail!("{} {} has no enclosing loop", what, depth);
            }
            let frame = self
                .stack
                .pop()
                .ok_or_else(|| anyhow!("{} on an empty call stack", what))?;
            match frame.kind {
                FrameKind::Loop { start, end } => {
                    if remaining == 0 {
                        let target = if repeat { start } else { end };
                        debug!("{} {} resumes at {}", what, depth, target);
                        return Ok(Flow::Goto(target));
                    }
                    remaining -= 1;
                }
                FrameKind::Try(TryHandlers {
                    finally: Some(range),
                    ..
                }) => {
                    if self.run_finally(range)?.threw() {
                        return Ok(Flow::Resume);
                    }
                }
                _ => {}
            }
        }
    }
}
