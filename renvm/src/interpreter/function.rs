//! Instruction dispatch and the call/return protocol.
use super::operator::OperatorRegistry;
use crate::error::RuntimeError;
use crate::memory::{
    CallFrame, CallStack, ConstantStore, Continuation, Frame, FrameKind, ReferenceStore,
};
use crate::program::{FunctionId, Instruction, Program, RefId};
use crate::value::{RefList, Value};
use anyhow::{Result, anyhow, bail};
use smallvec::{SmallVec, smallvec};
use tracing::{debug, info, trace};

/// The function every run starts in.
pub const ENTRY_FUNCTION: FunctionId = 0;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The entry function returned, possibly without a value.
    Returned(Option<Value>),
    /// An error was thrown and no handler caught it.
    Threw(Value),
}

/// What the dispatch loop does with the program counter after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    /// Advance to the next instruction.
    Next,
    /// Continue at the given instruction of the current function.
    Goto(usize),
    /// The instruction already positioned the program counter.
    Resume,
}

/// Interpreter for one program run.
///
/// Owns all mutable state of the run. The program and the operator registry are
/// shared and read-only.
#[derive(Debug)]
pub struct Interpreter<'p> {
    pub(super) program: &'p Program,
    pub(super) operators: &'p OperatorRegistry,
    pub(super) references: ReferenceStore,
    pub(super) constants: ConstantStore,
    pub(super) stack: CallStack,
    /// Function currently executing.
    pub(super) current_fn: FunctionId,
    /// Stack index of the current function's frame.
    pub(super) current_frame: usize,
    pub(super) pc: usize,
    pub(super) return_value: Option<Value>,
    /// Pending error; stays readable inside a handler.
    pub(super) error: Option<Value>,
    /// Set by a throw until a handler is found.
    pub(super) error_context: bool,
}

impl<'p> Interpreter<'p> {
    /// Creates an interpreter for `program`, validating it first.
    pub fn new(program: &'p Program, operators: &'p OperatorRegistry) -> Result<Self> {
        program.validate()?;
        Ok(Self {
            program,
            operators,
            references: ReferenceStore::new(program.reference_count()),
            constants: ConstantStore::new(),
            stack: CallStack::new(),
            current_fn: ENTRY_FUNCTION,
            current_frame: 0,
            pc: 0,
            return_value: None,
            error: None,
            error_context: false,
        })
    }

    /// Runs the program to completion.
    ///
    /// # Returns
    /// * `Ok(Outcome)` - The entry function returned or an error went unhandled
    /// * `Err(anyhow::Error)` - The instruction stream violated an engine invariant
    pub fn run(&mut self, args: &[String]) -> Result<Outcome> {
        self.start(args)?;
        while self.step()? {}
        let outcome = self.outcome()?;
        info!("Program finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Pushes the entry frame. The entry function receives one array of strings.
    pub fn start(&mut self, args: &[String]) -> Result<()> {
        if !self.stack.is_empty() {
            bail!("Interpreter is already running");
        }
        let entry = self.program.entry()?;
        info!("Starting interpretation of {}", entry.name);

        let elements: RefList = args
            .iter()
            .map(|arg| self.references.allocate(Value::String(arg.clone())))
            .collect();
        let frame = Frame::new(FrameKind::Function(CallFrame {
            function: ENTRY_FUNCTION,
            args: smallvec![Value::Array(elements)],
            return_target: None,
            caller: None,
        }));
        self.current_frame = self.stack.push(frame);
        self.current_fn = ENTRY_FUNCTION;
        self.pc = 0;
        self.return_value = None;
        self.error = None;
        self.error_context = false;
        Ok(())
    }

    /// Executes one instruction, or one round of error unwinding when an error is
    /// pending. Returns whether the program is still running.
    pub fn step(&mut self) -> Result<bool> {
        if self.stack.is_empty() {
            return Ok(false);
        }
        if self.error_context {
            self.unwind_error(0)?;
        } else {
            self.execute_next(0)?;
        }
        Ok(!self.stack.is_empty())
    }

    /// The result of a finished run.
    pub fn outcome(&self) -> Result<Outcome> {
        if !self.stack.is_empty() {
            bail!("Program is still running");
        }
        if self.error_context {
            let error = self
                .error
                .clone()
                .ok_or_else(|| anyhow!("Error context without a pending error"))?;
            Ok(Outcome::Threw(error))
        } else {
            Ok(Outcome::Returned(self.return_value.clone()))
        }
    }

    pub fn references(&self) -> &ReferenceStore {
        &self.references
    }

    pub fn constants(&self) -> &ConstantStore {
        &self.constants
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_function(&self) -> FunctionId {
        self.current_fn
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn pending_error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    /// Fetches and executes the instruction at the program counter.
    ///
    /// `floor` is the stack depth that control transfers may not unwind below; it
    /// is non-zero while a finally block runs.
    pub(super) fn execute_next(&mut self, floor: usize) -> Result<()> {
        let program = self.program;
        let (function_id, pc) = (self.current_fn, self.pc);
        let function = program.function(function_id)?;

        let Some(instruction) = function.instructions.get(pc) else {
            trace!("Falling off the end of {}", function.name);
            self.return_value = None;
            let flow = self.return_from_function(floor)?;
            return self.advance(flow);
        };
        trace!("Executing {}:{} {:?}", function.name, pc, instruction);

        let flow = match self.execute(instruction, floor) {
            Ok(flow) => flow,
            Err(err) => match err.downcast::<RuntimeError>() {
                Ok(raised) => {
                    debug!("Raised at {}:{}: {}", function.name, pc, raised.message);
                    self.throw(Value::String(raised.message));
                    Flow::Resume
                }
                Err(fault) => {
                    return Err(fault.context(format!(
                        "Engine fault in {} (@{}) at instruction {}",
                        function.name, function_id, pc
                    )));
                }
            },
        };
        self.advance(flow)
    }

    fn advance(&mut self, flow: Flow) -> Result<()> {
        match flow {
            Flow::Next => self.pc += 1,
            Flow::Goto(target) => self.pc = target,
            Flow::Resume => {}
        }
        Ok(())
    }

    fn execute(&mut self, instruction: &'p Instruction, floor: usize) -> Result<Flow> {
        use Instruction::*;
        match instruction {
            Call {
                target,
                function,
                args,
            } => self.call(*target, *function, args),
            Return { value } => {
                self.return_value = Some(self.references.load(*value)?);
                self.return_from_function(floor)
            }
            Throw { value } => {
                let value = self.references.load(*value)?;
                self.throw(value);
                Ok(Flow::Resume)
            }
            Bind { name, reference } => {
                self.stack.bind(name, *reference)?;
                Ok(Flow::Next)
            }
            PushScope | PushLoop { .. } | PushTry { .. } | PopFrame => {
                self.execute_scope(instruction, floor)
            }
            Jump { .. }
            | BranchTrue { .. }
            | BranchFalse { .. }
            | ConstBranch { .. }
            | Break { .. }
            | Continue { .. } => self.execute_control(instruction, floor),
            Nop => Ok(Flow::Next),
            _ => {
                self.execute_rvalue(instruction)?;
                Ok(Flow::Next)
            }
        }
    }

    /// Calls the function value held by `function` with the values of `args`.
    ///
    /// Captured arguments of a partially applied function come first. The return
    /// value is later written to `target`.
    fn call(&mut self, target: RefId, function: RefId, args: &[RefId]) -> Result<Flow> {
        let value = self.references.read(function)?;
        let Some(callee) = value.as_function().cloned() else {
            bail!(
                "Reference #{} holds {} `{}`, expected a function",
                function,
                value.kind(),
                value
            );
        };
        let definition = self.program.function(callee.function)?;

        let mut values: SmallVec<[Value; 4]> = SmallVec::new();
        for id in callee.captured.iter().chain(args.iter()) {
            values.push(self.references.load(*id)?);
        }
        if values.len() != definition.params {
            bail!(
                "Function '{}' takes {} arguments, but {} were supplied",
                definition.name,
                definition.params,
                values.len()
            );
        }

        let frame = Frame::new(FrameKind::Function(CallFrame {
            function: callee.function,
            args: values,
            return_target: Some(target),
            caller: Some(Continuation {
                function: self.current_fn,
                frame: self.current_frame,
                pc: self.pc,
            }),
        }));
        self.current_frame = self.stack.push(frame);
        self.current_fn = callee.function;
        self.pc = 0;
        debug!(
            "Calling {} (@{}) at depth {}",
            definition.name,
            callee.function,
            self.current_frame
        );
        Ok(Flow::Resume)
    }

    /// Leaves the current function with whatever is in the return-value slot.
    ///
    /// Pops every frame down to and including the current function frame,
    /// running finally blocks on the way, then resumes the caller right after its
    /// call instruction. If a finally block throws, the return is abandoned and
    /// the new error is left pending.
    pub(super) fn return_from_function(&mut self, floor: usize) -> Result<Flow> {
        let Some(call) = self.unwind_to_function(floor)? else {
            self.return_value = None;
            return Ok(Flow::Resume);
        };

        let Some(caller) = call.caller else {
            debug!("Entry function returned: {:?}", self.return_value);
            return Ok(Flow::Resume);
        };
        self.current_fn = caller.function;
        self.current_frame = caller.frame;
        self.pc = caller.pc;
        if let (Some(target), Some(value)) = (call.return_target, &self.return_value) {
            self.references.write(target, value.clone());
        }
        debug!(
            "Returned from @{} to @{} at {}",
            call.function, caller.function, caller.pc
        );
        Ok(Flow::Next)
    }

    /// Pops frames through the nearest function frame and returns it.
    ///
    /// Returns `None` if a finally block threw while unwinding.
    fn unwind_to_function(&mut self, floor: usize) -> Result<Option<CallFrame>> {
        let saved = self.return_value.take();
        loop {
            if self.stack.len() <= floor {
                bail!("Return would leave a finally block");
            }
            let frame = self
                .stack
                .pop()
                .ok_or_else(|| anyhow!("Return with an empty call stack"))?;
            match frame.kind {
                FrameKind::Function(call) => {
                    self.return_value = saved;
                    return Ok(Some(call));
                }
                FrameKind::Try(handlers) => {
                    if let Some(range) = handlers.finally {
                        if self.run_finally(range)?.threw() {
                            return Ok(None);
                        }
                    }
                }
                FrameKind::Scope | FrameKind::Loop { .. } => {}
            }
        }
    }

    /// Value of parameter `index` of the current function.
    pub(super) fn param(&self, index: usize) -> Result<Value> {
        let call = self.stack.call_frame(self.current_frame)?;
        call.args.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "Parameter {} out of range for function @{} with {} arguments",
                index,
                call.function,
                call.args.len()
            )
        })
    }
}
