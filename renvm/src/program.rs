//! The executable program handed to the interpreter.
//!
//! A program is a table of functions, each an ordered list of [`Instruction`]s.
//! All reference ids, constant ids and jump targets are assigned ahead of time.

use crate::interpreter::operator::OperatorKey;
use crate::ty::CatchType;
use crate::value::RefList;
use anyhow::{Result, bail};
use std::fmt;
use std::ops::Range;

/// Index of a reference slot.
pub type RefId = usize;
/// Index of a memoized constant.
pub type ConstId = usize;
/// Index of a function in the program table.
pub type FunctionId = usize;

/// One catch clause of a try construct.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub ty: CatchType,
    /// First instruction of the handler.
    pub handler: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Reference-producing instructions.
    SetInteger { target: RefId, value: i64 },
    SetFloat { target: RefId, value: f64 },
    SetChar { target: RefId, value: char },
    SetBool { target: RefId, value: bool },
    SetString { target: RefId, value: String },
    SetArray { target: RefId, elements: RefList },
    SetTuple { target: RefId, elements: RefList },
    SetStruct {
        target: RefId,
        fields: Vec<(String, RefId)>,
    },
    SetFunction { target: RefId, function: FunctionId },
    Copy { target: RefId, source: RefId },
    LoadParam { target: RefId, index: usize },
    GetField {
        target: RefId,
        source: RefId,
        field: String,
    },
    GetElement {
        target: RefId,
        source: RefId,
        index: usize,
    },
    GetIndex {
        target: RefId,
        source: RefId,
        index: RefId,
    },
    SetField {
        source: RefId,
        field: String,
        value: RefId,
    },
    SetIndex {
        source: RefId,
        index: RefId,
        value: RefId,
    },
    PartialApply {
        target: RefId,
        function: RefId,
        args: RefList,
    },
    Call {
        target: RefId,
        function: RefId,
        args: RefList,
    },
    BinaryOp {
        target: RefId,
        left: RefId,
        op: OperatorKey,
        right: RefId,
    },
    UnaryOp {
        target: RefId,
        op: OperatorKey,
        operand: RefId,
    },
    LoadConstant { target: RefId, constant: ConstId },
    ReadError { target: RefId },

    // Scope instructions.
    Bind { name: String, reference: RefId },
    Resolve { target: RefId, name: String },
    PushScope,
    PushLoop { start: usize, end: usize },
    PushTry {
        catches: Vec<CatchClause>,
        finally: Option<Range<usize>>,
    },
    PopFrame,

    // Control transfer.
    Jump { target: usize },
    BranchTrue { condition: RefId, target: usize },
    BranchFalse { condition: RefId, target: usize },
    ConstBranch { constant: ConstId, target: usize },

    // Miscellaneous.
    Nop,
    Return { value: RefId },
    Throw { value: RefId },
    Break { depth: usize },
    Continue { depth: usize },
    SetConstant { constant: ConstId, value: RefId },
}

impl Instruction {
    /// Reference ids mentioned by this instruction.
    pub fn references(&self) -> Vec<RefId> {
        use Instruction::*;
        match self {
            SetInteger { target, .. }
            | SetFloat { target, .. }
            | SetChar { target, .. }
            | SetBool { target, .. }
            | SetString { target, .. }
            | SetFunction { target, .. }
            | LoadParam { target, .. }
            | LoadConstant { target, .. }
            | ReadError { target }
            | Resolve { target, .. } => vec![*target],
            SetArray { target, elements } | SetTuple { target, elements } => {
                std::iter::once(*target).chain(elements.iter().copied()).collect()
            }
            SetStruct { target, fields } => std::iter::once(*target)
                .chain(fields.iter().map(|(_, id)| *id))
                .collect(),
            Copy { target, source }
            | GetField { target, source, .. }
            | GetElement { target, source, .. } => vec![*target, *source],
            GetIndex {
                target,
                source,
                index,
            } => vec![*target, *source, *index],
            SetField { source, value, .. } => vec![*source, *value],
            SetIndex {
                source,
                index,
                value,
            } => vec![*source, *index, *value],
            PartialApply {
                target,
                function,
                args,
            }
            | Call {
                target,
                function,
                args,
            } => {
                [*target, *function].into_iter().chain(args.iter().copied()).collect()
            }
            BinaryOp {
                target,
                left,
                right,
                ..
            } => vec![*target, *left, *right],
            UnaryOp {
                target,
                operand,
                ..
            } => vec![*target, *operand],
            Bind { reference, .. } => vec![*reference],
            BranchTrue { condition, .. } | BranchFalse { condition, .. } => vec![*condition],
            Return { value } | Throw { value } | SetConstant { value, .. } => vec![*value],
            PushScope
            | PushLoop { .. }
            | PushTry { .. }
            | PopFrame
            | Jump { .. }
            | ConstBranch { .. }
            | Nop
            | Break { .. }
            | Continue { .. } => vec![],
        }
    }
}

/// A compiled function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Number of positional parameters.
    pub params: usize,
    pub instructions: Vec<Instruction>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: usize, instructions: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            params,
            instructions,
        }
    }
}

/// The function table. Function 0 is the entry point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn new(functions: Vec<Function>) -> Self {
        Self { functions }
    }

    pub fn function(&self, id: FunctionId) -> Result<&Function> {
        match self.functions.get(id) {
            Some(function) => Ok(function),
            None => bail!("Function @{} does not exist", id),
        }
    }

    /// The function every run starts in.
    pub fn entry(&self) -> Result<&Function> {
        self.function(0)
    }

    /// One past the highest reference id used by any instruction.
    pub fn reference_count(&self) -> usize {
        self.functions
            .iter()
            .flat_map(|f| f.instructions.iter())
            .flat_map(|i| i.references())
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Checks that every target, handler and finally range stays inside its
    /// function and that every function id refers to an existing function.
    pub fn validate(&self) -> Result<()> {
        if self.functions.is_empty() {
            bail!("Program has no entry function");
        }
        for (id, function) in self.functions.iter().enumerate() {
            let len = function.instructions.len();
            let check = |pc: usize, target: usize, what: &str| -> Result<()> {
                if target > len {
                    bail!(
                        "{} target {} at {}@{}:{} is outside the function ({} instructions)",
                        what,
                        target,
                        function.name,
                        id,
                        pc,
                        len
                    );
                }
                Ok(())
            };
            for (pc, instruction) in function.instructions.iter().enumerate() {
                match instruction {
                    Instruction::Jump { target }
                    | Instruction::BranchTrue { target, .. }
                    | Instruction::BranchFalse { target, .. }
                    | Instruction::ConstBranch { target, .. } => check(pc, *target, "Jump")?,
                    Instruction::PushLoop { start, end } => {
                        check(pc, *start, "Loop start")?;
                        check(pc, *end, "Loop end")?;
                    }
                    Instruction::PushTry { catches, finally } => {
                        for clause in catches {
                            check(pc, clause.handler, "Handler")?;
                        }
                        if let Some(range) = finally {
                            check(pc, range.end, "Finally end")?;
                            if range.start > range.end {
                                bail!(
                                    "Finally range {:?} at {}@{}:{} is empty or reversed",
                                    range,
                                    function.name,
                                    id,
                                    pc
                                );
                            }
                        }
                    }
                    Instruction::SetFunction {
                        function: callee,
                        ..
                    } => {
                        if *callee >= self.functions.len() {
                            bail!(
                                "Function @{} referenced at {}@{}:{} does not exist",
                                callee,
                                function.name,
                                id,
                                pc
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, function) in self.functions.iter().enumerate() {
            writeln!(f, "fn {} {}  # @{}", function.name, function.params, id)?;
            for (pc, instruction) in function.instructions.iter().enumerate() {
                writeln!(f, "  {pc:>4}: {instruction:?}")?;
            }
            writeln!(f, "end")?;
        }
        Ok(())
    }
}
