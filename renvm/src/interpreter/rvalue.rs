use crate::error::raise;
use crate::program::{Instruction, RefId};
use crate::value::{FunctionValue, RefList, Value};
use anyhow::{Result, anyhow, bail};
use std::collections::BTreeMap;

impl super::function::Interpreter<'_> {
    /// Executes an instruction that only reads and writes reference slots.
    ///
    /// # Arguments
    /// * `instruction` - Any instruction that does not transfer control
    ///
    /// # Returns
    /// * `Ok(())` - The target slot was written
    /// * `Err(anyhow::Error)` - A [`RuntimeError`](crate::error::RuntimeError) to
    ///   be thrown into the program, or an engine fault
    pub(super) fn execute_rvalue(&mut self, instruction: &Instruction) -> Result<()> {
        use Instruction::*;
        match instruction {
            SetInteger { target, value } => self.references.write(*target, Value::Integer(*value)),
            SetFloat { target, value } => self.references.write(*target, Value::Float(*value)),
            SetChar { target, value } => self.references.write(*target, Value::Char(*value)),
            SetBool { target, value } => self.references.write(*target, Value::Bool(*value)),
            SetString { target, value } => {
                self.references.write(*target, Value::String(value.clone()))
            }
            SetArray { target, elements } => {
                self.references.write(*target, Value::Array(elements.clone()))
            }
            SetTuple { target, elements } => {
                self.references.write(*target, Value::Tuple(elements.clone()))
            }
            SetStruct { target, fields } => {
                let fields: BTreeMap<String, RefId> = fields.iter().cloned().collect();
                self.references.write(*target, Value::Struct(fields));
            }
            SetFunction { target, function } => {
                let value = Value::Function(FunctionValue::new(*function));
                self.references.write(*target, value);
            }
            Copy { target, source } => {
                let value = self.references.load(*source)?;
                self.references.write(*target, value);
            }
            LoadParam { target, index } => {
                let value = self.param(*index)?;
                self.references.write(*target, value);
            }
            GetField {
                target,
                source,
                field,
            } => {
                let component = self.field_ref(*source, field)?;
                let value = self.references.load(component)?;
                self.references.write(*target, value);
            }
            GetElement {
                target,
                source,
                index,
            } => {
                let component = match self.references.read(*source)? {
                    Value::Tuple(elements) | Value::Array(elements) => {
                        elements.get(*index).copied().ok_or_else(|| {
                            anyhow!(
                                "Element {} out of range for #{} with {} elements",
                                index,
                                source,
                                elements.len()
                            )
                        })?
                    }
                    other => bail!("Element access on {} value `{}`", other.kind(), other),
                };
                let value = self.references.load(component)?;
                self.references.write(*target, value);
            }
            GetIndex {
                target,
                source,
                index,
            } => {
                let component = self.element_ref(*source, *index)?;
                let value = self.references.load(component)?;
                self.references.write(*target, value);
            }
            SetField {
                source,
                field,
                value,
            } => {
                let component = self.field_ref(*source, field)?;
                let value = self.references.load(*value)?;
                self.references.write(component, value);
            }
            SetIndex {
                source,
                index,
                value,
            } => {
                let component = self.element_ref(*source, *index)?;
                let value = self.references.load(*value)?;
                self.references.write(component, value);
            }
            PartialApply {
                target,
                function,
                args,
            } => {
                let callee = self.references.read(*function)?;
                let Some(applied) = callee.as_function().map(|f| f.apply(args)) else {
                    bail!("Partial application of {} value `{}`", callee.kind(), callee);
                };
                self.references.write(*target, Value::Function(applied));
            }
            BinaryOp {
                target,
                left,
                op,
                right,
            } => {
                let operator = self.operators.lookup(*op)?;
                let value = operator.execute(&mut self.references, &[*left, *right])?;
                self.references.write(*target, value);
            }
            UnaryOp {
                target,
                op,
                operand,
            } => {
                let operator = self.operators.lookup(*op)?;
                let value = operator.execute(&mut self.references, &[*operand])?;
                self.references.write(*target, value);
            }
            LoadConstant { target, constant } => {
                let value = self.constants.read(*constant)?.clone();
                self.references.write(*target, value);
            }
            SetConstant { constant, value } => {
                let value = self.references.load(*value)?;
                self.constants.set(*constant, value)?;
            }
            ReadError { target } => {
                let error = self
                    .error
                    .clone()
                    .ok_or_else(|| anyhow!("ReadError with no error recorded"))?;
                self.references.write(*target, error);
            }
            Resolve { target, name } => {
                let reference = self
                    .stack
                    .resolve(name)
                    .ok_or_else(|| anyhow!("Unbound name `{}`", name))?;
                let value = self.references.load(reference)?;
                self.references.write(*target, value);
            }
            _ => bail!("Unsupported instruction: {:?}", instruction),
        }
        Ok(())
    }

    /// Reference held by field `field` of the struct in `source`.
    fn field_ref(&self, source: RefId, field: &str) -> Result<RefId> {
        match self.references.read(source)? {
            Value::Struct(fields) => fields
                .get(field)
                .copied()
                .ok_or_else(|| anyhow!("Struct #{} has no field `{}`", source, field)),
            other => bail!("Field access `.{}` on {} value `{}`", field, other.kind(), other),
        }
    }

    /// Reference held by the array element selected by the integer in `index`.
    ///
    /// An index outside the array is raised into the program.
    fn element_ref(&self, source: RefId, index: RefId) -> Result<RefId> {
        let elements: &RefList = match self.references.read(source)? {
            Value::Array(elements) => elements,
            other => bail!("Indexing into {} value `{}`", other.kind(), other),
        };
        let value = self.references.read(index)?;
        let Some(position) = value.as_integer() else {
            bail!("Array index must be an integer, found {} `{}`", value.kind(), value);
        };
        match usize::try_from(position).ok().and_then(|i| elements.get(i)) {
            Some(component) => Ok(*component),
            None => raise(format!(
                "index {} out of bounds for array of length {}",
                position,
                elements.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::operator::{OperatorKey, OperatorRegistry, Symbol};
    use crate::interpreter::{Interpreter, Outcome};
    use crate::program::{Function, Instruction, Program};
    use crate::value::Value;
    use smallvec::smallvec;

    fn run(instructions: Vec<Instruction>) -> (Outcome, Vec<Option<Value>>) {
        let program = Program::new(vec![Function::new("main", 1, instructions)]);
        let registry = OperatorRegistry::standard();
        let mut interpreter = Interpreter::new(&program, &registry).unwrap();
        let outcome = interpreter.run(&[]).unwrap();
        let slots = (0..interpreter.references().len())
            .map(|id| interpreter.references().get(id).cloned())
            .collect();
        (outcome, slots)
    }

    #[test]
    fn test_struct_fields_share_references() {
        let (outcome, slots) = run(vec![
            Instruction::SetInteger {
                target: 0,
                value: 1,
            },
            Instruction::SetStruct {
                target: 1,
                fields: vec![("x".into(), 0)],
            },
            Instruction::SetInteger {
                target: 2,
                value: 7,
            },
            Instruction::SetField {
                source: 1,
                field: "x".into(),
                value: 2,
            },
            Instruction::GetField {
                target: 3,
                source: 1,
                field: "x".into(),
            },
            Instruction::Return { value: 3 },
        ]);
        assert_eq!(outcome, Outcome::Returned(Some(Value::Integer(7))));
        assert_eq!(slots[0], Some(Value::Integer(7)));
    }

    #[test]
    fn test_array_index_out_of_bounds_is_thrown() {
        let (outcome, _) = run(vec![
            Instruction::SetInteger {
                target: 0,
                value: 1,
            },
            Instruction::SetArray {
                target: 1,
                elements: smallvec![0],
            },
            Instruction::SetInteger {
                target: 2,
                value: 3,
            },
            Instruction::GetIndex {
                target: 3,
                source: 1,
                index: 2,
            },
            Instruction::Return { value: 3 },
        ]);
        assert_eq!(
            outcome,
            Outcome::Threw(Value::String(
                "index 3 out of bounds for array of length 1".into()
            ))
        );
    }

    #[test]
    fn test_tuple_element() {
        let (outcome, _) = run(vec![
            Instruction::SetChar {
                target: 0,
                value: 'a',
            },
            Instruction::SetBool {
                target: 1,
                value: true,
            },
            Instruction::SetTuple {
                target: 2,
                elements: smallvec![0, 1],
            },
            Instruction::GetElement {
                target: 3,
                source: 2,
                index: 1,
            },
            Instruction::Return { value: 3 },
        ]);
        assert_eq!(outcome, Outcome::Returned(Some(Value::Bool(true))));
    }

    #[test]
    fn test_constant_is_memoized() {
        // c0 is computed once; the second pass only loads it.
        let program = Program::new(vec![Function::new(
            "main",
            1,
            vec![
                Instruction::SetInteger {
                    target: 0,
                    value: 0,
                },
                Instruction::SetInteger {
                    target: 4,
                    value: 1,
                },
                Instruction::ConstBranch {
                    constant: 0,
                    target: 5,
                },
                Instruction::SetInteger {
                    target: 1,
                    value: 40,
                },
                Instruction::SetConstant {
                    constant: 0,
                    value: 1,
                },
                Instruction::LoadConstant {
                    target: 2,
                    constant: 0,
                },
                Instruction::BinaryOp {
                    target: 0,
                    left: 0,
                    op: OperatorKey::infix(Symbol::Plus),
                    right: 4,
                },
                Instruction::SetInteger {
                    target: 5,
                    value: 2,
                },
                Instruction::BinaryOp {
                    target: 3,
                    left: 0,
                    op: OperatorKey::infix(Symbol::Lt),
                    right: 5,
                },
                Instruction::BranchTrue {
                    condition: 3,
                    target: 2,
                },
                Instruction::Return { value: 2 },
            ],
        )]);
        let registry = OperatorRegistry::standard();
        let mut interpreter = Interpreter::new(&program, &registry).unwrap();
        let outcome = interpreter.run(&[]).unwrap();
        assert_eq!(outcome, Outcome::Returned(Some(Value::Integer(40))));
        assert_eq!(interpreter.references().read(0).unwrap(), &Value::Integer(2));
        assert!(interpreter.constants().contains(0));
        assert_eq!(interpreter.constants().read(0).unwrap(), &Value::Integer(40));
    }

    #[test]
    fn test_bind_and_resolve() {
        let (outcome, _) = run(vec![
            Instruction::SetInteger {
                target: 0,
                value: 1,
            },
            Instruction::Bind {
                name: "x".into(),
                reference: 0,
            },
            Instruction::PushScope,
            Instruction::SetInteger {
                target: 1,
                value: 2,
            },
            Instruction::Bind {
                name: "y".into(),
                reference: 1,
            },
            Instruction::Resolve {
                target: 2,
                name: "x".into(),
            },
            Instruction::PopFrame,
            Instruction::Return { value: 2 },
        ]);
        assert_eq!(outcome, Outcome::Returned(Some(Value::Integer(1))));
    }

    #[test]
    fn test_partial_application() {
        let program = Program::new(vec![
            Function::new(
                "main",
                1,
                vec![
                    Instruction::SetFunction {
                        target: 0,
                        function: 1,
                    },
                    Instruction::SetInteger {
                        target: 1,
                        value: 10,
                    },
                    Instruction::PartialApply {
                        target: 2,
                        function: 0,
                        args: smallvec![1],
                    },
                    Instruction::SetInteger {
                        target: 3,
                        value: 4,
                    },
                    Instruction::Call {
                        target: 4,
                        function: 2,
                        args: smallvec![3],
                    },
                    Instruction::Return { value: 4 },
                ],
            ),
            Function::new(
                "sub",
                2,
                vec![
                    Instruction::LoadParam {
                        target: 5,
                        index: 0,
                    },
                    Instruction::LoadParam {
                        target: 6,
                        index: 1,
                    },
                    Instruction::BinaryOp {
                        target: 7,
                        left: 5,
                        op: OperatorKey::infix(Symbol::Minus),
                        right: 6,
                    },
                    Instruction::Return { value: 7 },
                ],
            ),
        ]);
        let registry = OperatorRegistry::standard();
        let mut interpreter = Interpreter::new(&program, &registry).unwrap();
        assert_eq!(
            interpreter.run(&[]).unwrap(),
            Outcome::Returned(Some(Value::Integer(6)))
        );
    }
}
