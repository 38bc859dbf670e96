//! Runtime values produced and consumed by the interpreter.
//!
//! Primitive values are stored inline. Composite values (arrays, tuples and
//! structs) never own other values: they hold reference ids into the
//! [`ReferenceStore`](crate::memory::ReferenceStore), and their equality is
//! defined over those ids rather than over the values behind them.

use crate::memory::ReferenceStore;
use crate::program::{FunctionId, RefId};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Inline storage for reference id lists. Most composites are small.
pub type RefList = SmallVec<[RefId; 4]>;

/// The runtime kind of a value, used for catch matching and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Float,
    Char,
    Bool,
    String,
    Array,
    Tuple,
    Struct,
    Function,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Char => "char",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Tuple => "tuple",
            ValueKind::Struct => "struct",
            ValueKind::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A callable together with the references of the arguments already applied to it.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub function: FunctionId,
    pub captured: RefList,
}

impl FunctionValue {
    pub fn new(function: FunctionId) -> Self {
        Self {
            function,
            captured: RefList::new(),
        }
    }

    /// Returns a new function value with `args` appended to the captured arguments.
    pub fn apply(&self, args: &[RefId]) -> Self {
        let mut captured = self.captured.clone();
        captured.extend_from_slice(args);
        Self {
            function: self.function,
            captured,
        }
    }
}

/// Runtime values that can be stored in a reference slot.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Char(char),
    Bool(bool),
    String(String),
    /// Homogeneous sequence of element references.
    Array(RefList),
    /// Fixed-length sequence of element references.
    Tuple(RefList),
    /// Field name to field reference.
    Struct(BTreeMap<String, RefId>),
    Function(FunctionValue),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Char(_) => ValueKind::Char,
            Value::Bool(_) => ValueKind::Bool,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Tuple(_) => ValueKind::Tuple,
            Value::Struct(_) => ValueKind::Struct,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Language-level equality.
    ///
    /// Primitives compare by value. Arrays, tuples, structs and function values
    /// compare the reference ids they hold, pairwise, without looking at the
    /// values stored behind those ids. Two composites built independently from
    /// equal values are therefore *not* equal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, ra), (kb, rb))| ka == kb && ra == rb)
            }
            (Value::Function(a), Value::Function(b)) => {
                a.function == b.function && a.captured == b.captured
            }
            _ => false,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Renders this value, following component references through `store`.
    pub fn render<'a>(&'a self, store: &'a ReferenceStore) -> Rendered<'a> {
        Rendered {
            value: self,
            store,
            depth: 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// Shallow display: composites show the reference ids they hold.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(refs) => write_refs(f, "[", refs, "]"),
            Value::Tuple(refs) => write_refs(f, "(", refs, ")"),
            Value::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, (name, id)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: #{id}")?;
                }
                f.write_str(" }")
            }
            Value::Function(func) => {
                write!(f, "<fn @{}", func.function)?;
                if !func.captured.is_empty() {
                    write_refs(f, " ", &func.captured, "")?;
                }
                f.write_str(">")
            }
        }
    }
}

fn write_refs(f: &mut fmt::Formatter<'_>, open: &str, refs: &[RefId], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, id) in refs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "#{id}")?;
    }
    f.write_str(close)
}

/// Deep rendering of a value through a reference store.
pub struct Rendered<'a> {
    value: &'a Value,
    store: &'a ReferenceStore,
    depth: usize,
}

const MAX_RENDER_DEPTH: usize = 16;

impl Rendered<'_> {
    fn component(&self, f: &mut fmt::Formatter<'_>, id: RefId) -> fmt::Result {
        match self.store.get(id) {
            Some(value) if self.depth < MAX_RENDER_DEPTH => write!(
                f,
                "{}",
                Rendered {
                    value,
                    store: self.store,
                    depth: self.depth + 1,
                }
            ),
            Some(_) => f.write_str("..."),
            None => write!(f, "#{id}?"),
        }
    }

    fn sequence(
        &self,
        f: &mut fmt::Formatter<'_>,
        open: &str,
        refs: &[RefId],
        close: &str,
    ) -> fmt::Result {
        f.write_str(open)?;
        for (i, id) in refs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            self.component(f, *id)?;
        }
        f.write_str(close)
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Array(refs) => self.sequence(f, "[", refs, "]"),
            Value::Tuple(refs) => self.sequence(f, "(", refs, ")"),
            Value::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, (name, id)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: ")?;
                    self.component(f, *id)?;
                }
                f.write_str(" }")
            }
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_primitive_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_ne!(Value::Integer(42), Value::Integer(43));
        assert_eq!(Value::String("a".into()), Value::String("a".into()));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_composite_equality_is_by_reference() {
        let mut store = ReferenceStore::new(4);
        store.write(0, Value::Integer(7));
        store.write(1, Value::Integer(7));

        let a = Value::Array(smallvec![0]);
        let b = Value::Array(smallvec![1]);
        assert!(!a.equals(&b), "equal contents behind different ids");

        let c = Value::Array(smallvec![0]);
        assert!(a.equals(&c), "same ids built separately");
    }

    #[test]
    fn test_array_and_tuple_are_distinct_kinds() {
        let array = Value::Array(smallvec![0, 1]);
        let tuple = Value::Tuple(smallvec![0, 1]);
        assert!(!array.equals(&tuple));
        assert!(!Value::Array(smallvec![0]).equals(&Value::Array(smallvec![0, 1])));
    }

    #[test]
    fn test_struct_equality_compares_keys_and_ids() {
        let a = Value::Struct(BTreeMap::from([("x".to_string(), 0), ("y".to_string(), 1)]));
        let b = Value::Struct(BTreeMap::from([("y".to_string(), 1), ("x".to_string(), 0)]));
        let c = Value::Struct(BTreeMap::from([("x".to_string(), 0), ("z".to_string(), 1)]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_function_value_apply() {
        let f = FunctionValue::new(3);
        let g = f.apply(&[5, 6]).apply(&[7]);
        assert_eq!(g.function, 3);
        assert_eq!(g.captured.as_slice(), &[5, 6, 7]);
        assert_ne!(Value::Function(f), Value::Function(g));
    }

    #[test]
    fn test_shallow_and_deep_display() {
        let mut store = ReferenceStore::new(3);
        store.write(0, Value::Integer(1));
        store.write(1, Value::String("two".into()));
        let tuple = Value::Tuple(smallvec![0, 1]);

        assert_eq!(tuple.to_string(), "(#0, #1)");
        assert_eq!(tuple.render(&store).to_string(), "(1, \"two\")");
    }

    #[test]
    fn test_render_terminates_on_cycles() {
        let mut store = ReferenceStore::new(1);
        store.write(0, Value::Array(smallvec![0]));
        let rendered = store.get(0).unwrap().render(&store).to_string();
        assert!(rendered.contains("..."));
    }
}
