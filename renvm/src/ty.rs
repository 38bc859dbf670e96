//! Runtime type descriptors used by catch clauses.
use crate::value::{Value, ValueKind};
use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

/// The error type a catch clause accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchType {
    /// Matches every error value.
    Any,
    /// Matches values of exactly this kind.
    Kind(ValueKind),
}

/// Type test against a runtime value.
pub trait MatchesValue {
    /// Whether `value` is accepted by this descriptor.
    fn matches(&self, value: &Value) -> bool;
}

impl MatchesValue for CatchType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            CatchType::Any => true,
            CatchType::Kind(kind) => value.kind() == *kind,
        }
    }
}

impl FromStr for CatchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "any" => return Ok(CatchType::Any),
            "integer" | "int" => ValueKind::Integer,
            "float" => ValueKind::Float,
            "char" => ValueKind::Char,
            "bool" => ValueKind::Bool,
            "string" => ValueKind::String,
            "array" => ValueKind::Array,
            "tuple" => ValueKind::Tuple,
            "struct" => ValueKind::Struct,
            "function" | "fn" => ValueKind::Function,
            _ => bail!("Unknown catch type `{}`", s),
        };
        Ok(CatchType::Kind(kind))
    }
}

impl fmt::Display for CatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatchType::Any => f.write_str("any"),
            CatchType::Kind(kind) => write!(f, "{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matching() {
        let ty: CatchType = "string".parse().unwrap();
        assert!(ty.matches(&Value::String("boom".into())));
        assert!(!ty.matches(&Value::Integer(1)));
        assert!(CatchType::Any.matches(&Value::Bool(false)));
    }

    #[test]
    fn test_unknown_catch_type() {
        assert!("widget".parse::<CatchType>().is_err());
        assert_eq!("int".parse::<CatchType>().unwrap().to_string(), "integer");
    }
}
