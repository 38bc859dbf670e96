//! Operator registry.
//!
//! Operator instructions carry an [`OperatorKey`] chosen by the type checker. The
//! interpreter looks the key up in an [`OperatorRegistry`], which is built once
//! from a static list of [`OperatorDescriptor`]s and never modified afterwards.
//!
//! Operand types have been validated upstream. A kind mismatch at runtime is
//! therefore reported as an engine fault, while arithmetic failures such as
//! overflow or division by zero are raised into the program.

use crate::error::raise;
use crate::memory::ReferenceStore;
use crate::program::RefId;
use crate::value::Value;
use anyhow::{Result, anyhow, bail};
use num_traits::{CheckedRem, PrimInt, checked_pow};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    Prefix,
    Postfix,
    Infix,
}

impl fmt::Display for Fixity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fixity::Prefix => "prefix",
            Fixity::Postfix => "postfix",
            Fixity::Infix => "infix",
        })
    }
}

/// Operator symbols understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Tilde,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    Increment,
    Decrement,
}

impl Symbol {
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Plus => "+",
            Symbol::Minus => "-",
            Symbol::Star => "*",
            Symbol::Slash => "/",
            Symbol::Percent => "%",
            Symbol::Power => "**",
            Symbol::Eq => "==",
            Symbol::Ne => "!=",
            Symbol::Lt => "<",
            Symbol::Le => "<=",
            Symbol::Gt => ">",
            Symbol::Ge => ">=",
            Symbol::And => "&&",
            Symbol::Or => "||",
            Symbol::Not => "!",
            Symbol::Tilde => "~",
            Symbol::Amp => "&",
            Symbol::Pipe => "|",
            Symbol::Caret => "^",
            Symbol::Shl => "<<",
            Symbol::Shr => ">>",
            Symbol::Increment => "++",
            Symbol::Decrement => "--",
        }
    }
}

const ALL_SYMBOLS: [Symbol; 23] = [
    Symbol::Plus,
    Symbol::Minus,
    Symbol::Star,
    Symbol::Slash,
    Symbol::Percent,
    Symbol::Power,
    Symbol::Eq,
    Symbol::Ne,
    Symbol::Lt,
    Symbol::Le,
    Symbol::Gt,
    Symbol::Ge,
    Symbol::And,
    Symbol::Or,
    Symbol::Not,
    Symbol::Tilde,
    Symbol::Amp,
    Symbol::Pipe,
    Symbol::Caret,
    Symbol::Shl,
    Symbol::Shr,
    Symbol::Increment,
    Symbol::Decrement,
];

impl FromStr for Symbol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ALL_SYMBOLS
            .into_iter()
            .find(|symbol| symbol.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown operator symbol `{}`", s))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry key: an operator symbol together with its fixity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    pub symbol: Symbol,
    pub fixity: Fixity,
}

impl OperatorKey {
    pub const fn new(symbol: Symbol, fixity: Fixity) -> Self {
        Self { symbol, fixity }
    }

    pub const fn infix(symbol: Symbol) -> Self {
        Self::new(symbol, Fixity::Infix)
    }

    pub const fn prefix(symbol: Symbol) -> Self {
        Self::new(symbol, Fixity::Prefix)
    }

    pub const fn postfix(symbol: Symbol) -> Self {
        Self::new(symbol, Fixity::Postfix)
    }
}

impl fmt::Display for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.fixity, self.symbol)
    }
}

/// Runtime behavior of an operator. Operands are passed as references so that
/// operators such as `++` can write their result back.
pub type ExecuteFn = fn(&mut ReferenceStore, &[RefId]) -> Result<Value>;

#[derive(Clone, Copy)]
pub struct OperatorDescriptor {
    pub key: OperatorKey,
    execute: ExecuteFn,
}

impl OperatorDescriptor {
    pub const fn new(key: OperatorKey, execute: ExecuteFn) -> Self {
        Self { key, execute }
    }

    pub fn execute(&self, store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
        let expected = if self.key.fixity == Fixity::Infix { 2 } else { 1 };
        if operands.len() != expected {
            bail!(
                "Operator `{}` expects {} operands, got {}",
                self.key,
                expected,
                operands.len()
            );
        }
        (self.execute)(store, operands)
    }
}

impl fmt::Debug for OperatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorDescriptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Immutable lookup table from [`OperatorKey`] to implementation.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    table: HashMap<OperatorKey, OperatorDescriptor>,
}

impl OperatorRegistry {
    /// Builds the registry with every operator the engine implements.
    pub fn standard() -> Self {
        Self::from_descriptors(STANDARD_OPERATORS)
    }

    /// Builds a registry from `descriptors`. Later entries replace earlier ones
    /// with the same key.
    pub fn from_descriptors(descriptors: &[OperatorDescriptor]) -> Self {
        let table = descriptors.iter().map(|d| (d.key, *d)).collect();
        Self { table }
    }

    pub fn lookup(&self, key: OperatorKey) -> Result<&OperatorDescriptor> {
        self.table
            .get(&key)
            .ok_or_else(|| anyhow!("No implementation registered for operator `{}`", key))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

const STANDARD_OPERATORS: &[OperatorDescriptor] = &[
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Plus), add),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Minus), sub),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Star), mul),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Slash), div),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Percent), rem),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Power), pow),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Eq), eq),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Ne), ne),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Lt), lt),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Le), le),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Gt), gt),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Ge), ge),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::And), and),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Or), or),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Amp), bit_and),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Pipe), bit_or),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Caret), xor),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Shl), shl),
    OperatorDescriptor::new(OperatorKey::infix(Symbol::Shr), shr),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Minus), negate),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Plus), identity),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Not), not),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Tilde), complement),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Increment), pre_increment),
    OperatorDescriptor::new(OperatorKey::prefix(Symbol::Decrement), pre_decrement),
    OperatorDescriptor::new(OperatorKey::postfix(Symbol::Increment), post_increment),
    OperatorDescriptor::new(OperatorKey::postfix(Symbol::Decrement), post_decrement),
];

fn binary_operands(store: &ReferenceStore, operands: &[RefId]) -> Result<(Value, Value)> {
    Ok((store.load(operands[0])?, store.load(operands[1])?))
}

fn mismatch<T>(symbol: Symbol, left: &Value, right: &Value) -> Result<T> {
    bail!(
        "Type mismatch in binary operation: `{}` on {} and {}",
        symbol,
        left.kind(),
        right.kind()
    )
}

fn add(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::String(mut left), Value::String(right)) => {
            left.push_str(&right);
            Ok(Value::String(left))
        }
        (Value::String(mut left), Value::Char(c)) => {
            left.push(c);
            Ok(Value::String(left))
        }
        (left, right) => arith(Symbol::Plus, left, right),
    }
}

fn sub(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (left, right) = binary_operands(store, operands)?;
    arith(Symbol::Minus, left, right)
}

fn mul(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (left, right) = binary_operands(store, operands)?;
    arith(Symbol::Star, left, right)
}

fn div(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (left, right) = binary_operands(store, operands)?;
    arith(Symbol::Slash, left, right)
}

fn rem(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (left, right) = binary_operands(store, operands)?;
    arith(Symbol::Percent, left, right)
}

fn pow(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (left, right) = binary_operands(store, operands)?;
    arith(Symbol::Power, left, right)
}

/// Numeric arithmetic shared by integers and floats.
fn arith(symbol: Symbol, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => eval_int_arith(symbol, l, r).map(Value::Integer),
        (Value::Float(l), Value::Float(r)) => eval_float_arith(symbol, l, r).map(Value::Float),
        (left, right) => mismatch(symbol, &left, &right),
    }
}

/// Evaluates checked integer arithmetic. Failures are raised into the program.
fn eval_int_arith<T>(symbol: Symbol, left: T, right: T) -> Result<T>
where
    T: PrimInt + CheckedRem + TryInto<usize>,
{
    let result = match symbol {
        Symbol::Plus => left.checked_add(&right),
        Symbol::Minus => left.checked_sub(&right),
        Symbol::Star => left.checked_mul(&right),
        Symbol::Slash | Symbol::Percent if right.is_zero() => {
            return raise("division by zero");
        }
        Symbol::Slash => left.checked_div(&right),
        Symbol::Percent => left.checked_rem(&right),
        Symbol::Power => match right.try_into() {
            Ok(exponent) => checked_pow(left, exponent),
            Err(_) => return raise("negative exponent in integer power"),
        },
        _ => bail!("Unsupported integer operation: `{}`", symbol),
    };
    match result {
        Some(value) => Ok(value),
        None => raise(format!("integer overflow in `{}`", symbol)),
    }
}

fn eval_float_arith(symbol: Symbol, left: f64, right: f64) -> Result<f64> {
    Ok(match symbol {
        Symbol::Plus => left + right,
        Symbol::Minus => left - right,
        Symbol::Star => left * right,
        Symbol::Slash => left / right,
        Symbol::Percent => left % right,
        Symbol::Power => left.powf(right),
        _ => bail!("Unsupported float operation: `{}`", symbol),
    })
}

fn eq(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let left = store.read(operands[0])?;
    let right = store.read(operands[1])?;
    Ok(Value::Bool(left.equals(right)))
}

fn ne(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let left = store.read(operands[0])?;
    let right = store.read(operands[1])?;
    Ok(Value::Bool(!left.equals(right)))
}

/// Orders two values of the same primitive kind.
fn compare(symbol: Symbol, store: &ReferenceStore, operands: &[RefId]) -> Result<Option<Ordering>> {
    let left = store.read(operands[0])?;
    let right = store.read(operands[1])?;
    Ok(match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l.partial_cmp(r),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Char(l), Value::Char(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => l.partial_cmp(r),
        (left, right) => return mismatch(symbol, left, right),
    })
}

fn lt(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let ordering = compare(Symbol::Lt, store, operands)?;
    Ok(Value::Bool(ordering == Some(Ordering::Less)))
}

fn le(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let ordering = compare(Symbol::Le, store, operands)?;
    Ok(Value::Bool(matches!(ordering, Some(Ordering::Less | Ordering::Equal))))
}

fn gt(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let ordering = compare(Symbol::Gt, store, operands)?;
    Ok(Value::Bool(ordering == Some(Ordering::Greater)))
}

fn ge(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let ordering = compare(Symbol::Ge, store, operands)?;
    Ok(Value::Bool(matches!(ordering, Some(Ordering::Greater | Ordering::Equal))))
}

fn and(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l && r)),
        (left, right) => mismatch(Symbol::And, &left, &right),
    }
}

fn or(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l || r)),
        (left, right) => mismatch(Symbol::Or, &left, &right),
    }
}

fn bit_and(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(l & r)),
        (left, right) => mismatch(Symbol::Amp, &left, &right),
    }
}

fn bit_or(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(l | r)),
        (left, right) => mismatch(Symbol::Pipe, &left, &right),
    }
}

fn xor(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match binary_operands(store, operands)? {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(l ^ r)),
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l ^ r)),
        (left, right) => mismatch(Symbol::Caret, &left, &right),
    }
}

fn shift(symbol: Symbol, store: &ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (l, r) = match binary_operands(store, operands)? {
        (Value::Integer(l), Value::Integer(r)) => (l, r),
        (left, right) => return mismatch(symbol, &left, &right),
    };
    let amount = match u32::try_from(r) {
        Ok(amount) if amount < i64::BITS => amount,
        _ => return raise(format!("shift amount {} out of range", r)),
    };
    Ok(Value::Integer(if symbol == Symbol::Shl {
        l << amount
    } else {
        l >> amount
    }))
}

fn shl(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    shift(Symbol::Shl, store, operands)
}

fn shr(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    shift(Symbol::Shr, store, operands)
}

fn unary_mismatch<T>(symbol: Symbol, operand: &Value) -> Result<T> {
    bail!(
        "Unsupported unary operation: `{}` on {}",
        symbol,
        operand.kind()
    )
}

fn negate(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match store.read(operands[0])? {
        Value::Integer(i) => match i.checked_neg() {
            Some(negated) => Ok(Value::Integer(negated)),
            None => raise("integer overflow in `-`"),
        },
        Value::Float(x) => Ok(Value::Float(-x)),
        other => unary_mismatch(Symbol::Minus, other),
    }
}

fn identity(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match store.read(operands[0])? {
        value @ (Value::Integer(_) | Value::Float(_)) => Ok(value.clone()),
        other => unary_mismatch(Symbol::Plus, other),
    }
}

fn not(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match store.read(operands[0])? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => unary_mismatch(Symbol::Not, other),
    }
}

fn complement(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    match store.read(operands[0])? {
        Value::Integer(i) => Ok(Value::Integer(!i)),
        other => unary_mismatch(Symbol::Tilde, other),
    }
}

/// Adds `delta` to the integer at the operand reference and writes it back.
/// Returns `(old, new)`.
fn step(
    symbol: Symbol,
    delta: i64,
    store: &mut ReferenceStore,
    operands: &[RefId],
) -> Result<(i64, i64)> {
    let old = match store.read(operands[0])? {
        Value::Integer(i) => *i,
        other => return unary_mismatch(symbol, other),
    };
    let new = eval_int_arith(Symbol::Plus, old, delta)?;
    store.write(operands[0], Value::Integer(new));
    Ok((old, new))
}

fn pre_increment(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (_, new) = step(Symbol::Increment, 1, store, operands)?;
    Ok(Value::Integer(new))
}

fn pre_decrement(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (_, new) = step(Symbol::Decrement, -1, store, operands)?;
    Ok(Value::Integer(new))
}

fn post_increment(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (old, _) = step(Symbol::Increment, 1, store, operands)?;
    Ok(Value::Integer(old))
}

fn post_decrement(store: &mut ReferenceStore, operands: &[RefId]) -> Result<Value> {
    let (old, _) = step(Symbol::Decrement, -1, store, operands)?;
    Ok(Value::Integer(old))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use smallvec::smallvec;

    fn run_infix(symbol: Symbol, left: Value, right: Value) -> Result<Value> {
        let registry = OperatorRegistry::standard();
        let mut store = ReferenceStore::new(2);
        store.write(0, left);
        store.write(1, right);
        registry
            .lookup(OperatorKey::infix(symbol))?
            .execute(&mut store, &[0, 1])
    }

    fn raised_message(result: Result<Value>) -> String {
        result
            .unwrap_err()
            .downcast::<RuntimeError>()
            .expect("expected a raised runtime error")
            .message
    }

    #[test]
    fn test_int_binary_operations() {
        assert_eq!(
            run_infix(Symbol::Plus, Value::Integer(5), Value::Integer(3)).unwrap(),
            Value::Integer(8)
        );
        assert_eq!(
            run_infix(Symbol::Percent, Value::Integer(7), Value::Integer(3)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            run_infix(Symbol::Power, Value::Integer(2), Value::Integer(10)).unwrap(),
            Value::Integer(1024)
        );
    }

    #[test]
    fn test_int_overflow_is_raised() {
        let sum = run_infix(Symbol::Plus, Value::Integer(i64::MAX), Value::Integer(1));
        let message = raised_message(sum);
        assert!(message.contains("overflow"));
    }

    #[test]
    fn test_division_by_zero_is_raised() {
        let quotient = run_infix(Symbol::Slash, Value::Integer(10), Value::Integer(0));
        let message = raised_message(quotient);
        assert_eq!(message, "division by zero");
        assert!(run_infix(Symbol::Percent, Value::Integer(10), Value::Integer(0)).is_err());
    }

    #[test]
    fn test_float_operations() {
        assert_eq!(
            run_infix(Symbol::Star, Value::Float(1.5), Value::Float(2.0)).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            run_infix(Symbol::Lt, Value::Float(1.5), Value::Float(2.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            run_infix(
                Symbol::Plus,
                Value::String("ab".into()),
                Value::String("cd".into())
            )
            .unwrap(),
            Value::String("abcd".into())
        );
        assert_eq!(
            run_infix(Symbol::Plus, Value::String("ab".into()), Value::Char('!')).unwrap(),
            Value::String("ab!".into())
        );
    }

    #[test]
    fn test_equality_operators_use_value_equality() {
        assert_eq!(
            run_infix(Symbol::Eq, Value::Integer(3), Value::Integer(3)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            run_infix(Symbol::Ne, Value::Array(smallvec![4]), Value::Array(smallvec![5])).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_type_mismatch_is_a_fault() {
        let err = run_infix(Symbol::Minus, Value::Integer(1), Value::Bool(true)).unwrap_err();
        assert!(err.downcast_ref::<RuntimeError>().is_none());
        assert!(err.to_string().contains("Type mismatch"));
    }

    #[test]
    fn test_shift_range() {
        assert_eq!(
            run_infix(Symbol::Shl, Value::Integer(1), Value::Integer(4)).unwrap(),
            Value::Integer(16)
        );
        let shifted = run_infix(Symbol::Shr, Value::Integer(1), Value::Integer(64));
        assert!(raised_message(shifted).contains("out of range"));
    }

    #[test]
    fn test_increment_writes_back() {
        let registry = OperatorRegistry::standard();
        let mut store = ReferenceStore::new(1);
        store.write(0, Value::Integer(5));

        let post = registry.lookup(OperatorKey::postfix(Symbol::Increment)).unwrap();
        assert_eq!(post.execute(&mut store, &[0]).unwrap(), Value::Integer(5));
        assert_eq!(store.read(0).unwrap(), &Value::Integer(6));

        let pre = registry.lookup(OperatorKey::prefix(Symbol::Decrement)).unwrap();
        assert_eq!(pre.execute(&mut store, &[0]).unwrap(), Value::Integer(5));
        assert_eq!(store.read(0).unwrap(), &Value::Integer(5));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = OperatorRegistry::standard();
        assert_eq!(registry.len(), STANDARD_OPERATORS.len());
        assert!(registry.lookup(OperatorKey::postfix(Symbol::Star)).is_err());
        assert!(registry.lookup(OperatorKey::prefix(Symbol::Not)).is_ok());
    }

    #[test]
    fn test_registry_from_descriptors() {
        assert!(OperatorRegistry::from_descriptors(&[]).is_empty());
        assert_eq!(OperatorRegistry::default().len(), STANDARD_OPERATORS.len());

        // A later descriptor replaces an earlier one with the same key.
        let registry = OperatorRegistry::from_descriptors(&[
            OperatorDescriptor::new(OperatorKey::infix(Symbol::Plus), add),
            OperatorDescriptor::new(OperatorKey::infix(Symbol::Plus), sub),
        ]);
        assert_eq!(registry.len(), 1);
        let mut store = ReferenceStore::new(2);
        store.write(0, Value::Integer(5));
        store.write(1, Value::Integer(3));
        let plus = registry.lookup(OperatorKey::infix(Symbol::Plus)).unwrap();
        assert_eq!(plus.execute(&mut store, &[0, 1]).unwrap(), Value::Integer(2));
    }

    #[test]
    fn test_operand_count_checked() {
        let registry = OperatorRegistry::standard();
        let mut store = ReferenceStore::new(1);
        store.write(0, Value::Integer(1));
        let plus = registry.lookup(OperatorKey::infix(Symbol::Plus)).unwrap();
        assert!(plus.execute(&mut store, &[0]).is_err());
    }

    #[test]
    fn test_symbol_parsing() {
        assert_eq!("**".parse::<Symbol>().unwrap(), Symbol::Power);
        assert_eq!("++".parse::<Symbol>().unwrap(), Symbol::Increment);
        assert!("<>".parse::<Symbol>().is_err());
        assert_eq!(OperatorKey::postfix(Symbol::Decrement).to_string(), "postfix --");
    }
}
