//! Module-level constant storage.
//!
//! Each constant is initialized at most once per run, the first time its
//! initializer executes. The guarded branch instruction uses
//! [`ConstantStore::contains`] to skip the initializer afterwards.

use crate::program::ConstId;
use crate::value::Value;
use anyhow::{Result, anyhow, bail};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ConstantStore {
    values: HashMap<ConstId, Value>,
}

impl ConstantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ConstId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn read(&self, id: ConstId) -> Result<&Value> {
        self.values
            .get(&id)
            .ok_or_else(|| anyhow!("Constant c{} read before initialization", id))
    }

    /// Populates constant `id`. A constant can only be set once.
    pub fn set(&mut self, id: ConstId, value: Value) -> Result<()> {
        if self.values.contains_key(&id) {
            bail!("Constant c{} is already initialized", id);
        }
        self.values.insert(id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_once() {
        let mut constants = ConstantStore::new();
        assert!(!constants.contains(0));
        constants.set(0, Value::Integer(10)).unwrap();
        assert!(constants.contains(0));
        assert_eq!(constants.read(0).unwrap(), &Value::Integer(10));
        assert!(constants.set(0, Value::Integer(11)).is_err());
    }

    #[test]
    fn test_read_uninitialized() {
        let constants = ConstantStore::new();
        assert!(constants.read(3).is_err());
    }
}
