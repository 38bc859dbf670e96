//! Reference slot storage.
//!
//! Reference ids are assigned by the translator and are dense, so the store is a
//! plain vector of optional values. Slots are never reclaimed during a run.

use crate::program::RefId;
use crate::value::Value;
use anyhow::{Result, anyhow};

#[derive(Debug, Default)]
pub struct ReferenceStore {
    slots: Vec<Option<Value>>,
}

impl ReferenceStore {
    /// Creates a store with `capacity` unwritten slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Reads the value held by `id`.
    ///
    /// Reading a slot that was never written means the instruction stream is
    /// inconsistent, which is reported as an error.
    pub fn read(&self, id: RefId) -> Result<&Value> {
        self.get(id)
            .ok_or_else(|| anyhow!("Read of unwritten reference #{}", id))
    }

    pub fn get(&self, id: RefId) -> Option<&Value> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Reads and clones the value held by `id`.
    pub fn load(&self, id: RefId) -> Result<Value> {
        self.read(id).cloned()
    }

    /// Stores `value` in `id`, growing the store if needed.
    pub fn write(&mut self, id: RefId, value: Value) {
        if id >= self.slots.len() {
            self.slots.resize(id + 1, None);
        }
        self.slots[id] = Some(value);
    }

    /// Stores `value` in a fresh slot past every id in use and returns it.
    pub fn allocate(&mut self, value: Value) -> RefId {
        let id = self.slots.len();
        self.slots.push(Some(value));
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
