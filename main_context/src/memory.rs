//! Memory and scripting variables of the main state machine. Both read as
//! zero where nothing was written.

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::errors::{ContextError, ContextResult};
use crate::fea::Fea;

/// Memory indexed by absolute address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    cells: HashMap<u64, Fea>,
}

impl Memory {
    pub fn read(&self, addr: u64) -> Fea {
        self.cells.get(&addr).copied().unwrap_or_default()
    }

    pub fn write(&mut self, addr: u64, value: Fea) {
        self.cells.insert(addr, value);
    }

    /// Number of addresses ever written.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Variables declared by ROM commands (`declareVar` / `setVar` / `getVar`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars {
    vars: HashMap<String, BigInt>,
}

impl Vars {
    /// Declares `name` with a zero value. Names starting with `_` are
    /// scratch variables and may be declared again.
    pub fn declare(&mut self, name: &str) -> ContextResult<()> {
        if !name.starts_with('_') && self.vars.contains_key(name) {
            return Err(ContextError::VariableRedeclared(name.to_string()));
        }
        self.vars.insert(name.to_string(), BigInt::default());
        Ok(())
    }

    pub fn get(&self, name: &str) -> BigInt {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, name: &str, value: BigInt) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }
}
