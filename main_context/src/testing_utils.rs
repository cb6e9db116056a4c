//! Helpers for tests and local runs: logger setup and in-memory stand-ins
//! for the program and the trace.

use env_logger::{try_init_from_env, Env, DEFAULT_FILTER_ENV};

use crate::collaborators::{Rom, TraceSink};
use crate::fea::F;

pub fn init_logger() {
    let _ = try_init_from_env(Env::default().filter_or(DEFAULT_FILTER_ENV, "info"));
}

/// A ROM whose instructions are labelled `file:line`, one line each.
#[derive(Debug, Clone)]
pub struct LabelledRom {
    labels: Vec<String>,
}

impl LabelledRom {
    pub fn new(file: &str, len: usize) -> Self {
        Self {
            labels: (1..=len).map(|line| format!("{file}:{line}")).collect(),
        }
    }
}

impl Rom for LabelledRom {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn location(&self, zkpc: u64) -> Option<String> {
        self.labels.get(zkpc as usize).cloned()
    }
}

/// Dense row-major trace of `degree` rows by `columns` columns.
#[derive(Debug, Clone)]
pub struct MemoryTrace {
    degree: usize,
    columns: usize,
    cells: Vec<F>,
}

impl MemoryTrace {
    pub fn new(degree: usize, columns: usize) -> Self {
        Self {
            degree,
            columns,
            cells: vec![F::default(); degree * columns],
        }
    }

    pub fn get(&self, step: usize, column: usize) -> F {
        self.cells[step * self.columns + column]
    }
}

impl TraceSink for MemoryTrace {
    fn degree(&self) -> usize {
        self.degree
    }

    fn set(&mut self, step: usize, column: usize, value: F) {
        self.cells[step * self.columns + column] = value;
    }
}
