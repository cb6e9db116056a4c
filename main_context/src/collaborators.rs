//! Boundaries of the execution context: what it borrows from the
//! interpreter around it.

use ethereum_types::U256;
use smt_trie::db::Db;
use smt_trie::smt::{HashOut, Key, Smt, SmtError, SmtSetResult};

use crate::fea::F;
use crate::hash::HashSpace;

/// The program being interpreted, indexed by zkPC.
pub trait Rom {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source location of the instruction at `zkpc`, for diagnostics.
    fn location(&self, _zkpc: u64) -> Option<String> {
        None
    }
}

/// Committed polynomials of the main state machine, written row by row by
/// the interpreter.
pub trait TraceSink {
    /// Number of rows, i.e. the size of the evaluation domain.
    fn degree(&self) -> usize;

    fn set(&mut self, step: usize, column: usize, value: F);
}

/// The state backend. Roots are passed explicitly so that the same backend
/// can serve writes on any historical state.
pub trait HashDb {
    fn set(&mut self, old_root: HashOut, key: Key, value: U256) -> Result<SmtSetResult, SmtError>;

    fn get(&mut self, root: HashOut, key: Key) -> Result<U256, SmtError>;
}

impl<D: Db> HashDb for Smt<D> {
    fn set(&mut self, old_root: HashOut, key: Key, value: U256) -> Result<SmtSetResult, SmtError> {
        self.checkout(old_root);
        Smt::set(self, key, value)
    }

    fn get(&mut self, root: HashOut, key: Key) -> Result<U256, SmtError> {
        self.checkout(root);
        Smt::get(self, key)
    }
}

/// Observer of high-level context events, such as an execution tracer.
/// Every method defaults to doing nothing.
pub trait ContextObserver {
    fn on_hash_digest(&mut self, _step: u64, _space: HashSpace, _id: u64, _digest: U256) {}

    fn on_storage_write(&mut self, _step: u64, _res: &SmtSetResult, _cached: bool) {}

    fn on_ec_add(&mut self, _step: u64, _cached: bool) {}

    fn on_checkpoint(&mut self, _step: u64, _balanced: bool) {}
}
