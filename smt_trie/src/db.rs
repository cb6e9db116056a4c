use std::collections::HashMap;

use crate::smt::{Key, Node, SmtError};

/// Content-addressed node storage backing an [`Smt`](crate::smt::Smt).
pub trait Db: Default {
    fn get_node(&self, key: &Key) -> Option<&Node>;
    fn set_node(&mut self, key: Key, value: Node);

    /// Like [`Db::get_node`], but a missing node is an error: a well-formed
    /// tree never references a hash it did not store.
    fn node(&self, key: &Key) -> Result<&Node, SmtError> {
        self.get_node(key).ok_or(SmtError::MissingNode(*key))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    nodes: HashMap<Key, Node>,
}

impl MemoryDb {
    /// Number of distinct nodes stored so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Db for MemoryDb {
    fn get_node(&self, key: &Key) -> Option<&Node> {
        self.nodes.get(key)
    }

    fn set_node(&mut self, key: Key, value: Node) {
        self.nodes.insert(key, value);
    }
}
