use std::collections::{BTreeMap, BTreeSet};

use ethereum_types::U256;

use crate::errors::{ContextError, ContextResult};

/// Storage slots touched per call context, innermost context last.
///
/// Warmth is a property of the current frame only: a slot touched by a
/// parent context is cold again in a freshly opened child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageAccessTracker {
    frames: Vec<BTreeMap<U256, BTreeSet<U256>>>,
}

impl StorageAccessTracker {
    pub fn push_context(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    pub fn pop_context(&mut self) -> ContextResult<()> {
        self.frames
            .pop()
            .map(|_| ())
            .ok_or(ContextError::NoActiveContext)
    }

    /// Number of open call contexts.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn mark_accessed(&mut self, address: U256, key: U256) -> ContextResult<()> {
        self.frames
            .last_mut()
            .ok_or(ContextError::NoActiveContext)?
            .entry(address)
            .or_default()
            .insert(key);
        Ok(())
    }

    pub fn is_warm(&self, address: U256, key: U256) -> bool {
        self.frames
            .last()
            .and_then(|frame| frame.get(&address))
            .is_some_and(|keys| keys.contains(&key))
    }

    /// True if any slot of `address` was touched in the current frame.
    pub fn is_warm_address(&self, address: U256) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.contains_key(&address))
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_after_first_access() {
        let mut tracker = StorageAccessTracker::default();
        let (a, k) = (U256::from(0xaa), U256::from(1));
        tracker.push_context();
        assert!(!tracker.is_warm(a, k));
        tracker.mark_accessed(a, k).unwrap();
        tracker.mark_accessed(a, k).unwrap();
        assert!(tracker.is_warm(a, k));
        assert!(tracker.is_warm_address(a));
        assert!(!tracker.is_warm(a, U256::from(2)));
        assert!(!tracker.is_warm(U256::from(0xbb), k));
    }

    #[test]
    fn frames_are_independent() {
        let mut tracker = StorageAccessTracker::default();
        let (a, k) = (U256::from(0xaa), U256::from(1));
        tracker.push_context();
        tracker.mark_accessed(a, k).unwrap();

        tracker.push_context();
        assert_eq!(tracker.depth(), 2);
        assert!(!tracker.is_warm(a, k));
        tracker.mark_accessed(a, U256::from(2)).unwrap();

        tracker.pop_context().unwrap();
        assert!(tracker.is_warm(a, k));
        assert!(!tracker.is_warm(a, U256::from(2)));
    }

    #[test]
    fn empty_stack() {
        let mut tracker = StorageAccessTracker::default();
        assert_eq!(tracker.pop_context(), Err(ContextError::NoActiveContext));
        assert_eq!(
            tracker.mark_accessed(U256::one(), U256::one()),
            Err(ContextError::NoActiveContext)
        );
        assert!(!tracker.is_warm(U256::one(), U256::one()));
    }
}
