//! Incremental hashing with write / finalize / digest / read semantics.
//!
//! The program builds the preimage of a hash byte by byte, under a 64-bit id,
//! then declares its total length. Only once the length is final can the
//! digest be taken or bytes be read back, so that no digest is ever computed
//! over a partially written buffer and every read is checked against a closed
//! one. The two address spaces, `K` and `P`, are independent instances of
//! [`HashAccumulator`] bound to different hash functions.

use std::collections::HashMap;
use std::fmt;

use ethereum_types::U256;
use keccak_hash::keccak;
use log::trace;
use smt_trie::code::poseidon_linear_hash_u256;

use crate::errors::{ContextError, ContextResult};

/// Hash function of an address space.
pub trait ByteDigest {
    fn digest(&self, bytes: &[u8]) -> U256;
}

/// Keccak-256, read as a big-endian integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeccakDigest;

impl ByteDigest for KeccakDigest {
    fn digest(&self, bytes: &[u8]) -> U256 {
        U256::from_big_endian(keccak(bytes).as_bytes())
    }
}

/// Linear Poseidon hash of the state tree, as used for contract bytecode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonDigest;

impl ByteDigest for PoseidonDigest {
    fn digest(&self, bytes: &[u8]) -> U256 {
        poseidon_linear_hash_u256(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashSpace {
    K,
    P,
}

impl fmt::Display for HashSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashSpace::K => write!(f, "K"),
            HashSpace::P => write!(f, "P"),
        }
    }
}

/// State of one hash id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashEntry {
    /// Preimage accumulated so far.
    pub data: Vec<u8>,
    /// Offset to length of every read served.
    pub reads: HashMap<u64, u64>,
    /// Meaningful only once `digest_called` is set.
    pub digest: U256,
    pub digest_called: bool,
    pub len_called: bool,
}

/// All hash entries of one address space, created on first use and dropped
/// with the run.
#[derive(Debug, Clone)]
pub struct HashAccumulator<H> {
    space: HashSpace,
    hasher: H,
    entries: HashMap<u64, HashEntry>,
}

impl<H: ByteDigest> HashAccumulator<H> {
    pub fn new(space: HashSpace, hasher: H) -> Self {
        Self {
            space,
            hasher,
            entries: HashMap::new(),
        }
    }

    pub fn space(&self) -> HashSpace {
        self.space
    }

    pub fn entry(&self, id: u64) -> Option<&HashEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes `bytes` at `offset` in the preimage of `id`.
    ///
    /// Positions already written must hold the same bytes; the rest of
    /// `bytes` is appended. A write may not start past the current end.
    pub fn write(&mut self, id: u64, offset: u64, bytes: &[u8]) -> ContextResult<()> {
        let space = self.space;
        let size = match self.entries.get(&id) {
            Some(entry) if entry.len_called => {
                return Err(ContextError::HashAlreadyFinalized { space, id });
            }
            Some(entry) => entry.data.len() as u64,
            None => 0,
        };
        if offset > size {
            return Err(ContextError::WriteGap {
                space,
                id,
                offset,
                size,
            });
        }

        // A new id only gets past the gap check with `offset == 0`, so a
        // rejected write never leaves an entry behind.
        let entry = self.entries.entry(id).or_default();
        let start = offset as usize;
        let overlap = (entry.data.len() - start).min(bytes.len());
        for (j, (&existing, &written)) in entry.data[start..start + overlap]
            .iter()
            .zip(bytes)
            .enumerate()
        {
            if existing != written {
                return Err(ContextError::ByteMismatch {
                    space,
                    id,
                    pos: offset + j as u64,
                    existing,
                    written,
                });
            }
        }
        entry.data.extend_from_slice(&bytes[overlap..]);
        Ok(())
    }

    /// Declares the total length of `id`. Finalizing an id that was never
    /// written declares an empty preimage.
    pub fn finalize_length(&mut self, id: u64, declared: u64) -> ContextResult<()> {
        let space = self.space;
        let actual = match self.entries.get(&id) {
            Some(entry) if entry.len_called => {
                return Err(ContextError::AlreadyFinalized { space, id });
            }
            Some(entry) => entry.data.len() as u64,
            None => 0,
        };
        if declared != actual {
            return Err(ContextError::LengthMismatch {
                space,
                id,
                declared,
                actual,
            });
        }
        self.entries.entry(id).or_default().len_called = true;
        trace!("hash{space} {id}: length finalized at {actual}");
        Ok(())
    }

    /// Returns the digest of `id`, computing it on the first call.
    pub fn digest(&mut self, id: u64) -> ContextResult<U256> {
        let space = self.space;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ContextError::NotFinalized { space, id })?;
        if entry.digest_called {
            return Ok(entry.digest);
        }
        if !entry.len_called {
            return Err(ContextError::NotFinalized { space, id });
        }
        entry.digest = self.hasher.digest(&entry.data);
        entry.digest_called = true;
        trace!("hash{space} {id}: digest {:#x}", entry.digest);
        Ok(entry.digest)
    }

    /// Like [`HashAccumulator::digest`], but also checks the digest against
    /// the value the program claims for it.
    pub fn check_digest(&mut self, id: u64, claimed: U256) -> ContextResult<U256> {
        let computed = self.digest(id)?;
        if computed != claimed {
            return Err(ContextError::DigestMismatch {
                space: self.space,
                id,
                computed,
                claimed,
            });
        }
        Ok(computed)
    }

    /// Reads `len` bytes at `offset` from the finalized preimage of `id`.
    pub fn read(&mut self, id: u64, offset: u64, len: u64) -> ContextResult<&[u8]> {
        let space = self.space;
        let entry = match self.entries.get_mut(&id) {
            Some(entry) if entry.len_called => entry,
            _ => return Err(ContextError::NotFinalized { space, id }),
        };
        let size = entry.data.len() as u64;
        match offset.checked_add(len) {
            Some(end) if end <= size => {
                entry.reads.insert(offset, len);
                Ok(&entry.data[offset as usize..end as usize])
            }
            _ => Err(ContextError::OutOfRange {
                space,
                id,
                offset,
                len,
                size,
            }),
        }
    }
}
