#![allow(clippy::needless_range_loop)]

use ethereum_types::U256;
use log::trace;
use plonky2::field::goldilocks_field::GoldilocksField;
use plonky2::field::types::{Field, PrimeField64};
use plonky2::hash::poseidon::PoseidonHash;
use plonky2::plonk::config::Hasher;
use thiserror::Error;

use crate::db::Db;
use crate::utils::{f2limbs, hash0, hash_key_hash, limbs2f, poseidon4, unique_sibling};

pub type F = GoldilocksField;
pub type HashOut = <PoseidonHash as Hasher<F>>::Hash;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Key(pub [F; 4]);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Node(pub [F; 12]);

/// An error raised while walking the tree.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum SmtError {
    /// A hash referenced by a node has no preimage in the database.
    #[error("Node {0:?} is referenced by the tree but missing from the database")]
    MissingNode(Key),
}

/// What a [`Smt::set`] did to the tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SetMode {
    /// The key was present and its value replaced by a non-zero one.
    Update,
    /// The path ended on a leaf for another key, which was pushed down.
    InsertFound,
    /// The path ended on an empty slot.
    InsertNotFound,
    /// The key was removed and its lone sibling leaf moved up.
    DeleteFound,
    /// The key was removed; its sibling is a subtree and stays in place.
    DeleteNotFound,
    /// The key was the only one in the tree.
    DeleteLast,
    /// A zero was written to an absent key: nothing changes.
    ZeroToZero,
}

/// Result of a [`Smt::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtSetResult {
    pub old_root: HashOut,
    pub new_root: HashOut,
    pub key: Key,
    /// Nodes visited from the root down, before the update. When the path
    /// ends on a leaf, that leaf is the last element.
    pub siblings: Vec<Node>,
    /// Key and value of the foreign leaf met at the end of the path, if any.
    pub ins_key: Option<Key>,
    pub ins_value: U256,
    /// True if the path ended on an empty slot.
    pub is_old0: bool,
    pub old_value: U256,
    pub new_value: U256,
    pub mode: SetMode,
}

impl Key {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(F::is_zero)
    }

    /// The path of this key from the root: bit `i` of the path is bit `i / 4`
    /// of element `i % 4`.
    pub fn split(&self) -> Vec<bool> {
        let mut arr = self.0.map(|x| x.to_canonical_u64());
        let mut bits = Vec::with_capacity(256);
        for _ in 0..64 {
            for j in 0..4 {
                bits.push(arr[j] & 1 == 1);
                arr[j] >>= 1;
            }
        }
        bits
    }

    /// Rebuilds a full key from the path leading to a leaf and the
    /// remaining key stored in it.
    pub fn join(path: &[bool], rem_key: Self) -> Self {
        let mut n = [0; 4];
        let mut accs = [0u64; 4];
        for (i, &bit) in path.iter().enumerate() {
            if bit {
                accs[i % 4] |= 1 << n[i % 4];
            }
            n[i % 4] += 1;
        }
        Key(std::array::from_fn(|i| {
            F::from_canonical_u64((rem_key.0[i].to_canonical_u64() << n[i]) | accs[i])
        }))
    }

    /// Drops the first `nbits` path bits, leaving the key stored in a leaf
    /// at depth `nbits`.
    fn remove_key_bits(&self, nbits: usize) -> Self {
        let full_levels = nbits / 4;
        let mut auxk = self.0.map(|x| x.to_canonical_u64());
        for i in 0..4 {
            let mut n = full_levels;
            if full_levels * 4 + i < nbits {
                n += 1;
            }
            auxk[i] >>= n;
        }
        Key(auxk.map(F::from_canonical_u64))
    }
}

impl Node {
    /// A leaf is `[rem_key, value_hash, 1, 0, 0, 0]`.
    pub fn is_leaf(&self) -> bool {
        self.0[8].is_one()
    }

    /// The `i`-th group of four elements.
    pub fn quad(&self, i: usize) -> [F; 4] {
        std::array::from_fn(|j| self.0[4 * i + j])
    }

    fn set_quad(&mut self, i: usize, h: [F; 4]) {
        self.0[4 * i..4 * i + 4].copy_from_slice(&h);
    }
}

/// Sparse Merkle tree (SMT).
/// Leaves hold a remaining key and the hash of a value; internal nodes hold
/// the hashes of their two children. Leaves are hashed with a capacity of
/// `[1,0,0,0]`, internal nodes and values with `[0,0,0,0]`. The root is the
/// hash of the root node, or zero for the empty tree.
#[derive(Debug, Clone, Default)]
pub struct Smt<D: Db> {
    pub db: D,
    pub root: HashOut,
}

impl<D: Db> Smt<D> {
    /// Returns `Poseidon(x, [0,0,0,0])` and save it in DB.
    fn hash0(&mut self, x: [F; 8]) -> [F; 4] {
        let h = hash0(x);
        self.db.set_node(
            Key(h),
            Node(std::array::from_fn(|i| if i < 8 { x[i] } else { F::ZERO })),
        );
        h
    }

    /// Returns `Poseidon(key || h, [1,0,0,0])` and save it in DB.
    fn hash_key_hash(&mut self, k: Key, h: [F; 4]) -> [F; 4] {
        let node = Node(std::array::from_fn(|i| match i {
            j if j < 4 => k.0[j],
            j if j < 8 => h[j - 4],
            8 => F::ONE,
            _ => F::ZERO,
        }));
        let hash = hash_key_hash(k, h);
        self.db.set_node(Key(hash), node);
        hash
    }

    /// Value stored under the leaf `node`, whose value hash must be in DB.
    fn leaf_value(&self, node: &Node) -> Result<U256, SmtError> {
        let val = self.db.node(&Key(node.quad(1)))?;
        Ok(limbs2f(std::array::from_fn(|i| val.0[i])))
    }

    /// Returns the value associated with the key if it is in the SMT, otherwise
    /// returns 0.
    pub fn get(&self, key: Key) -> Result<U256, SmtError> {
        let keys = key.split();
        let mut level = 0;
        let mut r = Key(self.root.elements);

        while !r.is_zero() {
            let node = self.db.node(&r)?;
            if node.is_leaf() {
                let found_key = Key::join(&keys[..level], Key(node.quad(0)));
                return if found_key == key {
                    self.leaf_value(node)
                } else {
                    Ok(U256::zero())
                };
            }
            r = Key(node.quad(keys[level] as usize));
            level += 1;
        }
        Ok(U256::zero())
    }

    /// Positions the tree on `root`, which must be a root previously produced
    /// over the same database.
    pub fn checkout(&mut self, root: HashOut) {
        self.root = root;
    }

    /// Set the value associated with the key in the SMT.
    /// If the value is 0 and the key is in the SMT, the key is removed from the
    /// SMT. Reference implementation in <https://github.com/0xPolygonHermez/zkevm-commonjs/blob/main/src/smt.js>.
    pub fn set(&mut self, key: Key, value: U256) -> Result<SmtSetResult, SmtError> {
        let old_root = self.root;
        let mut r = Key(self.root.elements);
        let mut new_root = self.root;
        let keys = key.split();
        let mut level = 0isize;
        let mut found: Option<(Key, Key, [F; 4], U256)> = None;
        let mut siblings = vec![];

        while !r.is_zero() {
            let node = *self.db.node(&r)?;
            siblings.push(node);
            if node.is_leaf() {
                let rem_key = Key(node.quad(0));
                let found_key = Key::join(&keys[..level as usize], rem_key);
                found = Some((found_key, rem_key, node.quad(1), self.leaf_value(&node)?));
                break;
            }
            r = Key(node.quad(keys[level as usize] as usize));
            level += 1;
        }
        let visited = siblings.clone();

        level -= 1;
        let acc_key = &keys[..level.max(0) as usize];

        let mut ins_key = None;
        let mut ins_value = U256::zero();
        let mut old_value = U256::zero();
        let is_old0 = found.is_none();

        let mode = match found {
            Some((found_key, found_rem_key, _, found_val)) if found_key == key => {
                old_value = found_val;
                if !value.is_zero() {
                    let new_val_h = self.hash0(f2limbs(value));
                    let new_leaf_hash = self.hash_key_hash(found_rem_key, new_val_h);
                    if level >= 0 {
                        siblings[level as usize].set_quad(keys[level as usize] as usize, new_leaf_hash);
                    } else {
                        new_root = HashOut {
                            elements: new_leaf_hash,
                        };
                    }
                    SetMode::Update
                } else if level >= 0 {
                    let l = level as usize;
                    siblings[l].set_quad(keys[l] as usize, [F::ZERO; 4]);
                    match unique_sibling(&siblings[l]) {
                        Some(u_key) => {
                            let child = *self.db.node(&Key(siblings[l].quad(u_key)))?;
                            if child.is_leaf() {
                                let val_h = child.quad(1);
                                let mut path = acc_key.to_vec();
                                path.push(u_key != 0);
                                let moved_key = Key::join(&path, Key(child.quad(0)));
                                let mut u = Some(u_key);
                                while u.is_some() && level >= 0 {
                                    level -= 1;
                                    if level >= 0 {
                                        u = unique_sibling(&siblings[level as usize]);
                                    }
                                }

                                let old_key = moved_key.remove_key_bits((level + 1) as usize);
                                let old_leaf_hash = self.hash_key_hash(old_key, val_h);

                                if level >= 0 {
                                    let l = level as usize;
                                    siblings[l].set_quad(keys[l] as usize, old_leaf_hash);
                                } else {
                                    new_root = HashOut {
                                        elements: old_leaf_hash,
                                    };
                                }
                                SetMode::DeleteFound
                            } else {
                                SetMode::DeleteNotFound
                            }
                        }
                        None => SetMode::DeleteNotFound,
                    }
                } else {
                    new_root = HashOut {
                        elements: [F::ZERO; 4],
                    };
                    SetMode::DeleteLast
                }
            }
            Some((found_key, _, found_old_val_h, found_val)) => {
                ins_key = Some(found_key);
                ins_value = found_val;
                if value.is_zero() {
                    SetMode::ZeroToZero
                } else {
                    let mut node = [F::ZERO; 8];
                    let mut level2 = level + 1;
                    let found_keys = found_key.split();
                    while keys[level2 as usize] == found_keys[level2 as usize] {
                        level2 += 1;
                    }
                    let old_key = found_key.remove_key_bits(level2 as usize + 1);
                    let old_leaf_hash = self.hash_key_hash(old_key, found_old_val_h);

                    let new_key = key.remove_key_bits(level2 as usize + 1);
                    let new_val_h = self.hash0(f2limbs(value));
                    let new_leaf_hash = self.hash_key_hash(new_key, new_val_h);

                    let b = keys[level2 as usize] as usize * 4;
                    let bb = found_keys[level2 as usize] as usize * 4;
                    node[b..b + 4].copy_from_slice(&new_leaf_hash);
                    node[bb..bb + 4].copy_from_slice(&old_leaf_hash);

                    let mut r2 = self.hash0(node);
                    level2 -= 1;

                    while level2 != level {
                        node = [F::ZERO; 8];
                        let b = keys[level2 as usize] as usize * 4;
                        node[b..b + 4].copy_from_slice(&r2);

                        r2 = self.hash0(node);
                        level2 -= 1;
                    }

                    if level >= 0 {
                        siblings[level as usize].set_quad(keys[level as usize] as usize, r2);
                    } else {
                        new_root = HashOut { elements: r2 };
                    }
                    SetMode::InsertFound
                }
            }
            None if value.is_zero() => SetMode::ZeroToZero,
            None => {
                let new_key = key.remove_key_bits((level + 1) as usize);
                let new_val_h = self.hash0(f2limbs(value));
                let new_leaf_hash = self.hash_key_hash(new_key, new_val_h);

                if level >= 0 {
                    siblings[level as usize].set_quad(keys[level as usize] as usize, new_leaf_hash);
                } else {
                    new_root = HashOut {
                        elements: new_leaf_hash,
                    };
                }
                SetMode::InsertNotFound
            }
        };

        if mode != SetMode::ZeroToZero {
            siblings.truncate((level + 1) as usize);
            while level >= 0 {
                new_root = HashOut {
                    elements: poseidon4(siblings[level as usize].0),
                };
                self.db
                    .set_node(Key(new_root.elements), siblings[level as usize]);
                level -= 1;
                if level >= 0 {
                    let l = level as usize;
                    siblings[l].set_quad(keys[l] as usize, new_root.elements);
                }
            }
        }
        self.root = new_root;
        trace!("SMT set {:?} -> {:?} ({:?})", key, value, mode);

        Ok(SmtSetResult {
            old_root,
            new_root,
            key,
            siblings: visited,
            ins_key,
            ins_value,
            is_old0,
            old_value,
            new_value: value,
            mode,
        })
    }

    /// Delete the key in the SMT.
    pub fn delete(&mut self, key: Key) -> Result<SmtSetResult, SmtError> {
        self.set(key, U256::zero())
    }
}
