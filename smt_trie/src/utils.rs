use ethereum_types::U256;
use plonky2::field::types::{Field, PrimeField64};
use plonky2::hash::poseidon::Poseidon;

use crate::smt::{HashOut, Key, Node, F};

/// Runs the Poseidon permutation on `input` and keeps the first four
/// elements, which is how every node hash of the tree is taken.
pub fn poseidon4(input: [F; 12]) -> [F; 4] {
    let out = F::poseidon(input);
    std::array::from_fn(|i| out[i])
}

/// Returns `Poseidon(x, [0,0,0,0])`.
pub(crate) fn hash0(x: [F; 8]) -> [F; 4] {
    poseidon4(std::array::from_fn(|i| if i < 8 { x[i] } else { F::ZERO }))
}

/// Returns `Poseidon(x, [1,0,0,0])`.
pub(crate) fn hash1(x: [F; 8]) -> [F; 4] {
    poseidon4(std::array::from_fn(|i| match i {
        j if j < 8 => x[j],
        8 => F::ONE,
        _ => F::ZERO,
    }))
}

/// Returns `Poseidon(key || h, [1,0,0,0])`.
pub(crate) fn hash_key_hash(k: Key, h: [F; 4]) -> [F; 4] {
    hash1(std::array::from_fn(
        |i| if i < 4 { k.0[i] } else { h[i - 4] },
    ))
}

/// Splits a `U256` into eight 32-bit limbs, least significant first.
pub fn f2limbs(x: U256) -> [F; 8] {
    std::array::from_fn(|i| F::from_canonical_u32((x >> (32 * i)).low_u32()))
}

/// Packs eight 32-bit limbs, least significant first, into a `U256`.
/// Limbs are not range checked here.
pub fn limbs2f(limbs: [F; 8]) -> U256 {
    limbs
        .into_iter()
        .enumerate()
        .fold(U256::zero(), |acc, (i, x)| {
            acc + (U256::from(x.to_canonical_u64()) << (i * 32))
        })
}

/// Converts a `Key` to a `U256`, one 64-bit limb per element.
pub fn key2u(key: Key) -> U256 {
    U256(key.0.map(|x| x.to_canonical_u64()))
}

/// Converts a `HashOut` to a `U256`.
pub fn hashout2u(h: HashOut) -> U256 {
    key2u(Key(h.elements))
}

/// Given an internal node, returns the index of its unique non-zero child,
/// or `None` if there is not exactly one.
pub(crate) fn unique_sibling(node: &Node) -> Option<usize> {
    let non_zero: Vec<usize> = (0..3)
        .filter(|&i| !node.quad(i).iter().all(F::is_zero))
        .collect();
    match non_zero.as_slice() {
        [i] => Some(*i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limbs_round_trip_max() {
        let x = U256::MAX;
        assert!(f2limbs(x)
            .iter()
            .all(|l| l.to_canonical_u64() == u32::MAX as u64));
        assert_eq!(limbs2f(f2limbs(x)), x);
    }

    #[test]
    fn unique_sibling_of_single_child() {
        let mut node = Node([F::ZERO; 12]);
        assert_eq!(unique_sibling(&node), None);
        node.0[5] = F::ONE;
        assert_eq!(unique_sibling(&node), Some(1));
        node.0[0] = F::ONE;
        assert_eq!(unique_sibling(&node), None);
    }
}
