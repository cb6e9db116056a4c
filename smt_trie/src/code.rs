//! Linear Poseidon hash over byte strings, as used by Hermez for contract
//! bytecode and by the main state machine for its `P` hash address space.
//! See `hashContractBytecode()` in <https://github.com/0xPolygonHermez/zkevm-commonjs/blob/main/src/smt-utils.js>.
use ethereum_types::U256;
use plonky2::field::types::Field;
use plonky2::hash::poseidon::{self, Poseidon};

use crate::smt::{HashOut, F};
use crate::utils::hashout2u;

/// Bytes absorbed per permutation: each rate element carries 7 bytes.
const BYTES_PER_BLOCK: usize = poseidon::SPONGE_RATE * 7;

/// Pads a copy of `bytes` and hashes it.
pub fn poseidon_linear_hash(bytes: &[u8]) -> HashOut {
    let mut padded = bytes.to_vec();
    poseidon_pad_byte_vec(&mut padded);
    poseidon_hash_padded_byte_vec(&padded)
}

/// [`poseidon_linear_hash`] packed as a `U256`, one 64-bit limb per element.
pub fn poseidon_linear_hash_u256(bytes: &[u8]) -> U256 {
    hashout2u(poseidon_linear_hash(bytes))
}

/// Hashes an already padded byte string (length multiple of 56).
pub fn poseidon_hash_padded_byte_vec(bytes: &[u8]) -> HashOut {
    let mut capacity = [F::ZERO; poseidon::SPONGE_CAPACITY];
    let mut state = [F::ZERO; poseidon::SPONGE_WIDTH];
    for block in bytes.chunks_exact(BYTES_PER_BLOCK) {
        for (slot, chunk) in state[..poseidon::SPONGE_RATE]
            .iter_mut()
            .zip(block.chunks_exact(7))
        {
            let mut limb = [0u8; 8];
            limb[..7].copy_from_slice(chunk);
            *slot = F::from_canonical_u64(u64::from_le_bytes(limb));
        }
        state[poseidon::SPONGE_RATE..].copy_from_slice(&capacity);
        let out = F::poseidon(state);
        capacity.copy_from_slice(&out[..poseidon::SPONGE_CAPACITY]);
    }
    HashOut { elements: capacity }
}

/// Appends `0x01`, zero-fills to a multiple of 56 bytes and sets the top bit
/// of the last byte.
pub fn poseidon_pad_byte_vec(bytes: &mut Vec<u8>) {
    bytes.push(0x01);
    while bytes.len() % BYTES_PER_BLOCK != 0 {
        bytes.push(0x00);
    }
    if let Some(last) = bytes.last_mut() {
        *last |= 0x80;
    }
}
