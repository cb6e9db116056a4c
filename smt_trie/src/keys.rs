//! Derivation of state tree keys for account fields and storage slots.
//! See <https://github.com/0xPolygonHermez/zkevm-commonjs/blob/main/src/smt-utils.js> for reference implementation.
//!
//! A key is `Poseidon(kin1)[0..4]`, where `kin1` holds the account address,
//! the kind of leaf and, as capacity, `Poseidon(kin0)[0..4]`. For storage
//! slots `kin0` holds the slot; for every other kind it is all zeros. The
//! main state machine keeps both inputs around because the storage write
//! cache is keyed on them.
use ethereum_types::{Address, U256};
use plonky2::field::types::Field;

use crate::smt::{Key, F};
use crate::utils::{f2limbs, poseidon4};

pub const SMT_KEY_BALANCE: u64 = 0;
pub const SMT_KEY_NONCE: u64 = 1;
pub const SMT_KEY_CODE: u64 = 2;
pub const SMT_KEY_STORAGE: u64 = 3;
pub const SMT_KEY_LENGTH: u64 = 4;

/// Both Poseidon inputs of a key, and the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInputs {
    pub kin0: [F; 12],
    pub kin1: [F; 12],
    pub key: Key,
}

fn address_limbs(addr: Address) -> [F; 5] {
    std::array::from_fn(|i| {
        let b = &addr.0[16 - 4 * i..20 - 4 * i];
        F::from_canonical_u32(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    })
}

fn key_inputs(addr: Address, kind: u64, kin0: [F; 12]) -> KeyInputs {
    let mut kin1 = [F::ZERO; 12];
    kin1[..5].copy_from_slice(&address_limbs(addr));
    kin1[6] = F::from_canonical_u64(kind);
    kin1[8..].copy_from_slice(&poseidon4(kin0));
    KeyInputs {
        kin0,
        kin1,
        key: Key(poseidon4(kin1)),
    }
}

pub fn balance_key_inputs(addr: Address) -> KeyInputs {
    key_inputs(addr, SMT_KEY_BALANCE, [F::ZERO; 12])
}

pub fn nonce_key_inputs(addr: Address) -> KeyInputs {
    key_inputs(addr, SMT_KEY_NONCE, [F::ZERO; 12])
}

pub fn code_key_inputs(addr: Address) -> KeyInputs {
    key_inputs(addr, SMT_KEY_CODE, [F::ZERO; 12])
}

pub fn code_length_key_inputs(addr: Address) -> KeyInputs {
    key_inputs(addr, SMT_KEY_LENGTH, [F::ZERO; 12])
}

pub fn storage_key_inputs(addr: Address, slot: U256) -> KeyInputs {
    let mut kin0 = [F::ZERO; 12];
    kin0[..8].copy_from_slice(&f2limbs(slot));
    key_inputs(addr, SMT_KEY_STORAGE, kin0)
}

pub fn key_balance(addr: Address) -> Key {
    balance_key_inputs(addr).key
}

pub fn key_nonce(addr: Address) -> Key {
    nonce_key_inputs(addr).key
}

pub fn key_code(addr: Address) -> Key {
    code_key_inputs(addr).key
}

pub fn key_code_length(addr: Address) -> Key {
    code_length_key_inputs(addr).key
}

pub fn key_storage(addr: Address, slot: U256) -> Key {
    storage_key_inputs(addr, slot).key
}
