//! Field types of the main state machine and the eight-limb wide value.
//!
//! The trace lives in the Goldilocks field; signature recovery works over
//! the secp256k1 base and scalar fields. The three are distinct types and
//! values only move between them through the explicit conversions below.

use ethereum_types::U256;
use num_bigint::BigUint;
use plonky2::field::goldilocks_field::GoldilocksField;
use plonky2::field::secp256k1_base::Secp256K1Base;
use plonky2::field::secp256k1_scalar::Secp256K1Scalar;
use plonky2::field::types::{Field, PrimeField, PrimeField64};
use smt_trie::utils::{f2limbs, limbs2f};

use crate::errors::{ContextError, ContextResult};

/// Trace field.
pub type F = GoldilocksField;
/// Base field of the signature curve.
pub type Fec = Secp256K1Base;
/// Scalar field of the signature curve.
pub type Fnec = Secp256K1Scalar;

/// A 256-bit value spread over eight field elements of 32 bits each, least
/// significant limb first. This is the unit of memory storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Fea(pub [F; 8]);

impl Default for Fea {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Fea {
    pub const ZERO: Self = Fea([F::ZERO; 8]);

    pub fn from_u256(x: U256) -> Self {
        Fea(f2limbs(x))
    }

    /// Packs the limbs back into a `U256`. Fails if a limb holds more than
    /// 32 bits, since such an `Fea` has no integer counterpart.
    pub fn to_u256(&self) -> ContextResult<U256> {
        if let Some((index, limb)) = self
            .0
            .iter()
            .enumerate()
            .find(|(_, l)| l.to_canonical_u64() > u32::MAX as u64)
        {
            return Err(ContextError::InvalidFea {
                index,
                limb: limb.to_canonical_u64(),
            });
        }
        Ok(limbs2f(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(F::is_zero)
    }
}

impl From<U256> for Fea {
    fn from(x: U256) -> Self {
        Self::from_u256(x)
    }
}

pub(crate) fn u256_to_biguint(x: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    x.to_little_endian(&mut bytes);
    BigUint::from_bytes_le(&bytes)
}

pub(crate) fn biguint_to_u256(x: &BigUint) -> U256 {
    U256::from_little_endian(&x.to_bytes_le())
}

fn canonical<T: PrimeField>(x: U256, field: &'static str) -> ContextResult<T> {
    let n = u256_to_biguint(x);
    if n >= T::order() {
        return Err(ContextError::NonCanonical { field, value: x });
    }
    Ok(T::from_noncanonical_biguint(n))
}

/// Interprets `x` as an element of the curve base field. `x` must already
/// be reduced.
pub fn u256_to_fec(x: U256) -> ContextResult<Fec> {
    canonical(x, "secp256k1 base")
}

/// Interprets `x` as an element of the curve scalar field. `x` must already
/// be reduced.
pub fn u256_to_fnec(x: U256) -> ContextResult<Fnec> {
    canonical(x, "secp256k1 scalar")
}

pub fn fec_to_u256(x: Fec) -> U256 {
    biguint_to_u256(&x.to_canonical_biguint())
}

pub fn fnec_to_u256(x: Fnec) -> U256 {
    biguint_to_u256(&x.to_canonical_biguint())
}
