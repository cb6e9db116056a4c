//! Elliptic curve helpers of signature recovery: a single-slot cache of the
//! last point addition and the precomputation buffer of point multiples.

use log::trace;
use plonky2::field::ops::Square;
use plonky2::field::types::Field;

use crate::errors::{ContextError, ContextResult};
use crate::fea::Fec;

/// Operands of an affine addition `[x3, y3] = [x1, y1] + [x2, y2]`, or of a
/// doubling of `[x1, y1]` when `double` is set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EcAddInput {
    pub x1: Fec,
    pub y1: Fec,
    pub x2: Fec,
    pub y2: Fec,
    pub double: bool,
}

/// Curve addition algorithm used on a cache miss.
pub trait CurveAdder {
    fn add(&self, input: &EcAddInput) -> ContextResult<(Fec, Fec)>;
}

/// Affine chord-and-tangent addition on secp256k1 (`y^2 = x^3 + 7`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Adder;

impl CurveAdder for Secp256k1Adder {
    fn add(&self, input: &EcAddInput) -> ContextResult<(Fec, Fec)> {
        let EcAddInput {
            x1, y1, x2, y2, ..
        } = *input;
        let (lambda, x2) = if input.double {
            let inv = y1
                .double()
                .try_inverse()
                .ok_or(ContextError::DegenerateAddition {
                    reason: "doubling a point with y = 0",
                })?;
            (Fec::from_canonical_u64(3) * x1.square() * inv, x1)
        } else {
            let inv = (x2 - x1)
                .try_inverse()
                .ok_or(ContextError::DegenerateAddition {
                    reason: "adding two points with the same x",
                })?;
            ((y2 - y1) * inv, x2)
        };
        let x3 = lambda.square() - x1 - x2;
        let y3 = lambda * (x1 - x3) - y1;
        Ok((x3, y3))
    }
}

/// The last curve addition and its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EcAddCache {
    last: Option<(EcAddInput, Fec, Fec)>,
}

impl EcAddCache {
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns `(x3, y3)` if `input` is bit-for-bit the last stored input,
    /// doubling flag included.
    pub fn try_reuse(&self, input: &EcAddInput) -> Option<(Fec, Fec)> {
        match self.last {
            Some((last, x3, y3)) if last == *input => Some((x3, y3)),
            _ => None,
        }
    }

    pub fn store(&mut self, input: EcAddInput, x3: Fec, y3: Fec) {
        self.last = Some((input, x3, y3));
    }

    /// Looks `input` up, falling back to `adder` and caching its result.
    pub fn get_or_add<A: CurveAdder>(
        &mut self,
        adder: &A,
        input: EcAddInput,
    ) -> ContextResult<((Fec, Fec), bool)> {
        if let Some(p) = self.try_reuse(&input) {
            trace!("EC addition served from cache");
            return Ok((p, true));
        }
        let (x3, y3) = adder.add(&input)?;
        self.store(input, x3, y3);
        Ok(((x3, y3), false))
    }
}

/// Most components a single ECRecover can precompute.
pub const ECRECOVER_PRECALC_CAPACITY: usize = 2 + 256 * 4;

/// Table of curve point multiples built once, then replayed in order, by
/// one signature recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcRecoverPrecalcBuffer {
    filled: bool,
    buffer: Vec<Fec>,
    pos_used: usize,
}

impl Default for EcRecoverPrecalcBuffer {
    fn default() -> Self {
        Self {
            filled: false,
            buffer: Vec::with_capacity(ECRECOVER_PRECALC_CAPACITY),
            pos_used: 0,
        }
    }
}

impl EcRecoverPrecalcBuffer {
    pub fn reset(&mut self) {
        self.filled = false;
        self.buffer.clear();
        self.pos_used = 0;
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Write cursor: number of elements appended.
    pub fn pos(&self) -> usize {
        self.buffer.len()
    }

    /// Read cursor: number of elements replayed.
    pub fn pos_used(&self) -> usize {
        self.pos_used
    }

    pub fn append(&mut self, element: Fec) -> ContextResult<()> {
        if self.filled {
            return Err(ContextError::AlreadyFilled);
        }
        if self.buffer.len() == ECRECOVER_PRECALC_CAPACITY {
            return Err(ContextError::BufferFull {
                capacity: ECRECOVER_PRECALC_CAPACITY,
            });
        }
        self.buffer.push(element);
        Ok(())
    }

    /// Freezes the buffer; it is read-only until the next reset.
    pub fn mark_filled(&mut self) {
        self.filled = true;
    }

    pub fn next(&mut self) -> ContextResult<Fec> {
        if !self.filled {
            return Err(ContextError::NotFilled);
        }
        let element = *self
            .buffer
            .get(self.pos_used)
            .ok_or(ContextError::BufferExhausted {
                pos: self.buffer.len(),
            })?;
        self.pos_used += 1;
        Ok(element)
    }
}
