use ethereum_types::U256;
use num_bigint::BigInt;
use smt_trie::smt::SmtError;
use thiserror::Error;

use crate::hash::HashSpace;

/// Result of an operation on the execution context. Returns a
/// [ContextError] upon failure.
pub type ContextResult<T> = Result<T, ContextError>;

/// An invariant of the execution context was broken.
///
/// Every variant denotes either a malformed program or an internal bug;
/// none is recoverable, and the run that hit it must be aborted.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ContextError {
    /// A byte was written to a hash whose length is already final.
    #[error("hash{space} {id}: write after the length was finalized")]
    HashAlreadyFinalized { space: HashSpace, id: u64 },

    /// The length of a hash was declared twice.
    #[error("hash{space} {id}: length already finalized")]
    AlreadyFinalized { space: HashSpace, id: u64 },

    #[error("hash{space} {id}: declared length {declared} but {actual} bytes were written")]
    LengthMismatch {
        space: HashSpace,
        id: u64,
        declared: u64,
        actual: u64,
    },

    /// A digest or a read was requested before the length was declared.
    #[error("hash{space} {id}: length not finalized")]
    NotFinalized { space: HashSpace, id: u64 },

    #[error("hash{space} {id}: read of {len} bytes at offset {offset} exceeds length {size}")]
    OutOfRange {
        space: HashSpace,
        id: u64,
        offset: u64,
        len: u64,
        size: u64,
    },

    /// A write disagrees with a byte written earlier at the same position.
    #[error("hash{space} {id}: byte {pos} is {existing:#04x} but {written:#04x} was written")]
    ByteMismatch {
        space: HashSpace,
        id: u64,
        pos: u64,
        existing: u8,
        written: u8,
    },

    /// A write starts past the end of the bytes accumulated so far.
    #[error("hash{space} {id}: write at offset {offset} leaves a gap after {size} bytes")]
    WriteGap {
        space: HashSpace,
        id: u64,
        offset: u64,
        size: u64,
    },

    #[error("hash{space} {id}: digest is {computed:#x} but the program claims {claimed:#x}")]
    DigestMismatch {
        space: HashSpace,
        id: u64,
        computed: U256,
        claimed: U256,
    },

    #[error("ECRecover precalc buffer is full ({capacity} elements)")]
    BufferFull { capacity: usize },

    #[error("ECRecover precalc buffer is already filled")]
    AlreadyFilled,

    #[error("ECRecover precalc buffer read before being filled")]
    NotFilled,

    #[error("ECRecover precalc buffer exhausted after {pos} elements")]
    BufferExhausted { pos: usize },

    /// A storage access was recorded or queried outside of any call context.
    #[error("no active call context")]
    NoActiveContext,

    /// Value was created or destroyed: transfers do not net to zero.
    #[error("transferred balance does not net to zero (residual {residual})")]
    BalanceConservationViolation { residual: BigInt },

    #[error("degenerate elliptic curve addition: {reason}")]
    DegenerateAddition { reason: &'static str },

    #[error("limb {index} of a wide value holds {limb:#x}, which does not fit in 32 bits")]
    InvalidFea { index: usize, limb: u64 },

    #[error("{value:#x} is not a canonical element of the {field} field")]
    NonCanonical { field: &'static str, value: U256 },

    #[error("variable `{0}` is already declared")]
    VariableRedeclared(String),

    #[error("step {step} is outside of the evaluation domain of size {domain_size}")]
    StepOutOfDomain { step: u64, domain_size: u64 },

    #[error("zkPC {zkpc} is outside of a ROM of {rom_len} instructions")]
    ProgramCounterOutOfRange { zkpc: u64, rom_len: u64 },

    #[error("state backend: {0}")]
    HashDb(#[from] SmtError),
}

/// A [ContextError] together with the position of the step that raised it,
/// as surfaced to the caller of the interpreter.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("step {step} (zkPC {zkpc}{}): {source}", fmt_location(.location))]
pub struct StepFailure {
    pub step: u64,
    pub zkpc: u64,
    /// Source location of the ROM instruction, when the ROM knows it.
    pub location: Option<String>,
    pub source: ContextError,
}

fn fmt_location(location: &Option<String>) -> String {
    location
        .as_ref()
        .map(|l| format!(" at {l}"))
        .unwrap_or_default()
}
