//! Execution context of the zkEVM main state machine.
//!
//! The main state machine interprets a ROM program step by step, filling one
//! row of the execution trace per step. Between steps it keeps the state
//! gathered in [`ExecutionContext`]:
//!
//! - the keccak and poseidon hash accumulators ([`hash`]), where preimages are
//!   written piecewise, their length declared, then digested;
//! - the single-slot cache of the last state tree write
//!   ([`storage_cache`]), so that a step evaluated several times hits the
//!   state backend only once;
//! - the secp256k1 addition cache and the ECRecover precomputation buffer
//!   ([`ec`]);
//! - the per-call warm storage sets ([`access`]);
//! - the transferred-balance accumulator checked at conservation checkpoints
//!   ([`balance`]);
//! - the ROM-visible memory and variables ([`memory`]).
//!
//! The program, the trace, the state backend and the input request are
//! supplied by the interpreter through the traits in [`collaborators`].
//! A context is single-threaded; parallel runs each own a context.

pub mod access;
pub mod balance;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod ec;
pub mod errors;
pub mod fea;
pub mod hash;
pub mod memory;
pub mod storage_cache;
pub mod testing_utils;

pub use config::ContextConfig;
pub use context::ExecutionContext;
pub use errors::{ContextError, ContextResult, StepFailure};
pub use hash::HashSpace;
