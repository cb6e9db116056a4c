//! A Polygon Hermez sparse Merkle tree over the Goldilocks field.
//!
//! Nodes are hashed with Poseidon and kept in a content-addressed [`db::Db`],
//! so any historical root stays addressable: the tree can be positioned on an
//! arbitrary `old_root` before a `set`, which is how the main state machine
//! drives its state backend. Every `set` reports a [`smt::SmtSetResult`]
//! describing what happened to the tree (see [`smt::SetMode`]).

#![allow(clippy::too_long_first_doc_paragraph)]

pub mod code;
pub mod db;
pub mod keys;
pub mod smt;
pub mod utils;
