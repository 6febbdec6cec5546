//! Core consensus types shared by every Solidus crate: the entity graph,
//! transactions, blocks, amounts, and the canonical wire encoding they are
//! all expressed in terms of.
//!
//! This crate has no notion of a "current" network or "current" tip; it is
//! pure data and pure functions over that data. Everything stateful (the
//! UTXO set, the block index, validation) lives in `solidus-state` and
//! `solidus-consensus`.

#[macro_use]
mod hash;

pub mod amount;
pub mod block;
pub mod cached;
pub mod codec;
pub mod compactint;
pub mod entry;
pub mod error;
pub mod parameters;
pub mod transaction;
pub mod txio;
pub mod work;

pub use error::ChainError;
