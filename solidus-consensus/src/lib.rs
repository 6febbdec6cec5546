//! Transaction and block validation (`spec.md` §4.5): the rules that turn a
//! `solidus-chain` `Transaction`/`Block` plus a `solidus-state` `UtxoView`
//! into an accept/reject decision, executing `solidus-vm` programs along
//! the way.
//!
//! This crate owns no storage of its own; callers supply the `UtxoView`
//! and `BlockIndex` to validate against and decide what to do with a
//! successful result (commit the overlay, advance the tip, broadcast).

pub mod block;
pub mod chain;
pub mod error;
pub mod gas;
pub mod transaction;

pub use block::{validate_block, BlockValidation};
pub use chain::{Chain, ChainError, ChainEvent};
pub use error::{BlockError, BlockErrorAt, ErrorKind, TransactionError};
pub use gas::GasState;
pub use transaction::validate_transaction;
