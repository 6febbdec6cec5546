//! The chain's durable and in-memory state: the UTXO view and its
//! apply/detach semantics, the block index and fork-choice bookkeeping, and
//! the on-disk store they are checkpointed into (`spec.md` §1(a), §1(c),
//! §4.3, §4.4, §4.6).
//!
//! This crate has no validation logic of its own — `solidus-consensus`
//! decides whether a block or transaction is acceptable; this crate only
//! knows how to apply, detach, and persist whatever it is told to.

pub mod block_index;
pub mod error;
pub mod store;
pub mod utxo;

pub use block_index::{BlockIndex, BlockNode};
pub use error::StateError;
pub use store::{SharedStore, Store, StoreError, WriteBatch};
pub use utxo::{UtxoEntry, UtxoError, UtxoSource, UtxoView};
