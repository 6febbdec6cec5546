//! The unconfirmed-transaction pool (`spec.md` §4.6): admission, the orphan
//! pool for transactions seen before their parent, and the event stream the
//! synchroniser and wallet indexer subscribe to.
//!
//! This crate holds no chain state of its own — it borrows a `UtxoSource`
//! for lookups and calls into `solidus_consensus::validate_transaction` for
//! every admission decision, the same validator a connecting block uses.

pub mod entry;
pub mod error;
pub mod orphan;
pub mod pool;

pub use entry::{MempoolEntry, MempoolEvent, TxDesc};
pub use error::MempoolError;
pub use pool::Mempool;
