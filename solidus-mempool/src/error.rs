//! Errors `Mempool::process_tx` can return. Distinct from
//! `solidus_consensus::TransactionError`, which this crate wraps as the
//! reason a transaction was rejected outright.

use solidus_chain::entry::EntryId;
use solidus_chain::transaction::Hash as TxHash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("transaction {0} is already in the pool")]
    AlreadyPresent(TxHash),
    #[error("transaction {0} was recently rejected and is suppressed by the reject cache")]
    RecentlyRejected(TxHash),
    #[error("transaction conflicts with pool transaction spending output {0}")]
    Conflict(EntryId),
    #[error(transparent)]
    Invalid(#[from] solidus_consensus::TransactionError),
}
