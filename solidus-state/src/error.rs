//! Errors this crate's own operations can produce, re-exported alongside
//! the finer-grained `UtxoError`/`StoreError` they wrap.

use crate::store::StoreError;
use crate::utxo::UtxoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Utxo(#[from] UtxoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
