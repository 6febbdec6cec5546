//! Blocks and block-related structures.

mod hash;
mod header;
mod height;

pub mod merkle;

pub use hash::Hash;
pub use header::{BlockTimeError, CountedHeader, Header};
pub use height::Height;

use crate::codec::{CodecError, Decode, Encode};
use crate::compactint::CompactInt;
use crate::transaction::Transaction;
use std::sync::Arc;
use wire_derive::Encode as DeriveEncode;

/// Maximum encoded block size, shared with `spec.md`'s `MaxBlockSize` (I-B7);
/// used here only as a decode-time sanity bound, the consensus-critical
/// check lives in `solidus-consensus`.
pub const MAX_BLOCK_BYTES: u64 = 4_000_000;

/// A block: a header plus the transactions it commits to.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Decode for Block {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        let header = Header::decode(&mut reader)?;
        let tx_count = CompactInt::decode(&mut reader)?.value();
        if tx_count > MAX_BLOCK_BYTES / (36 * 4) {
            return Err(CodecError::Parse(
                "block declares more transactions than could fit with one input each",
            ));
        }
        let mut transactions = Vec::with_capacity(std::cmp::min(tx_count as usize, 1024));
        for _ in 0..tx_count {
            transactions.push(Arc::new(Transaction::decode(&mut reader)?));
        }
        Ok(Block {
            header,
            transactions,
        })
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.header.height)
            .field("hash", &self.hash())
            .finish()
    }
}

impl Block {
    pub fn hash(&self) -> Hash {
        Hash::from(&self.header)
    }

    pub fn height(&self) -> Height {
        self.header.height
    }

    /// The block's single coinbase transaction, if its first transaction
    /// is one (I-T1: coinbase is only permitted in the first position).
    pub fn coinbase_transaction(&self) -> Option<&Arc<Transaction>> {
        self.transactions.get(0).filter(|tx| tx.is_coinbase())
    }

    pub fn transaction_hashes(&self) -> Vec<crate::transaction::Hash> {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }
}
