use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::cached::Cached;
use crate::codec::{CodecError, Decode, Encode};
use crate::work::difficulty::CompactDifficulty;
use wire_derive::{Decode as DeriveDecode, Encode as DeriveEncode};

use super::{merkle, Hash, Height};

/// A block header, containing metadata about a block.
///
/// Blocks chain together via the backwards reference (`previous_block_hash`)
/// present in this header; each block points to its parent all the way back
/// to genesis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode, DeriveDecode)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The height of this block (I-B1). Carried explicitly rather than
    /// derived from coinbase data, unlike the upstream Bitcoin convention.
    pub height: Height,

    /// The hash of the previous block (I-B2).
    pub previous_block_hash: Hash,

    /// The Unix timestamp (seconds, UTC) this block was mined at (I-B3).
    pub time: DateTime<Utc>,

    /// The encoded target threshold this header's hash must not exceed (I-B5).
    pub difficulty_threshold: CompactDifficulty,

    /// An arbitrary field miners vary to search for a valid hash.
    pub nonce: u64,

    /// The root of the transaction Merkle tree (I-B4).
    pub merkle_root: merkle::Root,

    /// The root of the per-transaction status Merkle tree (§6).
    pub transaction_status_root: merkle::Root,

    /// An additional per-block random seed, reserved for future PoW
    /// algorithm parameterization; opaque to consensus beyond being hashed.
    pub seed: Hash,

    /// Cached hash of this header; not part of the consensus encoding.
    #[serde(skip)]
    hash: Cached<Hash>,
}

#[derive(Error, Debug)]
pub enum BlockTimeError {
    #[error("block {1:?} ({2:?}) has timestamp {0:?} more than the allowed offset in the future (limit {3:?})")]
    TooFarInFuture(DateTime<Utc>, Height, Hash, DateTime<Utc>),
    #[error("block {1:?} ({2:?}) has timestamp {0:?} not strictly greater than past median time {3:?}")]
    NotAfterMedianTime(DateTime<Utc>, Height, Hash, DateTime<Utc>),
}

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u32,
        height: Height,
        previous_block_hash: Hash,
        time: DateTime<Utc>,
        difficulty_threshold: CompactDifficulty,
        nonce: u64,
        merkle_root: merkle::Root,
        transaction_status_root: merkle::Root,
        seed: Hash,
    ) -> Header {
        Header {
            version,
            height,
            previous_block_hash,
            time,
            difficulty_threshold,
            nonce,
            merkle_root,
            transaction_status_root,
            seed,
            hash: Cached::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }

    /// (I-B3, max-offset half): reject headers timestamped too far in the future.
    pub fn time_is_valid_at(
        &self,
        now: DateTime<Utc>,
        max_time_offset_secs: i64,
        hash: &Hash,
    ) -> Result<(), BlockTimeError> {
        let limit = now
            .checked_add_signed(Duration::seconds(max_time_offset_secs))
            .expect("max time offset does not overflow a DateTime");
        if self.time <= limit {
            Ok(())
        } else {
            Err(BlockTimeError::TooFarInFuture(
                self.time, self.height, *hash, limit,
            ))
        }
    }

    /// (I-B3, past-median half): reject headers at or before the median time
    /// of the last `median_time_blocks` ancestors.
    pub fn time_is_after_median(
        &self,
        median_time: DateTime<Utc>,
        hash: &Hash,
    ) -> Result<(), BlockTimeError> {
        if self.time > median_time {
            Ok(())
        } else {
            Err(BlockTimeError::NotAfterMedianTime(
                self.time, self.height, *hash, median_time,
            ))
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.encode_to_vec_or_panic()
    }

    fn encode_to_vec_or_panic(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out)
            .expect("writing to a Vec is infallible");
        out
    }
}

/// A header paired with the number of transactions in its block, used in the
/// `Headers` wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedHeader {
    pub header: Header,
    pub transaction_count: usize,
}
