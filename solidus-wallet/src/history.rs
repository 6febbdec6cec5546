//! Annotated transaction history and the unconfirmed-tx table (`spec.md` §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solidus_chain::block::Height;
use solidus_chain::transaction::Hash as TxHash;

/// A transaction as the wallet recalls it: its block position once
/// confirmed, and the fee it paid. Serves both the confirmed history
/// (keyed by `(block_height, block_position)` and by tx id) and the
/// unconfirmed table (keyed by tx id alone, `block_height`/`block_position`
/// left `None`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotatedTx {
    pub tx_id: TxHash,
    pub block_height: Option<Height>,
    pub block_position: Option<usize>,
    pub fee: u64,
    pub seen_at: DateTime<Utc>,
}
