//! `MempoolEntry` and the events a pool transition emits (`spec.md` §4.6).

use chrono::{DateTime, Utc};
use solidus_chain::transaction::Transaction;
use std::sync::Arc;

/// A transaction admitted to the pool, plus the bookkeeping the eviction
/// and mining-template logic need (`spec.md` §3 `MempoolEntry`).
#[derive(Clone, Debug)]
pub struct MempoolEntry {
    pub tx: Arc<Transaction>,
    pub added_time: DateTime<Utc>,
    /// Serialized size in bytes, doubling as the fee-rate denominator.
    pub weight: usize,
    /// Native-asset fee this transaction pays.
    pub fee: u64,
    /// Set when this entry failed VM validation but its native-asset spend
    /// alone covered storage gas (S4): it can ride into a block with
    /// status=fail, but a miner gains nothing by including it.
    pub gas_only: bool,
}

impl MempoolEntry {
    pub fn fee_per_byte(&self) -> f64 {
        if self.weight == 0 {
            0.0
        } else {
            self.fee as f64 / self.weight as f64
        }
    }
}

/// A transaction plus the fields the synchroniser needs to announce it and
/// the wallet indexer needs to annotate it, broadcast as part of a
/// `MempoolEvent` (`spec.md` §4.6 `TxDesc`).
#[derive(Clone, Debug)]
pub struct TxDesc {
    pub tx: Arc<Transaction>,
    pub added_time: DateTime<Utc>,
    pub fee: u64,
    pub weight: usize,
}

impl From<&MempoolEntry> for TxDesc {
    fn from(entry: &MempoolEntry) -> TxDesc {
        TxDesc {
            tx: entry.tx.clone(),
            added_time: entry.added_time,
            fee: entry.fee,
            weight: entry.weight,
        }
    }
}

/// The single-channel event stream subscribers (synchroniser, wallet
/// indexer) observe (`spec.md` §4.6).
#[derive(Clone, Debug)]
pub enum MempoolEvent {
    NewTx(TxDesc),
    RemoveTx(solidus_chain::transaction::Hash),
}
