//! The orphan pool: transactions seen before the output they spend
//! (`spec.md` §4.6 `ProcessOrphans`/`ExpireOrphan`).

use chrono::{DateTime, Utc};
use solidus_chain::entry::EntryId;
use solidus_chain::transaction::{Hash as TxHash, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct OrphanEntry {
    pub tx: Arc<Transaction>,
    pub missing_output: EntryId,
    pub expires_at: DateTime<Utc>,
}

/// Transactions waiting on a parent output that is neither in the UTXO set
/// nor yet in the pool, indexed by the first missing output id so that a
/// single new arrival can retry everyone waiting on it.
#[derive(Default)]
pub struct OrphanPool {
    entries: HashMap<TxHash, OrphanEntry>,
    waiting_on: HashMap<EntryId, Vec<TxHash>>,
}

impl OrphanPool {
    pub fn insert(&mut self, tx: Arc<Transaction>, missing_output: EntryId, expires_at: DateTime<Utc>) {
        let tx_hash = tx.hash();
        self.waiting_on.entry(missing_output).or_default().push(tx_hash);
        self.entries.insert(
            tx_hash,
            OrphanEntry {
                tx,
                missing_output,
                expires_at,
            },
        );
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.entries.contains_key(tx_hash)
    }

    fn remove(&mut self, tx_hash: &TxHash) -> Option<OrphanEntry> {
        let entry = self.entries.remove(tx_hash)?;
        if let Some(waiters) = self.waiting_on.get_mut(&entry.missing_output) {
            waiters.retain(|h| h != tx_hash);
            if waiters.is_empty() {
                self.waiting_on.remove(&entry.missing_output);
            }
        }
        Some(entry)
    }

    /// Takes every orphan waiting on `output_id`, removing them from the
    /// pool; the caller retries each one through `Mempool::process_tx`.
    pub fn take_waiting_on(&mut self, output_id: &EntryId) -> Vec<Arc<Transaction>> {
        let waiters = self.waiting_on.remove(output_id).unwrap_or_default();
        waiters
            .into_iter()
            .filter_map(|tx_hash| self.remove(&tx_hash).map(|entry| entry.tx))
            .collect()
    }

    /// Drops every orphan whose expiry has passed, returning how many were evicted.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<TxHash> = self
            .entries
            .values()
            .filter(|entry| entry.expires_at < now)
            .map(|entry| entry.tx.hash())
            .collect();
        let count = expired.len();
        for tx_hash in expired {
            self.remove(&tx_hash);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::amount::{AssetAmount, AssetId};
    use solidus_chain::transaction::TimeRange;
    use solidus_chain::txio::{ControlProgram, TxInput, TxOutput};

    fn tx_spending(output_id: EntryId) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 10),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: ControlProgram::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 9), ControlProgram::trivial_true())],
        ))
    }

    #[test]
    fn an_orphan_is_retried_once_its_parent_output_arrives() {
        let missing = EntryId([3u8; 32]);
        let mut pool = OrphanPool::default();
        let tx = tx_spending(missing);
        pool.insert(tx.clone(), missing, Utc::now() + chrono::Duration::hours(1));
        assert_eq!(pool.len(), 1);

        let retried = pool.take_waiting_on(&missing);
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].hash(), tx.hash());
        assert!(pool.is_empty());
    }

    #[test]
    fn expired_orphans_are_dropped() {
        let missing = EntryId([4u8; 32]);
        let mut pool = OrphanPool::default();
        pool.insert(tx_spending(missing), missing, Utc::now() - chrono::Duration::seconds(1));
        assert_eq!(pool.expire(Utc::now()), 1);
        assert!(pool.is_empty());
    }
}
