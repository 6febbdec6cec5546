//! The mempool itself (`spec.md` §4.6): admission, indexing, and the
//! orphan/reject-cache bookkeeping around `solidus_consensus::validate_transaction`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use tokio::sync::broadcast;

use solidus_chain::amount::AssetId;
use solidus_chain::block::Height;
use solidus_chain::entry::EntryId;
use solidus_chain::parameters::ChainParams;
use solidus_chain::transaction::{Hash as TxHash, Transaction};
use solidus_chain::txio::TxInput;
use solidus_state::{UtxoEntry, UtxoSource, UtxoView};

use crate::entry::{MempoolEntry, MempoolEvent, TxDesc};
use crate::error::MempoolError;
use crate::orphan::OrphanPool;

/// How long an orphan is kept waiting for its missing parent before it's
/// dropped (`spec.md` §4.6 `ExpireOrphan`).
const ORPHAN_EXPIRY: Duration = Duration::minutes(20);

/// Size of the LRU suppressing repeated processing of permanently-invalid
/// transactions (`spec.md` §4.6).
const RECENT_REJECTS_CAPACITY: usize = 10_000;

/// Presents a backing UTXO source overlaid with every output a currently
/// pooled (non-orphan) transaction creates, so a chain of unconfirmed
/// spends validates without waiting for a block.
struct PoolSource<'a, S: UtxoSource> {
    backing: &'a S,
    created: &'a HashMap<EntryId, UtxoEntry>,
}

impl<'a, S: UtxoSource> UtxoSource for PoolSource<'a, S> {
    fn lookup(&self, output_id: &EntryId) -> Option<UtxoEntry> {
        self.created.get(output_id).copied().or_else(|| self.backing.lookup(output_id))
    }
}

pub struct Mempool {
    entries: HashMap<TxHash, MempoolEntry>,
    /// Which pool tx (if any) currently spends a given output, the
    /// duplicate-pool conflict check's index (`spec.md` §4.6).
    spent_by: HashMap<EntryId, TxHash>,
    /// Every output a pooled transaction creates, available to later
    /// pooled spends.
    created: HashMap<EntryId, UtxoEntry>,
    orphans: OrphanPool,
    recent_rejects: LruCache<TxHash, ()>,
    events: broadcast::Sender<MempoolEvent>,
}

impl Default for Mempool {
    fn default() -> Mempool {
        let (events, _) = broadcast::channel(1024);
        Mempool {
            entries: HashMap::new(),
            spent_by: HashMap::new(),
            created: HashMap::new(),
            orphans: OrphanPool::default(),
            recent_rejects: LruCache::new(RECENT_REJECTS_CAPACITY),
            events,
        }
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MempoolEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.entries.contains_key(tx_hash)
    }

    pub fn get(&self, tx_hash: &TxHash) -> Option<&MempoolEntry> {
        self.entries.get(tx_hash)
    }

    /// Entries in fee-per-byte order, highest first — the order the miner
    /// walks when assembling a block template (`spec.md` §4.9).
    pub fn entries_by_fee_rate(&self) -> Vec<&MempoolEntry> {
        let mut entries: Vec<&MempoolEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.fee_per_byte().partial_cmp(&a.fee_per_byte()).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }

    /// The first output a spend input references that is missing from both
    /// `backing` and this pool's own created-output index.
    fn first_missing_parent<S: UtxoSource>(&self, backing: &S, tx: &Transaction) -> Option<EntryId> {
        tx.inputs.iter().find_map(|input| match input {
            TxInput::Spend { output_id, .. } => {
                if self.created.contains_key(output_id) || backing.lookup(output_id).is_some() {
                    None
                } else {
                    Some(*output_id)
                }
            }
            _ => None,
        })
    }

    fn conflicting_spend(&self, tx: &Transaction) -> Option<EntryId> {
        tx.inputs.iter().find_map(|input| match input {
            TxInput::Spend { output_id, .. } if self.spent_by.contains_key(output_id) => Some(*output_id),
            _ => None,
        })
    }

    /// `spec.md` §4.6 `ProcessTx`.
    pub fn process_tx<S: UtxoSource>(
        &mut self,
        params: &ChainParams,
        backing: &S,
        height: Height,
        now: DateTime<Utc>,
        tx: Arc<Transaction>,
    ) -> Result<bool, MempoolError> {
        let tx_hash = tx.hash();
        if self.entries.contains_key(&tx_hash) {
            return Err(MempoolError::AlreadyPresent(tx_hash));
        }
        if self.recent_rejects.contains(&tx_hash) {
            return Err(MempoolError::RecentlyRejected(tx_hash));
        }
        if let Some(conflict) = self.conflicting_spend(&tx) {
            return Err(MempoolError::Conflict(conflict));
        }
        if let Some(missing) = self.first_missing_parent(backing, &tx) {
            self.orphans.insert(tx, missing, now + ORPHAN_EXPIRY);
            return Ok(false);
        }

        let source = PoolSource {
            backing,
            created: &self.created,
        };
        let block_time = now.timestamp().max(0) as u64;
        let mut view = UtxoView::new(&source);
        let gas = match solidus_consensus::validate_transaction(params, &mut view, height, block_time, &tx) {
            Ok(gas) => gas,
            Err(err) => {
                self.recent_rejects.put(tx_hash, ());
                return Err(err.into());
            }
        };

        let fee = tx.native_fee().unwrap_or(0).min(u64::MAX as u128) as u64;
        let entry = MempoolEntry {
            tx: tx.clone(),
            added_time: now,
            weight: tx.serialized_size(),
            fee,
            gas_only: !gas.gas_valid,
        };

        for input in &tx.inputs {
            if let TxInput::Spend { output_id, .. } = input {
                self.spent_by.insert(*output_id, tx_hash);
            }
        }
        if gas.gas_valid {
            for output_id in solidus_chain::entry::output_ids(&tx) {
                self.created.insert(output_id, UtxoEntry::new(output_id, false, height));
            }
        }

        let desc = TxDesc::from(&entry);
        self.entries.insert(tx_hash, entry);
        let _ = self.events.send(MempoolEvent::NewTx(desc));

        self.process_orphans(params, backing, height, now, &tx);
        Ok(true)
    }

    /// `spec.md` §4.6 `ProcessOrphans`: retries every orphan waiting on any
    /// output `tx` just created.
    fn process_orphans<S: UtxoSource>(
        &mut self,
        params: &ChainParams,
        backing: &S,
        height: Height,
        now: DateTime<Utc>,
        tx: &Transaction,
    ) {
        let mut queue: Vec<Arc<Transaction>> = solidus_chain::entry::output_ids(tx)
            .into_iter()
            .flat_map(|output_id| self.orphans.take_waiting_on(&output_id))
            .collect();
        while let Some(candidate) = queue.pop() {
            let hash = candidate.hash();
            match self.process_tx(params, backing, height, now, candidate.clone()) {
                Ok(true) => {
                    queue.extend(
                        solidus_chain::entry::output_ids(&candidate)
                            .into_iter()
                            .flat_map(|output_id| self.orphans.take_waiting_on(&output_id)),
                    );
                }
                Ok(false) | Err(_) => {
                    tracing::trace!(?hash, "retried orphan did not admit");
                }
            }
        }
    }

    /// `spec.md` §4.6 `RemoveTransaction`.
    pub fn remove_transaction(&mut self, tx_hash: &TxHash) -> bool {
        let Some(entry) = self.entries.remove(tx_hash) else {
            return false;
        };
        for input in &entry.tx.inputs {
            if let TxInput::Spend { output_id, .. } = input {
                if self.spent_by.get(output_id) == Some(tx_hash) {
                    self.spent_by.remove(output_id);
                }
            }
        }
        for output_id in solidus_chain::entry::output_ids(&entry.tx) {
            self.created.remove(&output_id);
        }
        let _ = self.events.send(MempoolEvent::RemoveTx(*tx_hash));
        true
    }

    pub fn expire_orphans(&mut self, now: DateTime<Utc>) -> usize {
        self.orphans.expire(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::amount::AssetAmount;
    use solidus_chain::parameters::Network;
    use solidus_chain::transaction::TimeRange;
    use solidus_chain::txio::{ControlProgram, TxOutput};
    use solidus_state::UtxoEntry as StateUtxoEntry;
    use std::collections::HashMap as StdHashMap;

    fn params() -> ChainParams {
        ChainParams::for_network(Network::Solonet)
    }

    fn spend_tx(output_id: EntryId, amount: u64, fee: u64) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, amount),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: ControlProgram::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, amount - fee), ControlProgram::trivial_true())],
        ))
    }

    #[test]
    fn a_spend_of_an_unknown_output_becomes_an_orphan() {
        let backing: StdHashMap<EntryId, StateUtxoEntry> = StdHashMap::new();
        let mut pool = Mempool::new();
        let tx = spend_tx(EntryId([1u8; 32]), 1000, 500);
        let admitted = pool
            .process_tx(&params(), &backing, Height(1), Utc::now(), tx)
            .unwrap();
        assert!(!admitted);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn a_chained_spend_of_a_pooled_output_is_admitted_without_a_block() {
        let funding_output = EntryId([2u8; 32]);
        let mut backing: StdHashMap<EntryId, StateUtxoEntry> = StdHashMap::new();
        backing.insert(funding_output, StateUtxoEntry::new(funding_output, false, Height(0)));

        let mut pool = Mempool::new();
        let parent = spend_tx(funding_output, 10_000, 5_000);
        assert!(pool.process_tx(&params(), &backing, Height(1), Utc::now(), parent.clone()).unwrap());

        let child_output = solidus_chain::entry::output_ids(&parent)[0];
        let child = spend_tx(child_output, 5_000, 1_000);
        assert!(pool.process_tx(&params(), &backing, Height(1), Utc::now(), child).unwrap());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn double_spending_a_pooled_output_is_a_conflict_not_a_replacement() {
        let funding_output = EntryId([3u8; 32]);
        let mut backing: StdHashMap<EntryId, StateUtxoEntry> = StdHashMap::new();
        backing.insert(funding_output, StateUtxoEntry::new(funding_output, false, Height(0)));

        let mut pool = Mempool::new();
        let first = spend_tx(funding_output, 10_000, 1_000);
        assert!(pool.process_tx(&params(), &backing, Height(1), Utc::now(), first).unwrap());

        let second = spend_tx(funding_output, 10_000, 2_000);
        let err = pool
            .process_tx(&params(), &backing, Height(1), Utc::now(), second)
            .unwrap_err();
        assert!(matches!(err, MempoolError::Conflict(id) if id == funding_output));
    }

    #[test]
    fn removing_a_transaction_frees_its_spent_outputs() {
        let funding_output = EntryId([4u8; 32]);
        let mut backing: StdHashMap<EntryId, StateUtxoEntry> = StdHashMap::new();
        backing.insert(funding_output, StateUtxoEntry::new(funding_output, false, Height(0)));

        let mut pool = Mempool::new();
        let tx = spend_tx(funding_output, 10_000, 1_000);
        pool.process_tx(&params(), &backing, Height(1), Utc::now(), tx.clone()).unwrap();
        assert!(pool.remove_transaction(&tx.hash()));
        assert_eq!(pool.len(), 0);

        let again = spend_tx(funding_output, 10_000, 1_000);
        assert!(pool.process_tx(&params(), &backing, Height(1), Utc::now(), again).unwrap());
    }
}
