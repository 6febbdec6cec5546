//! The UTXO set and the in-memory overlay used to apply and reverse
//! transactions against it (`spec.md` §3 "UTXO entry", §4.3).

use solidus_chain::block::Height;
use solidus_chain::entry::EntryId;
use solidus_chain::transaction::Transaction;
use solidus_chain::txio::TxInput;
use std::collections::HashMap;
use thiserror::Error;

/// A single unspent-or-spent output record. `spec.md` §3 gives the lifecycle:
/// created when its producing block connects, marked spent when a later
/// block's spend connects, reversed on detach.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UtxoEntry {
    pub output_id: EntryId,
    pub is_coinbase: bool,
    pub block_height: Height,
    pub spent: bool,
}

impl UtxoEntry {
    pub fn new(output_id: EntryId, is_coinbase: bool, block_height: Height) -> UtxoEntry {
        UtxoEntry {
            output_id,
            is_coinbase,
            block_height,
            spent: false,
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum UtxoError {
    #[error("spent output {0} does not exist")]
    SpendMissing(EntryId),
    #[error("output {0} is already spent")]
    DoubleSpend(EntryId),
    #[error("coinbase output {0} is not yet mature")]
    ImmatureCoinbase(EntryId),
}

/// Looks up persisted `UtxoEntry` records. `solidus-state`'s `Store` is the
/// production implementation; tests use a plain `HashMap`.
pub trait UtxoSource {
    fn lookup(&self, output_id: &EntryId) -> Option<UtxoEntry>;
}

impl UtxoSource for HashMap<EntryId, UtxoEntry> {
    fn lookup(&self, output_id: &EntryId) -> Option<UtxoEntry> {
        self.get(output_id).copied()
    }
}

/// A scratch overlay of additions and spends on top of a persisted UTXO set
/// (`spec.md` §4.3). Every validation — a lone transaction, a whole block, a
/// miner's candidate template — runs against its own `UtxoView` built from a
/// `backing` source; nothing is written to the real store until the caller
/// decides to commit it.
pub struct UtxoView<'a, S: UtxoSource> {
    backing: &'a S,
    /// `None` marks an entry the overlay has deleted (spent-and-detached or
    /// otherwise removed); `Some` is either an unmodified lookup result or a
    /// freshly created entry.
    overlay: HashMap<EntryId, Option<UtxoEntry>>,
}

impl<'a, S: UtxoSource> UtxoView<'a, S> {
    pub fn new(backing: &'a S) -> UtxoView<'a, S> {
        UtxoView {
            backing,
            overlay: HashMap::new(),
        }
    }

    pub fn lookup(&self, output_id: &EntryId) -> Option<UtxoEntry> {
        match self.overlay.get(output_id) {
            Some(entry) => *entry,
            None => self.backing.lookup(output_id),
        }
    }

    fn set(&mut self, output_id: EntryId, entry: Option<UtxoEntry>) {
        self.overlay.insert(output_id, entry);
    }

    /// All additions/removals the overlay has accumulated, for the caller
    /// to turn into a `Store` batch once it decides to commit.
    pub fn into_changes(self) -> HashMap<EntryId, Option<UtxoEntry>> {
        self.overlay
    }

    /// `spec.md` §4.3 `ApplyTransaction`. When `gas_only` is true (the tx
    /// failed VM validation but a BTM spend covered its storage gas — S4),
    /// only native-asset spends are applied and no outputs are created.
    pub fn apply_transaction(
        &mut self,
        block_height: Height,
        coinbase_maturity: u32,
        tx: &Transaction,
        gas_only: bool,
        native_asset: solidus_chain::amount::AssetId,
    ) -> Result<(), UtxoError> {
        for input in &tx.inputs {
            if let TxInput::Spend {
                output_id,
                asset_amount,
                ..
            } = input
            {
                if gas_only && asset_amount.asset_id != native_asset {
                    continue;
                }
                let entry = self.lookup(output_id).ok_or(UtxoError::SpendMissing(*output_id))?;
                if entry.spent {
                    return Err(UtxoError::DoubleSpend(*output_id));
                }
                if entry.is_coinbase && block_height.0.saturating_sub(entry.block_height.0) < coinbase_maturity {
                    return Err(UtxoError::ImmatureCoinbase(*output_id));
                }
                self.set(*output_id, Some(UtxoEntry { spent: true, ..entry }));
            }
        }

        if !gas_only {
            let is_coinbase_tx = tx.is_coinbase();
            for output_id in solidus_chain::entry::output_ids(tx) {
                self.set(output_id, Some(UtxoEntry::new(output_id, is_coinbase_tx, block_height)));
            }
        }

        Ok(())
    }

    /// Undoes exactly what `apply_transaction` did: spent entries go back
    /// to unspent, created entries are removed (`spec.md` §3).
    pub fn reverse_transaction(&mut self, tx: &Transaction) {
        for output_id in solidus_chain::entry::output_ids(tx) {
            self.set(output_id, None);
        }

        for input in &tx.inputs {
            if let TxInput::Spend { output_id, .. } = input {
                if let Some(entry) = self.lookup(output_id) {
                    self.set(*output_id, Some(UtxoEntry { spent: false, ..entry }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::amount::{AssetAmount, AssetId};
    use solidus_chain::transaction::TimeRange;
    use solidus_chain::txio::{ControlProgram, CoinbaseData, TxOutput};

    fn coinbase_tx(amount: u64) -> Transaction {
        Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase {
                data: CoinbaseData(vec![1]),
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, amount), ControlProgram::trivial_true())],
        )
    }

    #[test]
    fn applying_then_reversing_a_coinbase_restores_emptiness() {
        let backing: HashMap<EntryId, UtxoEntry> = HashMap::new();
        let tx = coinbase_tx(100);
        let mut view = UtxoView::new(&backing);
        view.apply_transaction(Height(5), 100, &tx, false, AssetId::NATIVE).unwrap();
        assert_eq!(view.into_changes().values().filter(|v| v.is_some()).count(), 1);

        let mut view = UtxoView::new(&backing);
        view.apply_transaction(Height(5), 100, &tx, false, AssetId::NATIVE).unwrap();
        view.reverse_transaction(&tx);
        let changes = view.into_changes();
        assert!(changes.values().all(Option::is_none));
    }

    #[test]
    fn immature_coinbase_spend_is_rejected() {
        let output_id = solidus_chain::entry::output_id(
            solidus_chain::entry::mux_id(&[]),
            0,
            AssetAmount::new(AssetId::NATIVE, 100),
            &ControlProgram::trivial_true(),
        );
        let mut backing = HashMap::new();
        backing.insert(output_id, UtxoEntry::new(output_id, true, Height(100)));

        let spend_tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 100),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: ControlProgram::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 100), ControlProgram::trivial_true())],
        );

        let mut view = UtxoView::new(&backing);
        let err = view
            .apply_transaction(Height(199), 100, &spend_tx, false, AssetId::NATIVE)
            .unwrap_err();
        assert_eq!(err, UtxoError::ImmatureCoinbase(output_id));

        let mut view = UtxoView::new(&backing);
        assert!(view
            .apply_transaction(Height(200), 100, &spend_tx, false, AssetId::NATIVE)
            .is_ok());
    }

    #[test]
    fn double_spend_is_rejected() {
        let output_id = solidus_chain::entry::output_id(
            solidus_chain::entry::mux_id(&[]),
            0,
            AssetAmount::new(AssetId::NATIVE, 100),
            &ControlProgram::trivial_true(),
        );
        let mut backing = HashMap::new();
        let mut entry = UtxoEntry::new(output_id, false, Height(1));
        entry.spent = true;
        backing.insert(output_id, entry);

        let spend_tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 100),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: ControlProgram::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 100), ControlProgram::trivial_true())],
        );
        let mut view = UtxoView::new(&backing);
        assert_eq!(
            view.apply_transaction(Height(10), 100, &spend_tx, false, AssetId::NATIVE),
            Err(UtxoError::DoubleSpend(output_id))
        );
    }
}
