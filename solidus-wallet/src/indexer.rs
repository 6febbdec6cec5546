//! The wallet indexer (`spec.md` §4.10): subscribes to chain connect/
//! disconnect events and mempool events, and keeps the `AccountUTXO` table
//! and transaction history in lockstep with the chain it is told about.
//!
//! This module is not itself a subscriber; it exposes the handlers a task
//! wired up per `spec.md` §5 calls as the chain processor and mempool
//! report events, the way `solidus-state`'s block index is driven by its
//! caller rather than polling for work.

use chrono::{DateTime, Utc};
use solidus_chain::block::{Block, Height};
use solidus_chain::entry::output_ids;
use solidus_chain::txio::TxInput;
use solidus_mempool::{MempoolEvent, TxDesc};

use crate::account::{Account, AccountId, Address, AssetDefinition};
use crate::account_utxo::AccountUtxo;
use crate::error::WalletError;
use crate::history::AnnotatedTx;
use crate::store::WalletStore;

/// What the rescan replay needs from the chain: a block at a given height,
/// the one piece of lookup `WalletStore` itself has no reason to provide.
pub trait BlockByHeight {
    fn block_at_height(&self, height: Height) -> Option<Block>;
}

impl BlockByHeight for solidus_state::Store {
    fn block_at_height(&self, height: Height) -> Option<Block> {
        let header = self.get_header_by_height(height).ok()??;
        self.get_block(&header.hash()).ok()?
    }
}

/// The wallet's live state: a store plus the accounts it currently tracks.
pub struct Wallet {
    store: WalletStore,
}

impl Wallet {
    pub fn new(store: WalletStore) -> Wallet {
        Wallet { store }
    }

    pub fn create_account(&self, id: AccountId, alias: impl Into<String>) -> Result<Account, WalletError> {
        let account = Account { id, alias: alias.into() };
        self.store.put_account(&account)?;
        Ok(account)
    }

    pub fn create_address(&self, account_id: AccountId, program_index: u64, control_program: solidus_chain::txio::ControlProgram) -> Result<Address, WalletError> {
        let address = Address { account_id, program_index, control_program };
        self.store.put_address(&address)?;
        Ok(address)
    }

    pub fn define_asset(&self, asset: AssetDefinition) -> Result<(), WalletError> {
        self.store.put_asset(&asset)
    }

    pub fn account_utxos(&self, account_id: AccountId) -> Result<Vec<AccountUtxo>, WalletError> {
        self.store.account_utxos(account_id)
    }

    /// `spec.md` §4.10's connect handler: for each tx, mark spent any
    /// `AccountUTXO` its inputs consume, then insert an `AccountUTXO` for
    /// every output whose control program belongs to a locally managed
    /// address.
    pub fn connect(&self, block: &Block) -> Result<(), WalletError> {
        let height = block.height();
        for (position, tx) in block.transactions.iter().enumerate() {
            for input in &tx.inputs {
                if let TxInput::Spend { output_id, .. } = input {
                    if let Some(mut utxo) = self.store.get_account_utxo(output_id)? {
                        utxo.spent = true;
                        utxo.spent_at_height = Some(height);
                        self.store.put_account_utxo(&utxo)?;
                    }
                }
            }

            let output_ids = output_ids(tx);
            let mut fee_paid_here = None;
            for (output, output_id) in tx.outputs.iter().zip(output_ids.iter()) {
                let address = match self.store.lookup_address(&output.control_program)? {
                    Some(address) => address,
                    None => continue,
                };
                let utxo = AccountUtxo {
                    output_id: *output_id,
                    asset_id: output.asset_amount.asset_id,
                    amount: output.asset_amount.amount,
                    account_id: address.account_id,
                    program_index: address.program_index,
                    control_program: output.control_program.clone(),
                    block_height: height,
                    spent: false,
                    spent_at_height: None,
                };
                self.store.put_account_utxo(&utxo)?;
            }

            if tx.native_fee().is_some() {
                fee_paid_here = tx.native_fee();
            }
            let annotated = AnnotatedTx {
                tx_id: tx.hash(),
                block_height: Some(height),
                block_position: Some(position),
                fee: fee_paid_here.unwrap_or(0) as u64,
                seen_at: Utc::now(),
            };
            self.store.put_confirmed_tx(height, position, &annotated)?;
            self.store.remove_unconfirmed_tx(&tx.hash())?;
        }
        Ok(())
    }

    /// Reverses exactly what `connect` did for this block, as
    /// `UtxoView::reverse_transaction` reverses `apply_transaction`.
    pub fn disconnect(&self, block: &Block) -> Result<(), WalletError> {
        let height = block.height();
        for (position, tx) in block.transactions.iter().enumerate().rev() {
            self.store.remove_confirmed_tx(height, position, &tx.hash())?;

            for output_id in output_ids(tx) {
                self.store.remove_account_utxo(&output_id)?;
            }

            for input in &tx.inputs {
                if let TxInput::Spend { output_id, .. } = input {
                    if let Some(mut utxo) = self.store.get_account_utxo(output_id)? {
                        if utxo.spent_at_height == Some(height) {
                            utxo.spent = false;
                            utxo.spent_at_height = None;
                            self.store.put_account_utxo(&utxo)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// `spec.md` §4.10's mempool subscription: a newly admitted transaction
    /// is annotated and placed in the unconfirmed table; a dropped one is
    /// removed from it.
    pub fn on_mempool_event(&self, event: MempoolEvent) -> Result<(), WalletError> {
        match event {
            MempoolEvent::NewTx(desc) => self.annotate_unconfirmed(&desc),
            MempoolEvent::RemoveTx(tx_hash) => self.store.remove_unconfirmed_tx(&tx_hash),
        }
    }

    fn annotate_unconfirmed(&self, desc: &TxDesc) -> Result<(), WalletError> {
        let annotated = AnnotatedTx {
            tx_id: desc.tx.hash(),
            block_height: None,
            block_position: None,
            fee: desc.fee,
            seen_at: desc.added_time,
        };
        self.store.put_unconfirmed_tx(&annotated)
    }

    /// Rewinds the `AccountUTXO` table and confirmed history to what they
    /// would be at `height`, then replays every block above it. Used when
    /// importing a key whose history predates the wallet's last scan.
    pub fn reset_to_height<C: BlockByHeight>(&self, chain: &C, height: Height, tip: Height) -> Result<(), WalletError> {
        for (record_height, position, tx_id) in self.store.confirmed_txs_after(height)? {
            self.store.remove_confirmed_tx(record_height, position, &tx_id)?;
        }

        for utxo in self.store.account_utxos_all()? {
            if utxo.block_height.0 > height.0 {
                self.store.remove_account_utxo(&utxo.output_id)?;
            } else if let Some(spent_at) = utxo.spent_at_height {
                if spent_at.0 > height.0 {
                    let mut restored = utxo;
                    restored.spent = false;
                    restored.spent_at_height = None;
                    self.store.put_account_utxo(&restored)?;
                }
            }
        }

        let mut cursor = height.next();
        while cursor.0 <= tip.0 {
            if let Some(block) = chain.block_at_height(cursor) {
                self.connect(&block)?;
            }
            cursor = cursor.next();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solidus_chain::amount::{AssetAmount, AssetId};
    use solidus_chain::block::{Header, Height};
    use solidus_chain::transaction::{Transaction, TimeRange};
    use solidus_chain::txio::{ControlProgram, TxInput, TxOutput};
    use solidus_chain::work::difficulty::CompactDifficulty;
    use std::iter::FromIterator;
    use std::sync::Arc;

    fn owned_program() -> ControlProgram {
        ControlProgram::new(1, vec![0x51, 0x01])
    }

    fn block_paying(height: Height, previous: solidus_chain::block::Hash, program: ControlProgram) -> Block {
        let coinbase_tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase { data: solidus_chain::txio::CoinbaseData(vec![]) }],
            vec![TxOutput::new(AssetAmount { asset_id: AssetId::NATIVE, amount: 1000 }, program)],
        );
        let header = Header::new(
            1,
            height,
            previous,
            Utc::now(),
            CompactDifficulty(0x1d00ffff),
            0,
            solidus_chain::block::merkle::Root::from_iter(vec![coinbase_tx.hash()]),
            solidus_chain::block::merkle::status_root(&[true]),
            solidus_chain::block::Hash([0u8; 32]),
        );
        Block { header, transactions: vec![Arc::new(coinbase_tx)] }
    }

    #[test]
    fn connect_indexes_a_payment_to_a_known_address() {
        let wallet = Wallet::new(WalletStore::in_memory());
        let account = wallet.create_account(AccountId(1), "default").unwrap();
        let program = owned_program();
        wallet.create_address(account.id, 0, program.clone()).unwrap();

        let block = block_paying(Height(1), solidus_chain::block::Hash([0u8; 32]), program);
        wallet.connect(&block).unwrap();

        let utxos = wallet.account_utxos(account.id).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].amount, 1000);
        assert!(!utxos[0].spent);
    }

    #[test]
    fn disconnect_undoes_exactly_what_connect_did() {
        let wallet = Wallet::new(WalletStore::in_memory());
        let account = wallet.create_account(AccountId(1), "default").unwrap();
        let program = owned_program();
        wallet.create_address(account.id, 0, program.clone()).unwrap();

        let block = block_paying(Height(1), solidus_chain::block::Hash([0u8; 32]), program);
        wallet.connect(&block).unwrap();
        wallet.disconnect(&block).unwrap();

        assert!(wallet.account_utxos(account.id).unwrap().is_empty());
    }

    #[test]
    fn mempool_new_tx_then_remove_tx_clears_the_unconfirmed_entry() {
        let wallet = Wallet::new(WalletStore::in_memory());
        let tx = Arc::new(Transaction::new(1, TimeRange::unbounded(), vec![], vec![]));
        let desc = TxDesc { tx: tx.clone(), added_time: Utc::now(), fee: 10, weight: 64 };
        wallet.on_mempool_event(MempoolEvent::NewTx(desc)).unwrap();
        assert!(wallet.store.get_unconfirmed_tx(&tx.hash()).unwrap().is_some());

        wallet.on_mempool_event(MempoolEvent::RemoveTx(tx.hash())).unwrap();
        assert!(wallet.store.get_unconfirmed_tx(&tx.hash()).unwrap().is_none());
    }
}
