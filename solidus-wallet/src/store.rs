//! Persistence for the wallet's own tables, keyed the way `spec.md` §6 lays
//! out: `"ACC:"`, `"ALI:"`, `"ADR:"`, `"AST:"`, `"ACU:"` prefixes, following
//! the same one-`sled::Tree`-plus-key-prefix convention
//! `solidus_state::Store` uses for the chain's own tables.

use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use solidus_chain::amount::AssetId;
use solidus_chain::block::Height;
use solidus_chain::entry::EntryId;
use solidus_chain::transaction::Hash as TxHash;

use crate::account::{Account, AccountId, Address, AssetDefinition};
use crate::account_utxo::AccountUtxo;
use crate::error::WalletError;
use crate::history::AnnotatedTx;

fn key_account(id: AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 8);
    key.extend_from_slice(b"ACC:");
    key.write_u64::<BigEndian>(id.0).expect("writing to a Vec is infallible");
    key
}

fn key_alias(alias: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + alias.len());
    key.extend_from_slice(b"ALI:");
    key.extend_from_slice(alias.as_bytes());
    key
}

fn key_address(program_digest: &[u8; 32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"ADR:");
    key.extend_from_slice(program_digest);
    key
}

fn key_asset(asset_id: &AssetId) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"AST:");
    key.extend_from_slice(asset_id.as_bytes());
    key
}

fn key_account_utxo(output_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"ACU:");
    key.extend_from_slice(output_id.as_bytes());
    key
}

fn key_account_utxo_prefix() -> Vec<u8> {
    b"ACU:".to_vec()
}

fn key_history_index(height: Height, position: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 4 + 8);
    key.extend_from_slice(b"TXH:");
    key.write_u32::<BigEndian>(height.0).expect("writing to a Vec is infallible");
    key.write_u64::<BigEndian>(position as u64).expect("writing to a Vec is infallible");
    key
}

fn key_history_prefix_after(height: Height) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 4);
    key.extend_from_slice(b"TXH:");
    key.write_u32::<BigEndian>(height.0 + 1).expect("writing to a Vec is infallible");
    key
}

fn key_tx(tx_id: &TxHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"TXI:");
    key.extend_from_slice(tx_id.as_bytes());
    key
}

fn key_unconfirmed(tx_id: &TxHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"UTX:");
    key.extend_from_slice(tx_id.as_bytes());
    key
}

/// The wallet's own persisted tables. A single `sled::Tree`, like
/// `solidus_state::Store`; `sled` serializes concurrent writers internally
/// so every method here only needs `&self` (`spec.md` §5's wallet single
/// writer is an application-level discipline, not one this type enforces).
#[derive(Clone)]
pub struct WalletStore {
    tree: sled::Tree,
}

impl WalletStore {
    pub fn open(path: impl AsRef<Path>) -> Result<WalletStore, WalletError> {
        let db = sled::open(path)?;
        Ok(WalletStore {
            tree: db.open_tree("solidus-wallet")?,
        })
    }

    pub fn in_memory() -> WalletStore {
        let config = sled::Config::new().temporary(true);
        let db = config.open().expect("opening a temporary sled db cannot fail");
        WalletStore {
            tree: db
                .open_tree("solidus-wallet")
                .expect("opening a tree in a fresh db cannot fail"),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: Vec<u8>, value: &T) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec(value).expect("wallet records always serialize");
        self.tree.insert(key, bytes)?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8], what: &'static str) -> Result<Option<T>, WalletError> {
        match self.tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|_| WalletError::Corrupt(what))?)),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, account: &Account) -> Result<(), WalletError> {
        self.put_json(key_account(account.id), account)?;
        self.tree.insert(key_alias(&account.alias), &account.id.0.to_be_bytes())?;
        Ok(())
    }

    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>, WalletError> {
        self.get_json(&key_account(id), "account")
    }

    pub fn account_id_for_alias(&self, alias: &str) -> Result<Option<AccountId>, WalletError> {
        match self.tree.get(key_alias(alias))? {
            Some(bytes) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(Some(AccountId(u64::from_be_bytes(buf))))
            }
            None => Ok(None),
        }
    }

    pub fn put_address(&self, address: &Address) -> Result<(), WalletError> {
        let digest = crate::account::program_digest(&address.control_program);
        self.put_json(key_address(&digest), address)
    }

    pub fn lookup_address(&self, program: &solidus_chain::txio::ControlProgram) -> Result<Option<Address>, WalletError> {
        let digest = crate::account::program_digest(program);
        self.get_json(&key_address(&digest), "address")
    }

    pub fn put_asset(&self, asset: &AssetDefinition) -> Result<(), WalletError> {
        self.put_json(key_asset(&asset.asset_id), asset)
    }

    pub fn get_account_utxo(&self, output_id: &EntryId) -> Result<Option<AccountUtxo>, WalletError> {
        self.get_json(&key_account_utxo(output_id), "account utxo")
    }

    pub fn put_account_utxo(&self, utxo: &AccountUtxo) -> Result<(), WalletError> {
        self.put_json(key_account_utxo(&utxo.output_id), utxo)
    }

    pub fn remove_account_utxo(&self, output_id: &EntryId) -> Result<(), WalletError> {
        self.tree.remove(key_account_utxo(output_id))?;
        Ok(())
    }

    /// Every `AccountUtxo` the wallet holds for `account_id`. A plain
    /// prefix scan, as `solidus_state::Store::get_header_by_height` does
    /// for its own by-height lookups.
    pub fn account_utxos(&self, account_id: AccountId) -> Result<Vec<AccountUtxo>, WalletError> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(key_account_utxo_prefix()) {
            let (_, bytes) = item?;
            let utxo: AccountUtxo = serde_json::from_slice(&bytes).map_err(|_| WalletError::Corrupt("account utxo"))?;
            if utxo.account_id == account_id {
                out.push(utxo);
            }
        }
        Ok(out)
    }

    /// Every `AccountUtxo` this wallet has ever recorded, any account.
    /// Used by `reset_to_height`'s rewind pass, which needs to inspect all
    /// of them rather than one account's slice.
    pub fn account_utxos_all(&self) -> Result<Vec<AccountUtxo>, WalletError> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(key_account_utxo_prefix()) {
            let (_, bytes) = item?;
            let utxo: AccountUtxo = serde_json::from_slice(&bytes).map_err(|_| WalletError::Corrupt("account utxo"))?;
            out.push(utxo);
        }
        Ok(out)
    }

    pub fn put_confirmed_tx(&self, height: Height, position: usize, tx: &AnnotatedTx) -> Result<(), WalletError> {
        self.put_json(key_tx(&tx.tx_id), tx)?;
        self.tree.insert(key_history_index(height, position), tx.tx_id.as_bytes().to_vec())?;
        Ok(())
    }

    pub fn remove_confirmed_tx(&self, height: Height, position: usize, tx_id: &TxHash) -> Result<(), WalletError> {
        self.tree.remove(key_history_index(height, position))?;
        self.tree.remove(key_tx(tx_id))?;
        Ok(())
    }

    /// Every confirmed tx recorded at a height strictly greater than
    /// `height`, oldest first — what `reset_to_height` rewinds away.
    pub fn confirmed_txs_after(&self, height: Height) -> Result<Vec<(Height, usize, TxHash)>, WalletError> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(b"TXH:") {
            let (key, value) = item?;
            if key.as_ref() < key_history_prefix_after(height).as_slice() {
                continue;
            }
            let h = u32::from_be_bytes(key[4..8].try_into().expect("height field is 4 bytes"));
            let pos = u64::from_be_bytes(key[8..16].try_into().expect("position field is 8 bytes"));
            let mut tx_id_bytes = [0u8; 32];
            tx_id_bytes.copy_from_slice(&value);
            out.push((Height(h), pos as usize, TxHash(tx_id_bytes)));
        }
        Ok(out)
    }

    pub fn put_unconfirmed_tx(&self, tx: &AnnotatedTx) -> Result<(), WalletError> {
        self.put_json(key_unconfirmed(&tx.tx_id), tx)
    }

    pub fn remove_unconfirmed_tx(&self, tx_id: &TxHash) -> Result<(), WalletError> {
        self.tree.remove(key_unconfirmed(tx_id))?;
        Ok(())
    }

    pub fn get_unconfirmed_tx(&self, tx_id: &TxHash) -> Result<Option<AnnotatedTx>, WalletError> {
        self.get_json(&key_unconfirmed(tx_id), "unconfirmed tx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::txio::ControlProgram;

    #[test]
    fn account_and_alias_round_trip() {
        let store = WalletStore::in_memory();
        let account = Account {
            id: AccountId(1),
            alias: "default".to_string(),
        };
        store.put_account(&account).unwrap();
        assert_eq!(store.account_id_for_alias("default").unwrap(), Some(AccountId(1)));
        assert_eq!(store.get_account(AccountId(1)).unwrap().unwrap().alias, "default");
    }

    #[test]
    fn address_is_looked_up_by_its_control_program() {
        let store = WalletStore::in_memory();
        let program = ControlProgram::trivial_true();
        let address = Address {
            account_id: AccountId(1),
            program_index: 0,
            control_program: program.clone(),
        };
        store.put_address(&address).unwrap();
        let found = store.lookup_address(&program).unwrap().unwrap();
        assert_eq!(found.account_id, AccountId(1));
    }

    #[test]
    fn account_utxos_filters_by_account() {
        let store = WalletStore::in_memory();
        let utxo_a = AccountUtxo {
            output_id: EntryId([1u8; 32]),
            asset_id: AssetId::NATIVE,
            amount: 100,
            account_id: AccountId(1),
            program_index: 0,
            control_program: ControlProgram::trivial_true(),
            block_height: Height(10),
            spent: false,
            spent_at_height: None,
        };
        let utxo_b = AccountUtxo {
            account_id: AccountId(2),
            output_id: EntryId([2u8; 32]),
            ..utxo_a.clone()
        };
        store.put_account_utxo(&utxo_a).unwrap();
        store.put_account_utxo(&utxo_b).unwrap();
        assert_eq!(store.account_utxos(AccountId(1)).unwrap().len(), 1);
        assert_eq!(store.account_utxos(AccountId(2)).unwrap().len(), 1);
    }
}
