//! Persistence: blocks, headers, UTXO entries and the chain-tip marker, all
//! in one ordered key-value engine keyed the way `spec.md` §6 lays out
//! (`"B:"`, `"BH:"`, `"BTS:"`, `"UT:"` prefixes). `spec.md` §9 notes the
//! source carries two divergent copies of these key helpers
//! (`store_geter.go`, `store_opt.go`); this module follows the contract
//! `Store.SaveBlock` in `store_opt.go` uses, per §9's Open Question.
//!
//! The engine itself is `sled`: an embedded, ordered byte-store with atomic
//! batched writes, standing in for the "batched ordered byte-store" §1
//! treats as an external collaborator.

use crate::utxo::{UtxoEntry, UtxoSource};
use byteorder::{BigEndian, WriteBytesExt};
use solidus_chain::block::{Block, Hash as BlockHash, Header, Height};
use solidus_chain::codec::{Decode, Encode};
use solidus_chain::entry::EntryId;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),
    #[error("corrupt stored record: {0}")]
    Corrupt(&'static str),
}

const KEY_TIP: &[u8] = b"tip";

fn key_block(hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32);
    key.extend_from_slice(b"B:");
    key.extend_from_slice(hash.as_bytes());
    key
}

fn key_header_by_height(height: Height, hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + 4 + 32);
    key.extend_from_slice(b"BH:");
    key.write_u32::<BigEndian>(height.0).expect("writing to a Vec is infallible");
    key.extend_from_slice(hash.as_bytes());
    key
}

fn key_header_prefix(height: Height) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + 4);
    key.extend_from_slice(b"BH:");
    key.write_u32::<BigEndian>(height.0).expect("writing to a Vec is infallible");
    key
}

fn key_status(hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"BTS:");
    key.extend_from_slice(hash.as_bytes());
    key
}

fn key_utxo(output_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + 32);
    key.extend_from_slice(b"UT:");
    key.extend_from_slice(output_id.as_bytes());
    key
}

/// A single batch of writes applied atomically: a connected or detached
/// block's bytes, its per-tx status bitmap, its UTXO-set changes, and the
/// new tip marker — exactly what `spec.md` §4.7's "persist atomically in
/// one batch" calls for.
#[derive(Default)]
pub struct WriteBatch {
    batch: sled::Batch,
}

impl WriteBatch {
    pub fn new() -> WriteBatch {
        WriteBatch::default()
    }

    pub fn put_block(&mut self, block: &Block, statuses: &[bool]) {
        let hash = block.hash();
        self.batch.insert(key_block(&hash), block.encode_to_vec().expect("encoding is infallible"));
        self.batch.insert(
            key_header_by_height(block.height(), &hash),
            block.header.encode_to_vec().expect("encoding is infallible"),
        );
        let bitmap: Vec<u8> = statuses.iter().map(|ok| *ok as u8).collect();
        self.batch.insert(key_status(&hash), bitmap);
    }

    pub fn remove_block(&mut self, block: &Block) {
        let hash = block.hash();
        self.batch.remove(key_block(&hash));
        self.batch.remove(key_header_by_height(block.height(), &hash));
        self.batch.remove(key_status(&hash));
    }

    pub fn apply_utxo_changes(&mut self, changes: HashMap<EntryId, Option<UtxoEntry>>) {
        for (output_id, entry) in changes {
            match entry {
                Some(entry) => {
                    self.batch.insert(
                        key_utxo(&output_id),
                        entry.encode_to_vec().expect("encoding is infallible"),
                    );
                }
                None => self.batch.remove(key_utxo(&output_id)),
            }
        }
    }

    pub fn set_tip(&mut self, height: Height, hash: BlockHash) {
        let marker = TipMarker { height, hash };
        self.batch.insert(
            KEY_TIP,
            serde_json::to_vec(&marker).expect("tip marker serializes"),
        );
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TipMarker {
    height: Height,
    hash: BlockHash,
}

impl solidus_chain::codec::Encode for UtxoEntry {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.output_id.encode(&mut target)?;
        self.is_coinbase.encode(&mut target)?;
        self.block_height.encode(&mut target)?;
        self.spent.encode(&mut target)
    }
}

impl solidus_chain::codec::Decode for UtxoEntry {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, solidus_chain::codec::CodecError> {
        Ok(UtxoEntry {
            output_id: EntryId::decode(&mut reader)?,
            is_coinbase: bool::decode(&mut reader)?,
            block_height: Height::decode(&mut reader)?,
            spent: bool::decode(&mut reader)?,
        })
    }
}

/// The persisted chain state: blocks, headers, UTXO entries, and the tip
/// marker, all behind one `sled::Tree`.
#[derive(Clone)]
pub struct Store {
    tree: sled::Tree,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Store, StoreError> {
        let db = sled::open(path)?;
        Ok(Store { tree: db.open_tree("solidus")? })
    }

    pub fn in_memory() -> Store {
        let config = sled::Config::new().temporary(true);
        let db = config.open().expect("opening a temporary sled db cannot fail");
        Store {
            tree: db.open_tree("solidus").expect("opening a tree in a fresh db cannot fail"),
        }
    }

    pub fn tip(&self) -> Result<Option<(Height, BlockHash)>, StoreError> {
        match self.tree.get(KEY_TIP)? {
            Some(bytes) => {
                let marker: TipMarker =
                    serde_json::from_slice(&bytes).map_err(|_| StoreError::Corrupt("tip marker"))?;
                Ok(Some((marker.height, marker.hash)))
            }
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>, StoreError> {
        match self.tree.get(key_block(hash))? {
            Some(bytes) => Ok(Some(
                Block::decode(&bytes[..]).map_err(|_| StoreError::Corrupt("block"))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_header_by_height(&self, height: Height) -> Result<Option<Header>, StoreError> {
        let prefix = key_header_prefix(height);
        match self.tree.scan_prefix(&prefix).next() {
            Some(item) => {
                let (_, bytes) = item?;
                Ok(Some(
                    Header::decode(&bytes[..]).map_err(|_| StoreError::Corrupt("header"))?,
                ))
            }
            None => Ok(None),
        }
    }

    pub fn get_status(&self, hash: &BlockHash) -> Result<Option<Vec<bool>>, StoreError> {
        match self.tree.get(key_status(hash))? {
            Some(bytes) => Ok(Some(bytes.iter().map(|b| *b != 0).collect())),
            None => Ok(None),
        }
    }

    pub fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.tree.apply_batch(batch.batch)?;
        Ok(())
    }
}

impl UtxoSource for Store {
    fn lookup(&self, output_id: &EntryId) -> Option<UtxoEntry> {
        let bytes = self.tree.get(key_utxo(output_id)).ok()??;
        UtxoEntry::decode(&bytes[..]).ok()
    }
}

/// A shared handle to the store, used by every subsystem that needs
/// read access (`spec.md` §5: the store is shared, writes go through a
/// single writer's batch).
pub type SharedStore = Arc<Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::parameters::{genesis, Network};

    #[test]
    fn tip_round_trips() {
        let store = Store::in_memory();
        assert!(store.tip().unwrap().is_none());
        let genesis_block = genesis::block(Network::Solonet);
        let mut batch = WriteBatch::new();
        batch.put_block(&genesis_block, &[true]);
        batch.set_tip(genesis_block.height(), genesis_block.hash());
        store.apply_batch(batch).unwrap();

        let (height, hash) = store.tip().unwrap().unwrap();
        assert_eq!(height, genesis_block.height());
        assert_eq!(hash, genesis_block.hash());
        assert_eq!(store.get_block(&hash).unwrap().unwrap().hash(), hash);
    }

    #[test]
    fn utxo_entries_round_trip() {
        let store = Store::in_memory();
        let output_id = EntryId([9u8; 32]);
        let entry = UtxoEntry::new(output_id, true, Height(3));
        let mut batch = WriteBatch::new();
        let mut changes = HashMap::new();
        changes.insert(output_id, Some(entry));
        batch.apply_utxo_changes(changes);
        store.apply_batch(batch).unwrap();

        let looked_up = store.lookup(&output_id).unwrap();
        assert_eq!(looked_up.block_height, Height(3));
        assert!(looked_up.is_coinbase);
    }
}
