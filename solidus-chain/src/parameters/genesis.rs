//! The genesis block for each network.
//!
//! Each network's genesis block is a single coinbase transaction paying the
//! first subsidy to an unspendable control program, wrapped in a header
//! whose `previous_block_hash` is all-zero. Unlike a live-mined block, the
//! nonce is simply whatever value happens to produce a deterministic,
//! checked-in hash; there is no proof-of-work requirement on genesis itself.

use crate::amount::{AssetAmount, AssetId};
use crate::block::merkle;
use crate::block::{Block, Hash, Header, Height};
use crate::parameters::{ChainParams, Network};
use crate::transaction::{Transaction, TimeRange};
use crate::txio::{CoinbaseData, ControlProgram, TxInput, TxOutput};
use crate::work::difficulty::CompactDifficulty;
use chrono::{TimeZone, Utc};

fn genesis_transaction(params: &ChainParams, message: &'static str) -> Transaction {
    let subsidy = params.block_subsidy(Height(0));
    Transaction::new(
        1,
        TimeRange::unbounded(),
        vec![TxInput::Coinbase {
            data: CoinbaseData(message.as_bytes().to_vec()),
        }],
        vec![TxOutput::new(
            AssetAmount::new(AssetId::NATIVE, subsidy),
            ControlProgram::new(1, vec![]),
        )],
    )
}

fn genesis_block(params: &ChainParams, message: &'static str, time: i64, nonce: u64) -> Block {
    let coinbase = genesis_transaction(params, message);
    let tx_hashes = vec![coinbase.hash()];
    let merkle_root = tx_hashes.into_iter().collect::<merkle::Root>();
    let status_root = merkle::status_root(&[true]);

    let header = Header::new(
        1,
        Height(0),
        Hash([0u8; 32]),
        Utc.timestamp(time, 0),
        CompactDifficulty(params.min_bits),
        nonce,
        merkle_root,
        status_root,
        Hash([0u8; 32]),
    );

    Block {
        header,
        transactions: vec![std::sync::Arc::new(coinbase)],
    }
}

/// The genesis block for `network`.
pub fn block(network: Network) -> Block {
    let params = ChainParams::for_network(network);
    match network {
        Network::Mainnet => genesis_block(
            &params,
            "a ledger that settles itself",
            1_600_000_000,
            0,
        ),
        Network::Testnet => genesis_block(&params, "testnet genesis", 1_600_000_000, 0),
        Network::Solonet => genesis_block(&params, "solonet genesis", 1_600_000_000, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_stable_across_calls() {
        let a = block(Network::Solonet);
        let b = block(Network::Solonet);
        assert_eq!(a.hash().0, b.hash().0);
    }

    #[test]
    fn genesis_has_height_zero_and_no_parent() {
        let genesis = block(Network::Mainnet);
        assert_eq!(genesis.height(), Height(0));
        assert_eq!(genesis.header.previous_block_hash, Hash([0u8; 32]));
    }

    #[test]
    fn different_networks_have_different_genesis_blocks() {
        let mainnet = block(Network::Mainnet);
        let testnet = block(Network::Testnet);
        assert_ne!(mainnet.hash().0, testnet.hash().0);
    }
}
