//! Network selection and the consensus parameters that vary by network.
//!
//! Per `spec.md` §9's "Global process state" redesign flag, there is no
//! global active-network singleton: callers pick a `Network` at startup and
//! thread the corresponding `ChainParams` value through every constructor
//! that needs it.

pub mod genesis;

use crate::block::Height;
use crate::amount::AssetId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which network a node is participating in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    /// A single-node network used for local development and tests.
    Solonet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Solonet => "solonet",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Network {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "solonet" => Ok(Network::Solonet),
            other => Err(format!("unknown network {:?}", other)),
        }
    }
}

/// Consensus parameters for a network. `spec.md` §4.4/§4.5/§4.9 reference
/// these constants by name; they are grouped here instead of scattered as
/// free-standing `const`s so that test networks (e.g. `Solonet`, which wants
/// a tiny retarget interval) can override them without a cargo feature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChainParams {
    pub network: Network,

    /// Number of confirmations before a coinbase output becomes spendable (§3 UTXO entry).
    pub coinbase_maturity: u32,
    /// Maximum cumulative VM gas permitted in one block (I-B7).
    pub max_block_gas: u64,
    /// Maximum VM gas a single transaction's inputs may spend in total.
    pub max_tx_gas: u64,
    /// Maximum serialized block size in bytes (I-B7).
    pub max_block_size: usize,
    /// How far into the future (seconds) a block timestamp may be, relative to wall clock (I-B3).
    pub max_time_offset_secs: i64,
    /// Number of ancestor timestamps folded into the past median time (§4.4).
    pub median_time_blocks: usize,
    /// Height interval between difficulty retargets (§4.4).
    pub blocks_per_retarget: u64,
    /// Target average seconds between blocks (§4.4).
    pub target_seconds_per_block: u64,
    /// Lower bound (easiest) difficulty, expressed as compact bits (§4.4).
    pub min_bits: u32,
    /// Maximum bytes of arbitrary data a coinbase input may carry (I-B5).
    pub max_coinbase_data_len: usize,
    /// The asset id that pays fees and the block subsidy.
    pub native_asset: AssetId,
}

impl ChainParams {
    pub fn for_network(network: Network) -> ChainParams {
        match network {
            Network::Mainnet => ChainParams {
                network,
                coinbase_maturity: 100,
                max_block_gas: 80_000_000,
                max_tx_gas: 200_000,
                max_block_size: 2_000_000,
                max_time_offset_secs: 2 * 60 * 60,
                median_time_blocks: 11,
                blocks_per_retarget: 2016,
                target_seconds_per_block: 150,
                min_bits: 0x1d00ffff,
                max_coinbase_data_len: 128,
                native_asset: AssetId::NATIVE,
            },
            Network::Testnet => ChainParams {
                network,
                coinbase_maturity: 100,
                max_block_gas: 80_000_000,
                max_tx_gas: 200_000,
                max_block_size: 2_000_000,
                max_time_offset_secs: 2 * 60 * 60,
                median_time_blocks: 11,
                blocks_per_retarget: 2016,
                target_seconds_per_block: 150,
                min_bits: 0x2000ffff,
                max_coinbase_data_len: 128,
                native_asset: AssetId::NATIVE,
            },
            Network::Solonet => ChainParams {
                network,
                coinbase_maturity: 2,
                max_block_gas: 80_000_000,
                max_tx_gas: 200_000,
                max_block_size: 2_000_000,
                max_time_offset_secs: 2 * 60 * 60,
                median_time_blocks: 11,
                blocks_per_retarget: 8,
                target_seconds_per_block: 1,
                min_bits: 0x2100ffff,
                max_coinbase_data_len: 128,
                native_asset: AssetId::NATIVE,
            },
        }
    }

    /// `BlockSubsidy(height)`: the fixed, halving block reward in units of the
    /// native asset, excluding collected fees (I-B6, P7).
    pub fn block_subsidy(&self, height: Height) -> u64 {
        const INITIAL_SUBSIDY: u64 = 41_250_000_000;
        const HALVING_INTERVAL: u32 = 840_000;
        let halvings = height.0 / HALVING_INTERVAL;
        if halvings >= 64 {
            0
        } else {
            INITIAL_SUBSIDY >> halvings
        }
    }
}
