//! `ValidateBlock` (`spec.md` §4.5): the seven-step pipeline that checks a
//! candidate block's structure, timestamp, difficulty, Merkle roots,
//! coinbase, and every contained transaction, accumulating gas and size
//! along the way.

use chrono::{DateTime, Utc};
use primitive_types::U256;

use solidus_chain::block::{merkle, Block};
use solidus_chain::codec::Encode;
use solidus_chain::parameters::ChainParams;
use solidus_state::{BlockIndex, BlockNode, UtxoSource, UtxoView};

use crate::error::BlockError;
use crate::gas::GasState;
use crate::transaction::validate_transaction;

/// The outcome of successfully validating a block: the per-transaction
/// pass/fail bitmap (`spec.md` §6 transaction-status root) and the total gas
/// actually spent, for the caller's block-gas accounting.
pub struct BlockValidation {
    pub statuses: Vec<bool>,
    pub total_gas: u64,
}

/// `spec.md` §4.5 steps 1-7. `view` is expected to be a scratch overlay the
/// caller discards on any `Err` (`spec.md` §4.3 "any per-tx error aborts the
/// block and all changes are discarded").
pub fn validate_block<S: UtxoSource>(
    params: &ChainParams,
    index: &BlockIndex,
    parent: &BlockNode,
    view: &mut UtxoView<S>,
    block: &Block,
    now: DateTime<Utc>,
) -> Result<BlockValidation, BlockError> {
    if block.transactions.is_empty() {
        return Err(BlockError::NoTransactions);
    }
    let header = &block.header;
    let hash = block.hash();

    // 1. Structural.
    if header.version < parent.version {
        return Err(BlockError::VersionRegression(header.version));
    }
    if header.height != parent.height.next() {
        return Err(BlockError::MisorderedHeight {
            expected: parent.height.next(),
            actual: header.height,
        });
    }
    if header.previous_block_hash != parent.hash {
        return Err(BlockError::MismatchedParent);
    }

    // 2. Timestamp.
    let median_time = index.past_median_time(parent, params.median_time_blocks);
    header.time_is_after_median(median_time, &hash)?;
    header.time_is_valid_at(now, params.max_time_offset_secs, &hash)?;

    // 3. Difficulty.
    let required_bits =
        index.next_required_difficulty(parent, params.blocks_per_retarget, params.target_seconds_per_block, params.min_bits);
    if header.difficulty_threshold != required_bits {
        return Err(BlockError::BadDifficulty {
            expected: required_bits.0,
            actual: header.difficulty_threshold.0,
        });
    }
    let target = required_bits
        .to_expanded()
        .expect("required difficulty is always well-formed")
        .0;
    let hash_value = U256::from_little_endian(&hash.0);
    if hash_value > target {
        return Err(BlockError::BadWork);
    }

    // 4. Transaction Merkle root (the status root is checked in step 6,
    // once the per-tx status bitmap is known).
    let tx_root: merkle::Root = block.transaction_hashes().into_iter().collect();
    if tx_root != header.merkle_root {
        return Err(BlockError::MismatchedMerkleRoot);
    }

    // 5. Coinbase shape.
    let coinbase = block.coinbase_transaction().ok_or(BlockError::CoinbaseNotFirst)?;
    if block.transactions[1..].iter().any(|tx| tx.has_coinbase_input()) {
        return Err(BlockError::CoinbaseInputFound);
    }
    if let Some(solidus_chain::txio::TxInput::Coinbase { data }) = coinbase.inputs.get(0) {
        if data.0.len() > params.max_coinbase_data_len {
            return Err(BlockError::CoinbaseDataTooLong);
        }
    }

    // 6. Non-coinbase transactions, in order.
    let mut statuses = Vec::with_capacity(block.transactions.len());
    statuses.push(true); // the coinbase's own status is fixed once its amount is checked below.
    let mut total_gas = GasState::storage_only(coinbase.serialized_size()).gas_used;
    let mut total_fees: u128 = 0;

    for (offset, tx) in block.transactions[1..].iter().enumerate() {
        let index_in_block = offset + 1;
        let block_time = header.time.timestamp().max(0) as u64;
        match validate_transaction(params, view, header.height, block_time, tx) {
            Ok(gas) => {
                total_gas = total_gas.saturating_add(gas.gas_used);
                if total_gas > params.max_block_gas {
                    return Err(BlockError::OverGasLimit {
                        actual: total_gas,
                        max: params.max_block_gas,
                    });
                }
                if gas.gas_valid {
                    total_fees += tx.native_fee().unwrap_or(0);
                }
                statuses.push(gas.gas_valid);
            }
            Err(source) => {
                return Err(BlockError::Transaction {
                    index: index_in_block,
                    source,
                });
            }
        }
    }

    let status_root = merkle::status_root(&statuses);
    if status_root != header.transaction_status_root {
        return Err(BlockError::MismatchedStatusRoot);
    }

    // 5 (continued). Coinbase amount == subsidy + fees, now that fees are known.
    let subsidy = params.block_subsidy(header.height);
    let expected_coinbase = (subsidy as u128) + total_fees;
    let actual_coinbase = coinbase.created_by_asset().get(&params.native_asset).copied().unwrap_or(0);
    if actual_coinbase != expected_coinbase {
        return Err(BlockError::BadCoinbaseAmount {
            expected: expected_coinbase as u64,
            actual: actual_coinbase as u64,
        });
    }
    view.apply_transaction(header.height, params.coinbase_maturity, coinbase, false, params.native_asset)
        .map_err(|_| BlockError::BadCoinbaseAmount {
            expected: expected_coinbase as u64,
            actual: actual_coinbase as u64,
        })?;

    // 7. Final gas and size checks.
    let size = block.encode_to_vec().map(|b| b.len()).unwrap_or(usize::MAX);
    if size > params.max_block_size {
        return Err(BlockError::OverSizeLimit {
            actual: size,
            max: params.max_block_size,
        });
    }

    Ok(BlockValidation { statuses, total_gas })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::parameters::{genesis, Network};
    use solidus_state::UtxoEntry;
    use std::collections::HashMap;

    #[test]
    fn genesis_block_validates_trivially_against_itself_as_non_goal() {
        // Full pipeline tests belong to integration tests once the miner
        // can produce a valid child block; here we just confirm subsidy
        // accounting lines up with the genesis block's own coinbase.
        let params = ChainParams::for_network(Network::Solonet);
        let block = genesis::block(Network::Solonet);
        let coinbase = block.coinbase_transaction().unwrap();
        let amount = coinbase.created_by_asset().get(&params.native_asset).copied().unwrap_or(0);
        assert_eq!(amount, params.block_subsidy(solidus_chain::block::Height(0)) as u128);
        let _backing: HashMap<solidus_chain::entry::EntryId, UtxoEntry> = HashMap::new();
    }
}
