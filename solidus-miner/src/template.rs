//! Block template assembly (`spec.md` §4.9 step 1-5): snapshot the tip,
//! walk the mempool in fee-per-weight order against a scratch `UtxoView`,
//! and produce a candidate block with everything but a winning nonce.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use solidus_chain::block::{merkle, Block, Header, Height};
use solidus_chain::parameters::ChainParams;
use solidus_chain::transaction::{Hash as TxHash, Transaction};
use solidus_chain::txio::{CoinbaseData, ControlProgram, TxInput, TxOutput};
use solidus_chain::work::difficulty::CompactDifficulty;
use solidus_mempool::Mempool;
use solidus_state::{BlockIndex, BlockNode, UtxoSource, UtxoView};

/// A candidate block plus the ids of transactions that were dropped while
/// assembling it, which the caller should ask the mempool to remove.
pub struct Template {
    pub block: Block,
    pub dropped: Vec<TxHash>,
}

/// `spec.md` §4.9 step 1: the fields derived purely from the chain tip,
/// independent of which transactions end up in the block.
pub struct TemplateHeader {
    pub height: Height,
    pub previous_block_hash: solidus_chain::block::Hash,
    pub bits: CompactDifficulty,
}

pub fn next_header_shape(params: &ChainParams, index: &BlockIndex, parent: &BlockNode) -> TemplateHeader {
    TemplateHeader {
        height: parent.height.next(),
        previous_block_hash: parent.hash,
        bits: index.next_required_difficulty(
            parent,
            params.blocks_per_retarget,
            params.target_seconds_per_block,
            params.min_bits,
        ),
    }
}

/// Builds the coinbase transaction paying `subsidy + fees` to
/// `coinbase_program`, with the block height embedded as arbitrary data
/// (`spec.md` §4.9 step 4).
fn build_coinbase(params: &ChainParams, height: Height, fees: u128, coinbase_program: &ControlProgram) -> Transaction {
    let subsidy = params.block_subsidy(height) as u128;
    let amount = (subsidy + fees).min(u64::MAX as u128) as u64;
    let arbitrary = height.0.to_string().into_bytes();
    Transaction::new(
        1,
        solidus_chain::transaction::TimeRange::unbounded(),
        vec![TxInput::Coinbase {
            data: CoinbaseData(arbitrary),
        }],
        vec![TxOutput::new(
            solidus_chain::amount::AssetAmount::new(params.native_asset, amount),
            coinbase_program.clone(),
        )],
    )
}

/// `spec.md` §4.9 steps 2-5: assembles a full candidate block (sans nonce)
/// against `backing`, the tip's persisted UTXO set, from transactions
/// already ordered by fee-per-weight (highest first).
pub fn assemble_block<'a, S: UtxoSource>(
    params: &ChainParams,
    shape: &TemplateHeader,
    backing: &S,
    candidates: impl IntoIterator<Item = &'a Arc<Transaction>>,
    coinbase_program: &ControlProgram,
    now: DateTime<Utc>,
) -> Template {
    let block_time = now.timestamp().max(0) as u64;

    let mut view = UtxoView::new(backing);
    let mut included: Vec<Arc<Transaction>> = Vec::new();
    let mut statuses = vec![true]; // coinbase's own slot, fixed below.
    let mut dropped = Vec::new();
    let mut total_gas: u64 = 0;
    let mut total_fees: u128 = 0;

    for tx in candidates {
        let candidate_gas = match solidus_consensus::validate_transaction(params, &mut view, shape.height, block_time, tx) {
            Ok(gas) => gas,
            Err(_) => {
                dropped.push(tx.hash());
                continue;
            }
        };

        if total_gas.saturating_add(candidate_gas.gas_used) > params.max_block_gas {
            break;
        }

        total_gas += candidate_gas.gas_used;
        if candidate_gas.gas_valid {
            total_fees += tx.native_fee().unwrap_or(0);
        }
        statuses.push(candidate_gas.gas_valid);
        included.push(tx.clone());
    }

    let coinbase = Arc::new(build_coinbase(params, shape.height, total_fees, coinbase_program));
    let mut transactions = Vec::with_capacity(included.len() + 1);
    transactions.push(coinbase);
    transactions.extend(included);

    let merkle_root = transactions.iter().map(|tx| tx.hash()).collect::<merkle::Root>();
    let status_root = merkle::status_root(&statuses);

    let header = Header::new(
        1,
        shape.height,
        shape.previous_block_hash,
        now,
        shape.bits,
        0,
        merkle_root,
        status_root,
        solidus_chain::block::Hash([0u8; 32]),
    );

    Template {
        block: Block { header, transactions },
        dropped,
    }
}

/// `spec.md` §4.9 steps 2-5: assembles a full candidate block (sans nonce)
/// against `backing`, the tip's persisted UTXO set, walking `mempool`
/// directly in fee-per-weight order.
pub fn build_template<S: UtxoSource>(
    params: &ChainParams,
    index: &BlockIndex,
    parent: &BlockNode,
    backing: &S,
    mempool: &Mempool,
    coinbase_program: &ControlProgram,
    now: DateTime<Utc>,
) -> Template {
    let shape = next_header_shape(params, index, parent);
    let candidates: Vec<Arc<Transaction>> = mempool.entries_by_fee_rate().into_iter().map(|entry| entry.tx.clone()).collect();
    assemble_block(params, &shape, backing, candidates.iter(), coinbase_program, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solidus_chain::amount::{AssetAmount, AssetId};
    use solidus_chain::entry::EntryId;
    use solidus_chain::parameters::{genesis, Network};
    use solidus_state::UtxoEntry;
    use std::collections::HashMap;

    fn setup() -> (ChainParams, BlockIndex, BlockNode) {
        let params = ChainParams::for_network(Network::Solonet);
        let genesis_block = genesis::block(Network::Solonet);
        let index = BlockIndex::new(&genesis_block.header);
        let parent = *index.best_node();
        (params, index, parent)
    }

    #[test]
    fn an_empty_mempool_yields_a_coinbase_only_template() {
        let (params, index, parent) = setup();
        let backing: HashMap<EntryId, UtxoEntry> = HashMap::new();
        let mempool = Mempool::new();
        let template = build_template(
            &params,
            &index,
            &parent,
            &backing,
            &mempool,
            &ControlProgram::trivial_true(),
            Utc::now(),
        );
        assert_eq!(template.block.transactions.len(), 1);
        assert!(template.block.coinbase_transaction().is_some());
        let amount = template.block.transactions[0]
            .created_by_asset()
            .get(&params.native_asset)
            .copied()
            .unwrap_or(0);
        assert_eq!(amount, params.block_subsidy(parent.height.next()) as u128);
    }

    #[test]
    fn a_pending_spend_is_included_and_pays_its_fee_to_the_coinbase() {
        let (params, index, parent) = setup();
        let funding_output = EntryId([7u8; 32]);
        let mut backing: HashMap<EntryId, UtxoEntry> = HashMap::new();
        backing.insert(funding_output, UtxoEntry::new(funding_output, false, Height(0)));

        let mut mempool = Mempool::new();
        let tx = Arc::new(Transaction::new(
            1,
            solidus_chain::transaction::TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id: funding_output,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 10_000),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: ControlProgram::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 9_000), ControlProgram::trivial_true())],
        ));
        mempool
            .process_tx(&params, &backing, parent.height.next(), Utc::now(), tx)
            .unwrap();

        let template = build_template(
            &params,
            &index,
            &parent,
            &backing,
            &mempool,
            &ControlProgram::trivial_true(),
            Utc::now(),
        );
        assert_eq!(template.block.transactions.len(), 2);
        assert!(template.dropped.is_empty());
        let coinbase_amount = template.block.transactions[0]
            .created_by_asset()
            .get(&params.native_asset)
            .copied()
            .unwrap_or(0);
        assert_eq!(
            coinbase_amount,
            params.block_subsidy(parent.height.next()) as u128 + 1_000
        );
    }
}
