//! Shared test scaffolding used across the workspace's own test suites:
//! a one-time tracing subscriber and a handful of builders for transactions
//! and blocks that don't need to be consensus-valid, just well-formed.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use solidus_chain::amount::{AssetAmount, AssetId};
use solidus_chain::block::{merkle, Block, Hash as BlockHash, Header, Height};
use solidus_chain::transaction::{TimeRange, Transaction};
use solidus_chain::txio::{CoinbaseData, ControlProgram, TxInput, TxOutput};
use solidus_chain::work::difficulty::CompactDifficulty;

static TRACING: OnceCell<()> = OnceCell::new();

/// Installs a tracing subscriber for the current process, once. Tests call
/// this at the top of their body; later calls are free.
pub fn init() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let _ = color_eyre::install();
    });
}

/// A coinbase-only transaction paying `subsidy` to `control_program`.
pub fn coinbase_transaction(subsidy: u64, control_program: ControlProgram) -> Transaction {
    Transaction::new(
        1,
        TimeRange::unbounded(),
        vec![TxInput::Coinbase { data: CoinbaseData(Vec::new()) }],
        vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, subsidy), control_program)],
    )
}

/// A well-formed, but not necessarily consensus-valid, block extending
/// `previous` with exactly one coinbase transaction.
pub fn block_extending(previous: &Block, control_program: ControlProgram) -> Block {
    let height = previous.height().next();
    let coinbase = Arc::new(coinbase_transaction(0, control_program));
    let merkle_root: merkle::Root = vec![coinbase.hash()].into_iter().collect();
    let status_root = merkle::status_root(&[true]);

    let header = Header::new(
        previous.header.version,
        height,
        previous.hash(),
        previous.header.time + chrono::Duration::seconds(600),
        previous.header.difficulty_threshold,
        0,
        merkle_root,
        status_root,
        BlockHash([0u8; 32]),
    );

    Block { header, transactions: vec![coinbase] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::parameters::{genesis, Network};

    #[test]
    fn block_extending_chains_onto_its_parent() {
        let parent = genesis::block(Network::Solonet);
        let child = block_extending(&parent, ControlProgram::trivial_true());
        assert_eq!(child.header.previous_block_hash, parent.hash());
        assert_eq!(child.height(), Height(1));
    }
}
