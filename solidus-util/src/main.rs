//! A small developer utility for inspecting chain data, distinct from
//! `solidus-node`'s RPC-backed CLI: this tool works directly against
//! encoded bytes and the in-process consensus parameters, with no running
//! node required.

use std::io::Read;
use std::path::PathBuf;

use structopt::StructOpt;

use solidus_chain::block::Block;
use solidus_chain::codec::Decode;
use solidus_chain::parameters::{genesis, ChainParams, Network};

#[derive(StructOpt)]
#[structopt(about = "inspect solidus chain data without a running node")]
enum Command {
    /// Print the genesis block's hash and subsidy for a network.
    GenesisHash {
        #[structopt(long, default_value = "solonet")]
        network: Network,
    },
    /// Decode a raw block from a file and print a summary as JSON.
    DecodeBlock {
        path: PathBuf,
    },
}

fn read_block(path: &PathBuf) -> color_eyre::Result<Block> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;
    Ok(Block::decode(&bytes[..])?)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    match Command::from_args() {
        Command::GenesisHash { network } => {
            let params = ChainParams::for_network(network);
            let block = genesis::block(network);
            let summary = serde_json::json!({
                "network": format!("{:?}", network),
                "hash": block.hash().to_string(),
                "subsidy": params.block_subsidy(block.height()),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::DecodeBlock { path } => {
            let block = read_block(&path)?;
            let summary = serde_json::json!({
                "height": block.height().0,
                "hash": block.hash().to_string(),
                "transaction_count": block.transactions.len(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
