//! The solidus full node binary: wires the single-writer `Chain` and
//! `Mempool` actors, the P2P listener/dialer, and the optional miner and
//! wallet tasks together (`spec.md` §5).

mod chain_actor;
mod config;
mod mempool_actor;
mod miner_task;
mod peer_conn;
mod rpc_error;
mod wallet_task;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing_futures::Instrument;
use tracing_subscriber::prelude::*;

use solidus_chain::block::Height;
use solidus_chain::parameters::ChainParams;
use solidus_chain::parameters::genesis;
use solidus_chain::txio::ControlProgram;
use solidus_consensus::Chain;
use solidus_miner::WorkQueue;
use solidus_network::Checkpoints;
use solidus_state::Store;
use solidus_wallet::{Wallet, WalletStore};

use chain_actor::ChainHandle;
use config::{Config, DbBackend};
use mempool_actor::MempoolHandle;

#[derive(StructOpt)]
#[structopt(about = "a solidus full node")]
struct Opt {
    /// Path to the node's TOML configuration document. Missing files fall
    /// back to `Config::default()` (solonet, sled, mining and P2P off).
    #[structopt(long, default_value = "solidus.toml")]
    config: PathBuf,
}

fn open_store(backend: DbBackend, data_dir: &std::path::Path) -> color_eyre::Result<Store> {
    Ok(match backend {
        DbBackend::Sled => Store::open(data_dir.join("chain"))?,
        DbBackend::Memory => Store::in_memory(),
    })
}

fn open_wallet_store(backend: DbBackend, data_dir: &std::path::Path) -> color_eyre::Result<WalletStore> {
    Ok(match backend {
        DbBackend::Sled => WalletStore::open(data_dir.join("wallet"))?,
        DbBackend::Memory => WalletStore::in_memory(),
    })
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_error::ErrorLayer::default())
        .init();

    let opt = Opt::from_args();
    let config = if opt.config.exists() { Config::load(&opt.config)? } else { Config::default() };

    let params = ChainParams::for_network(config.chain_id);
    let data_dir = config.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let store = open_store(config.db_backend, &data_dir)?;
    let shared_store = Arc::new(store.clone());
    let genesis_hash = genesis::block(config.chain_id).hash();

    let chain = Chain::new(params, config.chain_id, store)?;
    let chain_handle = ChainHandle::spawn(chain);
    let mempool_handle = MempoolHandle::spawn(params, shared_store.clone());

    let mut tasks = Vec::new();

    if config.mining.enable {
        let work_queue = Arc::new(Mutex::new(WorkQueue::new()));
        let coinbase_program = ControlProgram::trivial_true();
        tasks.push(tokio::spawn(miner_task::run(
            params,
            chain_handle.clone(),
            mempool_handle.clone(),
            coinbase_program,
            work_queue,
        )));
    }

    if !config.wallet.disable {
        let wallet_store = open_wallet_store(config.db_backend, &data_dir)?;
        let wallet = Wallet::new(wallet_store);
        if config.wallet.rescan {
            let tip = chain_handle.best_node().await.height;
            wallet.reset_to_height(shared_store.as_ref(), Height(0), tip)?;
        }
        tasks.push(tokio::spawn(wallet_task::run(wallet, chain_handle.clone(), mempool_handle.clone())));
    }

    let checkpoints = Checkpoints::empty();
    let listener = TcpListener::bind(config.p2p.listen_address).await?;
    tracing::info!(address = %config.p2p.listen_address, "listening for peers");

    let listen_chain = chain_handle.clone();
    let listen_mempool = mempool_handle.clone();
    let listen_checkpoints = checkpoints.clone();
    tasks.push(tokio::spawn(async move {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to accept an inbound connection");
                    continue;
                }
            };
            tracing::info!(%addr, "accepted inbound peer connection");
            spawn_peer(stream, addr, genesis_hash, listen_checkpoints.clone(), listen_chain.clone(), listen_mempool.clone());
        }
    }));

    for seed in config.p2p.seeds.clone() {
        let chain = chain_handle.clone();
        let mempool = mempool_handle.clone();
        let checkpoints = checkpoints.clone();
        tasks.push(tokio::spawn(async move {
            match peer_conn::dial(seed).await {
                Ok(stream) => {
                    tracing::info!(address = %seed, "connected to seed peer");
                    spawn_peer(stream, seed, genesis_hash, checkpoints, chain, mempool);
                }
                Err(err) => tracing::warn!(address = %seed, error = %err, "failed to dial seed peer"),
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

/// Spawns one peer connection's handler task and logs its eventual outcome
/// (`spec.md` §4.8: a banned peer is simply dropped, not retried here).
fn spawn_peer(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    genesis_hash: solidus_chain::block::Hash,
    checkpoints: Checkpoints,
    chain: ChainHandle,
    mempool: MempoolHandle,
) {
    metrics::counter!("node.peers.connected.count", 1);
    let span = tracing::info_span!("peer", %addr);
    tokio::spawn(
        async move {
            match peer_conn::run(stream, addr, genesis_hash, checkpoints, chain, mempool).await {
                peer_conn::Outcome::Closed => tracing::debug!("peer connection closed"),
                peer_conn::Outcome::Banned => {
                    metrics::counter!("node.peers.banned.count", 1);
                    tracing::info!("peer connection closed for misbehaviour");
                }
            }
        }
        .instrument(span),
    );
}
