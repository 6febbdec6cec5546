//! One peer connection's handler task (`spec.md` §4.8/§5: "one task per
//! peer"): speaks the length-prefixed [`Message`] protocol over a single
//! `TcpStream`, driving a private [`Synchroniser`] and [`BanScore`] and
//! forwarding accepted blocks/transactions to the shared [`ChainHandle`]/
//! [`MempoolHandle`] actors.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use solidus_chain::block::Hash as BlockHash;
use solidus_network::codec::Codec;
use solidus_network::message::BlockSelector;
use solidus_network::peer::{BanScore, Misbehaviour, PeerStatus};
use solidus_network::sync::{SyncRequest, Synchroniser, SYNC_TIMEOUT};
use solidus_network::{Checkpoints, Message};

use crate::chain_actor::ChainHandle;
use crate::mempool_actor::MempoolHandle;

/// Why the connection ended, so the caller's address book can decide
/// whether to cool the remote address down (`spec.md` §4.8 ban scoring).
pub enum Outcome {
    Closed,
    Banned,
}

pub async fn run(stream: TcpStream, addr: SocketAddr, genesis_hash: BlockHash, checkpoints: Checkpoints, chain: ChainHandle, mempool: MempoolHandle) -> Outcome {
    let mut framed = Framed::new(stream, Codec::new());
    let mut ban_score = BanScore::default();
    let mut synchroniser = Synchroniser::new(genesis_hash, checkpoints);
    let mut peer: Option<PeerStatus> = None;

    let local = chain.best_node().await;
    let status = Message::StatusResponse {
        best_height: local.height,
        best_hash: local.hash,
        genesis_hash,
        services: 0,
    };
    if framed.send(status).await.is_err() {
        return Outcome::Closed;
    }

    loop {
        if ban_score.exceeds_threshold() {
            tracing::warn!(%addr, "peer exceeded ban threshold, disconnecting");
            return Outcome::Banned;
        }

        let next = match timeout(SYNC_TIMEOUT, framed.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(err))) => {
                tracing::debug!(%addr, error = %err, "peer sent a malformed message");
                return Outcome::Closed;
            }
            Ok(None) => return Outcome::Closed,
            Err(_) => {
                ban_score.add(Misbehaviour::REQUEST_TIMEOUT);
                continue;
            }
        };

        match next {
            Message::StatusRequest => {
                let local = chain.best_node().await;
                let reply = Message::StatusResponse {
                    best_height: local.height,
                    best_hash: local.hash,
                    genesis_hash,
                    services: 0,
                };
                if framed.send(reply).await.is_err() {
                    return Outcome::Closed;
                }
            }
            Message::StatusResponse { best_height, best_hash, genesis_hash: peer_genesis, services } => {
                let status = PeerStatus { best_height, best_hash, genesis_hash: peer_genesis, services };
                if !synchroniser.accepts_peer(&status) {
                    tracing::info!(%addr, "peer genesis mismatch");
                    return Outcome::Banned;
                }
                peer = Some(status);
                ban_score.record_good_behaviour();

                let local = chain.best_node().await;
                let locator = chain.locator().await;
                match synchroniser.poll(local.height, local.hash, locator, &status) {
                    SyncRequest::GetHeaders { locator, stop_hash } => {
                        if framed.send(Message::GetHeaders { locator, stop_hash }).await.is_err() {
                            return Outcome::Closed;
                        }
                    }
                    SyncRequest::GetBlocks { .. } | SyncRequest::UpToDate => {}
                }
            }
            Message::GetHeaders { locator, stop_hash } => {
                let headers = chain.headers_after(locator, stop_hash).await;
                if framed.send(Message::Headers(headers)).await.is_err() {
                    return Outcome::Closed;
                }
            }
            Message::Headers(headers) => {
                let local = chain.best_node().await;
                if let Err(misbehaviour) = synchroniser.receive_headers(local.height, headers) {
                    ban_score.add(misbehaviour);
                    continue;
                }
                ban_score.record_good_behaviour();
                if let Some(status) = &peer {
                    if let Some(SyncRequest::GetBlocks { locator, stop_hash }) = synchroniser.next_blocks_request(status.best_hash) {
                        if framed.send(Message::GetBlocks { locator, stop_hash }).await.is_err() {
                            return Outcome::Closed;
                        }
                    }
                }
            }
            Message::GetBlocks { locator, stop_hash } => {
                let blocks = chain.blocks_after(locator, stop_hash).await;
                if framed.send(Message::Blocks(blocks)).await.is_err() {
                    return Outcome::Closed;
                }
            }
            Message::Blocks(blocks) => {
                if let Err(misbehaviour) = synchroniser.receive_blocks(blocks.clone()) {
                    ban_score.add(misbehaviour);
                    continue;
                }
                for block in blocks {
                    accept_block(&chain, block, &mut ban_score).await;
                }
                ban_score.record_good_behaviour();
            }
            Message::GetBlock(selector) => {
                let block = match selector {
                    BlockSelector::Hash(hash) => chain.block_by_hash(hash).await,
                    BlockSelector::Height(height) => chain.block_by_height(height).await,
                };
                if let Some(block) = block {
                    if framed.send(Message::Block(block)).await.is_err() {
                        return Outcome::Closed;
                    }
                }
            }
            Message::Block(block) | Message::MineBlock(block) => {
                let parent = block.header.previous_block_hash;
                let is_orphan = accept_block(&chain, block, &mut ban_score).await;
                if is_orphan {
                    let request = Message::GetBlock(BlockSelector::Hash(parent));
                    if framed.send(request).await.is_err() {
                        return Outcome::Closed;
                    }
                }
            }
            Message::Transaction(tx) => {
                let next_height = chain.best_node().await.height.next();
                match mempool.process_tx(next_height, Utc::now(), tx).await {
                    Ok(_) => ban_score.record_good_behaviour(),
                    Err(err) => tracing::debug!(%addr, error = %err, "rejected transaction from peer"),
                }
            }
        }
    }
}

/// Submits `block` to the shared chain actor and folds the outcome into
/// the connection's ban score. Returns whether the block was parked as an
/// orphan, so the caller can request its parent.
async fn accept_block(chain: &ChainHandle, block: solidus_chain::block::Block, ban_score: &mut BanScore) -> bool {
    match chain.process_block(block, Utc::now()).await {
        Ok(is_orphan) => {
            if !is_orphan {
                ban_score.record_good_behaviour();
            }
            is_orphan
        }
        Err(err) => {
            tracing::info!(error = %err, "peer sent an invalid block");
            ban_score.add(Misbehaviour::INVALID_BLOCK);
            false
        }
    }
}

/// Dials a seed address with a fixed connect timeout, per `spec.md` §5's
/// "every long-running task observes... a deadline" for network I/O.
pub async fn dial(addr: SocketAddr) -> std::io::Result<TcpStream> {
    timeout(Duration::from_secs(10), TcpStream::connect(addr)).await.map_err(|_| std::io::ErrorKind::TimedOut.into())?
}
