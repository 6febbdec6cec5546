//! Wraps `solidus_consensus::Chain` — itself a purely synchronous,
//! single-writer engine — in the async actor `spec.md` §4.7/§5 calls for:
//! one task owns the `Chain` value outright and drains a bounded channel of
//! requests, so every other task (peer connections, the miner, the wallet)
//! talks to it through a cheaply cloneable handle instead of sharing a lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};

use solidus_chain::block::{Block, Hash as BlockHash, Header, Height};
use solidus_chain::parameters::ChainParams;
use solidus_chain::transaction::Transaction;
use solidus_chain::txio::ControlProgram;
use solidus_consensus::{Chain, ChainError, ChainEvent};
use solidus_miner::Template;
use solidus_network::message::{MAX_BLOCKS_PER_MSG, MAX_BLOCK_HEADERS_PER_MSG};
use solidus_network::Locator;
use solidus_state::BlockNode;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

enum Command {
    ProcessBlock { block: Box<Block>, now: DateTime<Utc>, reply: oneshot::Sender<Result<bool, ChainError>> },
    BestNode { reply: oneshot::Sender<BlockNode> },
    Subscribe { reply: oneshot::Sender<broadcast::Receiver<ChainEvent>> },
    BlockByHash { hash: BlockHash, reply: oneshot::Sender<Option<Block>> },
    BlockByHeight { height: Height, reply: oneshot::Sender<Option<Block>> },
    BuildTemplate {
        params: ChainParams,
        candidates: Vec<Arc<Transaction>>,
        coinbase_program: ControlProgram,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Template>,
    },
    Locator { reply: oneshot::Sender<Locator> },
    HeadersAfter { locator: Locator, stop_hash: BlockHash, reply: oneshot::Sender<Vec<Header>> },
    BlocksAfter { locator: Locator, stop_hash: BlockHash, reply: oneshot::Sender<Vec<Block>> },
}

/// A cloneable front for the chain processor task. Every clone shares the
/// same single writer; none of these methods mutate anything directly.
#[derive(Clone)]
pub struct ChainHandle {
    commands: mpsc::Sender<Command>,
}

impl ChainHandle {
    pub fn spawn(chain: Chain) -> ChainHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(run(chain, rx));
        ChainHandle { commands: tx }
    }

    pub async fn process_block(&self, block: Block, now: DateTime<Utc>) -> Result<bool, ChainError> {
        let (reply, response) = oneshot::channel();
        let command = Command::ProcessBlock { block: Box::new(block), now, reply };
        self.commands.send(command).await.expect("chain processor task outlives its handles");
        response.await.expect("chain processor task never drops a reply without answering")
    }

    pub async fn best_node(&self) -> BlockNode {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::BestNode { reply }).await.expect("chain processor task outlives its handles");
        response.await.expect("chain processor task never drops a reply without answering")
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Subscribe { reply }).await.expect("chain processor task outlives its handles");
        response.await.expect("chain processor task never drops a reply without answering")
    }

    pub async fn block_by_hash(&self, hash: BlockHash) -> Option<Block> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::BlockByHash { hash, reply }).await.ok()?;
        response.await.ok()?
    }

    pub async fn block_by_height(&self, height: Height) -> Option<Block> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::BlockByHeight { height, reply }).await.ok()?;
        response.await.ok()?
    }

    /// Builds a candidate block against the current tip's persisted UTXO
    /// set, from `candidates` already ordered by fee-per-weight — the
    /// miner task supplies that ordering from its own `MempoolHandle`
    /// snapshot since `Mempool` itself lives behind a different actor.
    pub async fn build_template(
        &self,
        params: ChainParams,
        candidates: Vec<Arc<Transaction>>,
        coinbase_program: ControlProgram,
        now: DateTime<Utc>,
    ) -> Template {
        let (reply, response) = oneshot::channel();
        let command = Command::BuildTemplate { params, candidates, coinbase_program, now, reply };
        self.commands.send(command).await.expect("chain processor task outlives its handles");
        response.await.expect("chain processor task never drops a reply without answering")
    }

    /// `spec.md` §4.8 `BlockLocator()`: the geometric back-off list of
    /// hashes describing the local main chain.
    pub async fn locator(&self) -> Locator {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Locator { reply }).await.expect("chain processor task outlives its handles");
        response.await.expect("chain processor task never drops a reply without answering")
    }

    /// `spec.md` §4.8 `LocateHeaders`: headers strictly after the locator's
    /// fork point, up to `stop_hash` or the per-message cap.
    pub async fn headers_after(&self, locator: Locator, stop_hash: BlockHash) -> Vec<Header> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::HeadersAfter { locator, stop_hash, reply }).await.expect("chain processor task outlives its handles");
        response.await.unwrap_or_default()
    }

    /// `spec.md` §4.8 `LocateBlocks`: the full blocks for the same range.
    pub async fn blocks_after(&self, locator: Locator, stop_hash: BlockHash) -> Vec<Block> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::BlocksAfter { locator, stop_hash, reply }).await.expect("chain processor task outlives its handles");
        response.await.unwrap_or_default()
    }
}

/// The first locator hash that names a block on the local main chain,
/// i.e. the fork point the caller's chain diverges from (`spec.md` §4.8).
fn fork_height(chain: &Chain, locator: &Locator) -> Height {
    locator
        .0
        .iter()
        .filter_map(|hash| chain.index().get(hash))
        .filter(|node| chain.index().is_main_chain(&node.hash))
        .map(|node| node.height)
        .max()
        .unwrap_or(Height(0))
}

async fn run(mut chain: Chain, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::ProcessBlock { block, now, reply } => {
                let result = chain.process_block(*block, now);
                match &result {
                    Ok(_) => {
                        let tip = chain.best_node();
                        metrics::counter!("chain.committed.block.count", 1);
                        metrics::gauge!("chain.committed.block.height", tip.height.0 as _);
                    }
                    Err(err) => tracing::warn!(error = %err, "rejected block"),
                }
                let _ = reply.send(result);
            }
            Command::BestNode { reply } => {
                let _ = reply.send(chain.best_node());
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(chain.subscribe());
            }
            Command::BlockByHash { hash, reply } => {
                let block = chain.store().get_block(&hash).ok().flatten();
                let _ = reply.send(block);
            }
            Command::BlockByHeight { height, reply } => {
                let block = chain
                    .index()
                    .hash_at_height(height)
                    .and_then(|hash| chain.store().get_block(&hash).ok().flatten());
                let _ = reply.send(block);
            }
            Command::BuildTemplate { params, candidates, coinbase_program, now, reply } => {
                let parent = chain.best_node();
                let shape = solidus_miner::next_header_shape(&params, chain.index(), &parent);
                let template =
                    solidus_miner::assemble_block(&params, &shape, chain.store(), candidates.iter(), &coinbase_program, now);
                let _ = reply.send(template);
            }
            Command::Locator { reply } => {
                let tip = chain.best_node().height;
                let locator = solidus_network::locator::build_locator(tip, |height| chain.index().hash_at_height(height));
                let _ = reply.send(locator);
            }
            Command::HeadersAfter { locator, stop_hash, reply } => {
                let mut height = fork_height(&chain, &locator).next();
                let mut headers = Vec::new();
                while headers.len() < MAX_BLOCK_HEADERS_PER_MSG {
                    let hash = match chain.index().hash_at_height(height) {
                        Some(hash) => hash,
                        None => break,
                    };
                    let header = match chain.store().get_header_by_height(height).ok().flatten() {
                        Some(header) => header,
                        None => break,
                    };
                    let reached_stop = hash == stop_hash;
                    headers.push(header);
                    if reached_stop {
                        break;
                    }
                    height = height.next();
                }
                let _ = reply.send(headers);
            }
            Command::BlocksAfter { locator, stop_hash, reply } => {
                let mut height = fork_height(&chain, &locator).next();
                let mut blocks = Vec::new();
                while blocks.len() < MAX_BLOCKS_PER_MSG {
                    let hash = match chain.index().hash_at_height(height) {
                        Some(hash) => hash,
                        None => break,
                    };
                    let block = match chain.store().get_block(&hash).ok().flatten() {
                        Some(block) => block,
                        None => break,
                    };
                    let reached_stop = hash == stop_hash;
                    blocks.push(block);
                    if reached_stop {
                        break;
                    }
                    height = height.next();
                }
                let _ = reply.send(blocks);
            }
        }
    }
}
