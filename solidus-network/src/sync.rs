//! The headers-first synchroniser (`spec.md` §4.8): drives a peer through
//! locator-based header requests, then fetches the blocks those headers
//! describe, plus a separate path for freshly announced blocks.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use solidus_chain::block::{Block, Hash as BlockHash, Header, Height};

use crate::checkpoints::Checkpoints;
use crate::message::{Locator, Message, MAX_BLOCK_HEADERS_PER_MSG, MAX_BLOCKS_PER_MSG};
use crate::peer::{BanScore, Misbehaviour, PeerStatus};

/// How long a sync request may go unanswered before it counts as a failure
/// (`spec.md` §4.8 `syncTimeout`).
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// What a sync round asks of a peer next, decided purely from local state
/// so it can be unit tested without a network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncRequest {
    GetHeaders { locator: Locator, stop_hash: BlockHash },
    GetBlocks { locator: Locator, stop_hash: BlockHash },
    UpToDate,
}

/// Drives one peer's header sync. Owns no I/O; `Synchroniser::poll` is
/// handed the peer's advertised status and returns the next request to
/// send, and `Synchroniser::receive_headers`/`receive_blocks` are handed
/// the peer's replies.
pub struct Synchroniser {
    checkpoints: Checkpoints,
    genesis_hash: BlockHash,
    pending_headers: VecDeque<Header>,
}

impl Synchroniser {
    pub fn new(genesis_hash: BlockHash, checkpoints: Checkpoints) -> Synchroniser {
        Synchroniser { checkpoints, genesis_hash, pending_headers: VecDeque::new() }
    }

    /// Rejects a peer outright on handshake if its genesis doesn't match
    /// ours; `spec.md` §4.8's "mismatched genesis or network → drop".
    pub fn accepts_peer(&self, status: &PeerStatus) -> bool {
        status.genesis_hash == self.genesis_hash
    }

    /// Decides what to request next given the local tip and a peer's
    /// advertised tip.
    pub fn poll(&self, local_tip: Height, local_tip_hash: BlockHash, locator: Locator, peer: &PeerStatus) -> SyncRequest {
        if peer.best_height.0 <= local_tip.0 {
            return SyncRequest::UpToDate;
        }
        let _ = local_tip_hash;
        SyncRequest::GetHeaders { locator, stop_hash: peer.best_hash }
    }

    /// Validates a batch of headers a peer sent in answer to `GetHeaders`:
    /// checkpoint gating plus the per-message cap, returning a ban penalty
    /// on violation.
    pub fn receive_headers(&mut self, local_tip: Height, headers: Vec<Header>) -> Result<(), Misbehaviour> {
        if headers.len() > MAX_BLOCK_HEADERS_PER_MSG {
            return Err(Misbehaviour::INVALID_MESSAGE);
        }
        for header in &headers {
            if let Some((checkpoint_height, checkpoint_hash)) = self.checkpoints.next_after(local_tip) {
                if header.height == checkpoint_height && header.hash() != checkpoint_hash {
                    return Err(Misbehaviour::CHECKPOINT_MISMATCH);
                }
            }
        }
        self.pending_headers.extend(headers);
        Ok(())
    }

    pub fn next_blocks_request(&self, stop_hash: BlockHash) -> Option<SyncRequest> {
        if self.pending_headers.is_empty() {
            return None;
        }
        let locator = Locator(self.pending_headers.iter().map(|h| h.hash()).collect());
        Some(SyncRequest::GetBlocks { locator, stop_hash })
    }

    pub fn receive_blocks(&mut self, blocks: Vec<Block>) -> Result<(), Misbehaviour> {
        if blocks.len() > MAX_BLOCKS_PER_MSG {
            return Err(Misbehaviour::INVALID_MESSAGE);
        }
        for block in &blocks {
            self.pending_headers.retain(|h| h.hash() != block.hash());
        }
        Ok(())
    }

    pub fn is_caught_up(&self) -> bool {
        self.pending_headers.is_empty()
    }
}

/// The separate path for freshly mined blocks a peer announces
/// unprompted: dedupe by hash, and if a block's parent is unknown, ask for
/// it rather than the announced block's ancestry at large.
pub struct BlockFetcher {
    seen: HashSet<BlockHash>,
    queue: VecDeque<Block>,
}

impl Default for BlockFetcher {
    fn default() -> BlockFetcher {
        BlockFetcher { seen: HashSet::new(), queue: VecDeque::new() }
    }
}

impl BlockFetcher {
    pub fn new() -> BlockFetcher {
        BlockFetcher::default()
    }

    /// Returns `true` if the block was new and queued for processing.
    pub fn announce(&mut self, block: Block) -> bool {
        let hash = block.hash();
        if !self.seen.insert(hash) {
            return false;
        }
        self.queue.push_back(block);
        true
    }

    pub fn next(&mut self) -> Option<Block> {
        self.queue.pop_front()
    }

    /// What to request when `process_block` reports the block's parent is
    /// missing: the parent by hash, per `spec.md` §4.8.
    pub fn request_parent(&self, block: &Block) -> Message {
        Message::GetBlock(crate::message::BlockSelector::Hash(block.header.previous_block_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solidus_chain::work::difficulty::CompactDifficulty;

    fn header_at(height: Height, previous: BlockHash) -> Header {
        Header::new(
            1,
            height,
            previous,
            Utc::now(),
            CompactDifficulty(0x1d00ffff),
            0,
            solidus_chain::block::merkle::Root([0u8; 32]),
            solidus_chain::block::merkle::Root([0u8; 32]),
            BlockHash([0u8; 32]),
        )
    }

    #[test]
    fn a_peer_behind_the_local_tip_is_considered_up_to_date() {
        let sync = Synchroniser::new(BlockHash([0u8; 32]), Checkpoints::empty());
        let peer = PeerStatus {
            best_height: Height(5),
            best_hash: BlockHash([5u8; 32]),
            genesis_hash: BlockHash([0u8; 32]),
            services: 0,
        };
        let request = sync.poll(Height(10), BlockHash([10u8; 32]), Locator(vec![]), &peer);
        assert_eq!(request, SyncRequest::UpToDate);
    }

    #[test]
    fn a_header_contradicting_the_next_checkpoint_is_rejected() {
        let checkpoint_hash = BlockHash([9u8; 32]);
        let checkpoints = Checkpoints::new(vec![(Height(1), checkpoint_hash)]);
        let mut sync = Synchroniser::new(BlockHash([0u8; 32]), checkpoints);
        let header = header_at(Height(1), BlockHash([0u8; 32]));
        assert_ne!(header.hash(), checkpoint_hash);
        let result = sync.receive_headers(Height(0), vec![header]);
        assert!(matches!(result, Err(_)));
    }

    #[test]
    fn block_fetcher_drops_duplicate_announcements() {
        let mut fetcher = BlockFetcher::new();
        let header = header_at(Height(1), BlockHash([0u8; 32]));
        let block = Block { header, transactions: vec![] };
        assert!(fetcher.announce(block.clone()));
        assert!(!fetcher.announce(block));
    }
}
