//! The in-memory block index and fork-choice state (`spec.md` §3 `BlockNode`,
//! §4.4).
//!
//! The index owns every `BlockNode` it has ever seen in a slab (`nodes`,
//! keyed by hash), so a node's `parent` is a hash lookup rather than a
//! pointer — there is no cycle risk even though the tree is logically
//! self-referential (`spec.md` §9 "cyclic references").

use chrono::{DateTime, Utc};
use primitive_types::U256;
use solidus_chain::block::{Hash, Header, Height};
use solidus_chain::work::difficulty::{CompactDifficulty, ExpandedDifficulty};
use std::collections::HashMap;

/// A block's position in the tree: its own summary fields plus the
/// cumulative proof-of-work behind it (`spec.md` §3).
#[derive(Clone, Copy, Debug)]
pub struct BlockNode {
    pub hash: Hash,
    pub parent: Option<Hash>,
    pub height: Height,
    pub time: DateTime<Utc>,
    pub bits: CompactDifficulty,
    pub cumulative_work: U256,
    pub version: u32,
}

impl BlockNode {
    pub fn genesis(header: &Header) -> BlockNode {
        let work = header
            .difficulty_threshold
            .to_expanded()
            .expect("genesis difficulty bits are well-formed")
            .work();
        BlockNode {
            hash: header.hash(),
            parent: None,
            height: header.height,
            time: header.time,
            bits: header.difficulty_threshold,
            cumulative_work: work,
            version: header.version,
        }
    }

    pub fn child(header: &Header, parent: &BlockNode) -> BlockNode {
        let work = header
            .difficulty_threshold
            .to_expanded()
            .expect("difficulty has already been validated")
            .work();
        BlockNode {
            hash: header.hash(),
            parent: Some(parent.hash),
            height: header.height,
            time: header.time,
            bits: header.difficulty_threshold,
            cumulative_work: parent.cumulative_work + work,
            version: header.version,
        }
    }
}

/// The parent-linked tree of every block header seen so far, plus a pointer
/// to the current best chain (`spec.md` §4.4 M-1/M-2).
pub struct BlockIndex {
    nodes: HashMap<Hash, BlockNode>,
    /// `main_chain[i]` is the hash of the main-chain block at height `i`.
    main_chain: Vec<Hash>,
    /// Insertion order among nodes tied on cumulative work, so ties break by
    /// earliest-seen (`spec.md` §3).
    seen_order: HashMap<Hash, u64>,
    next_seen: u64,
}

impl BlockIndex {
    pub fn new(genesis: &Header) -> BlockIndex {
        let node = BlockNode::genesis(genesis);
        let mut nodes = HashMap::new();
        let mut seen_order = HashMap::new();
        nodes.insert(node.hash, node);
        seen_order.insert(node.hash, 0);
        BlockIndex {
            nodes,
            main_chain: vec![node.hash],
            seen_order,
            next_seen: 1,
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<&BlockNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Inserts a header's node once its parent is already indexed. Returns
    /// the new node; does not itself decide whether this changes the main
    /// chain (`spec.md` §4.7 step 5 does that separately).
    pub fn insert(&mut self, header: &Header) -> BlockNode {
        let parent = *self
            .nodes
            .get(&header.previous_block_hash)
            .expect("caller only inserts headers whose parent is indexed");
        let node = BlockNode::child(header, &parent);
        self.nodes.insert(node.hash, node);
        self.seen_order.insert(node.hash, self.next_seen);
        self.next_seen += 1;
        node
    }

    pub fn best_node(&self) -> &BlockNode {
        self.nodes
            .get(self.main_chain.last().expect("main chain always has genesis"))
            .expect("best hash is always indexed")
    }

    pub fn main_chain_len(&self) -> usize {
        self.main_chain.len()
    }

    pub fn hash_at_height(&self, height: Height) -> Option<Hash> {
        self.main_chain.get(height.0 as usize).copied()
    }

    pub fn is_main_chain(&self, hash: &Hash) -> bool {
        self.hash_at_height(self.nodes.get(hash).map(|n| n.height).unwrap_or(Height(u32::MAX)))
            .map(|h| &h == hash)
            .unwrap_or(false)
    }

    /// Whether `candidate` should replace the current best node — strictly
    /// more cumulative work, or equal work and seen earlier (`spec.md` §3,
    /// §4.4 M-2, P5).
    pub fn is_better_than_best(&self, candidate: &BlockNode) -> bool {
        let best = self.best_node();
        match candidate.cumulative_work.cmp(&best.cumulative_work) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                self.seen_order[&candidate.hash] < self.seen_order[&best.hash]
            }
        }
    }

    /// Walks from `node`'s hash back to the current main chain, returning
    /// the ancestor chain (oldest first) from just after the fork point.
    fn path_from_fork(&self, mut hash: Hash) -> (Hash, Vec<Hash>) {
        let mut path = Vec::new();
        while !self.is_main_chain(&hash) {
            path.push(hash);
            hash = self.nodes[&hash].parent.expect("non-genesis node has a parent");
        }
        path.reverse();
        (hash, path)
    }

    /// Recomputes `main_chain` to run through `new_best`, returning the
    /// hashes to detach (highest first, old-chain order) and the hashes to
    /// attach (lowest first) — the reorg plan `spec.md` §4.7 builds before
    /// mutating anything else.
    pub fn reorg_plan(&self, new_best: &BlockNode) -> (Vec<Hash>, Vec<Hash>) {
        let (fork_point, attach) = self.path_from_fork(new_best.hash);
        let fork_height = self.nodes[&fork_point].height;
        let detach: Vec<Hash> = self.main_chain[(fork_height.0 as usize + 1)..]
            .iter()
            .rev()
            .copied()
            .collect();
        (detach, attach)
    }

    /// Applies a previously computed reorg plan by rewriting `main_chain`
    /// to match. Called only after the caller has successfully detached and
    /// re-attached every block in the plan against the UTXO view and store.
    pub fn commit_reorg(&mut self, new_best: Hash) {
        let mut chain = Vec::new();
        let mut hash = new_best;
        loop {
            let node = self.nodes[&hash];
            chain.push(hash);
            match node.parent {
                Some(parent) => hash = parent,
                None => break,
            }
        }
        chain.reverse();
        self.main_chain = chain;
    }

    /// `spec.md` §4.4 `CalcPastMedianTime`: the median of `node` and its
    /// ancestors, up to `median_time_blocks` timestamps.
    pub fn past_median_time(&self, node: &BlockNode, median_time_blocks: usize) -> DateTime<Utc> {
        let mut timestamps = Vec::with_capacity(median_time_blocks);
        let mut current = Some(*node);
        while timestamps.len() < median_time_blocks {
            match current {
                Some(n) => {
                    timestamps.push(n.time);
                    current = n.parent.map(|p| self.nodes[&p]);
                }
                None => break,
            }
        }
        timestamps.sort();
        timestamps[timestamps.len() / 2]
    }

    /// `spec.md` §4.4 `CalcNextRequiredDifficulty`.
    pub fn next_required_difficulty(
        &self,
        last: &BlockNode,
        blocks_per_retarget: u64,
        target_seconds_per_block: u64,
        min_bits: u32,
    ) -> CompactDifficulty {
        if last.height.0 == 0 || last.height.0 as u64 % blocks_per_retarget != 0 {
            return last.bits;
        }

        let mut compare = *last;
        for _ in 0..blocks_per_retarget {
            match compare.parent {
                Some(p) => compare = self.nodes[&p],
                None => break,
            }
        }

        let actual_time_span = (last.time - compare.time).num_seconds().max(1) as u64;
        let target_time_span = blocks_per_retarget * target_seconds_per_block;

        let old_target = last
            .bits
            .to_expanded()
            .expect("stored difficulty bits are well-formed")
            .0;
        let new_target = old_target * U256::from(actual_time_span) / U256::from(target_time_span);
        let limit = ExpandedDifficulty::target_difficulty_limit(min_bits).0;
        let clamped = new_target.min(limit);
        CompactDifficulty::from_expanded(ExpandedDifficulty(clamped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::block::merkle;
    use solidus_chain::parameters::{ChainParams, Network};
    use solidus_chain::parameters::genesis;
    use chrono::TimeZone;

    #[test]
    fn genesis_is_the_initial_best_node() {
        let genesis_block = genesis::block(Network::Solonet);
        let index = BlockIndex::new(&genesis_block.header);
        assert_eq!(index.best_node().hash, genesis_block.hash());
        assert_eq!(index.main_chain_len(), 1);
    }

    #[test]
    fn past_median_time_matches_scenario_s1() {
        // spec.md S1: heights 0..10 have timestamps [1,2,...,8,11,10,9];
        // median of ancestors of height 10 (i.e. heights 0..10) is 6.
        let params = ChainParams::for_network(Network::Solonet);
        let base = Utc.timestamp(0, 0);
        let mut header = Header::new(
            1,
            Height(0),
            solidus_chain::block::Hash([0u8; 32]),
            base,
            CompactDifficulty(params.min_bits),
            0,
            merkle::Root([0u8; 32]),
            merkle::status_root(&[]),
            solidus_chain::block::Hash([0u8; 32]),
        );
        let mut index = BlockIndex::new(&header);
        let timestamps = [1, 2, 3, 4, 5, 6, 7, 8, 11, 10, 9];
        for t in &timestamps[1..] {
            header = Header::new(
                1,
                header.height.next(),
                header.hash(),
                Utc.timestamp(*t, 0),
                CompactDifficulty(params.min_bits),
                0,
                merkle::Root([0u8; 32]),
                merkle::status_root(&[]),
                solidus_chain::block::Hash([0u8; 32]),
            );
            let node = index.insert(&header);
            if index.is_better_than_best(&node) {
                index.commit_reorg(node.hash);
            }
        }
        let tip = *index.best_node();
        assert_eq!(tip.height, Height(10));
        let median = index.past_median_time(&tip, 11);
        assert_eq!(median, Utc.timestamp(6, 0));
    }
}
