//! `GetWork`/`SubmitWork` pool mode (`spec.md` §4.9): a miner can ask for a
//! header to search externally, and submit a solved header back. A submission
//! is rejected as stale if the template it was issued against is no longer
//! the one the pool is handing out.

use solidus_chain::block::{Block, Hash, Header};
use thiserror::Error;

use crate::pow::hash_meets_target;

#[derive(Error, Debug, Eq, PartialEq)]
pub enum SubmitError {
    #[error("submitted header does not match any outstanding template")]
    UnknownTemplate,
    #[error("submitted header's previous_block_hash no longer matches the current tip")]
    Stale,
    #[error("submitted header does not satisfy its declared difficulty target")]
    BelowTarget,
}

/// The current work the pool is handing out to external hashers, keyed by
/// the template's own hash so a late submission against a superseded
/// template is recognized as stale rather than silently accepted.
pub struct WorkQueue {
    current: Option<Block>,
}

impl Default for WorkQueue {
    fn default() -> WorkQueue {
        WorkQueue { current: None }
    }
}

impl WorkQueue {
    pub fn new() -> WorkQueue {
        WorkQueue::default()
    }

    /// Replaces the outstanding template, e.g. whenever the tip advances or
    /// the mempool contents change enough to justify rebuilding.
    pub fn set_template(&mut self, block: Block) {
        self.current = Some(block);
    }

    /// The header external hashers should search, without its solved nonce.
    pub fn get_work(&self) -> Option<&Header> {
        self.current.as_ref().map(|b| &b.header)
    }

    /// `spec.md` §4.9: accepts a solved header only if it still points at the
    /// current template's parent and its hash actually satisfies the target.
    pub fn submit_work(&self, header: Header) -> Result<Block, SubmitError> {
        let template = self.current.as_ref().ok_or(SubmitError::UnknownTemplate)?;
        if header.previous_block_hash != template.header.previous_block_hash {
            return Err(SubmitError::Stale);
        }
        let target = header
            .difficulty_threshold
            .to_expanded()
            .ok_or(SubmitError::BelowTarget)?
            .0;
        let hash: Hash = header.hash();
        if !hash_meets_target(hash, target) {
            return Err(SubmitError::BelowTarget);
        }
        let mut solved = template.clone();
        solved.header = header;
        Ok(solved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::parameters::{genesis, Network};
    use solidus_chain::work::difficulty::CompactDifficulty;

    #[test]
    fn submitting_against_a_superseded_template_is_stale() {
        let mut queue = WorkQueue::new();
        let first = genesis::block(Network::Solonet);
        queue.set_template(first.clone());

        let mut second = first.clone();
        second.header = Header::new(
            1,
            first.header.height.next(),
            Hash([9u8; 32]),
            first.header.time,
            first.header.difficulty_threshold,
            0,
            first.header.merkle_root,
            first.header.transaction_status_root,
            Hash([0u8; 32]),
        );
        queue.set_template(second);

        let err = queue.submit_work(first.header).unwrap_err();
        assert_eq!(err, SubmitError::Stale);
    }

    #[test]
    fn submitting_a_header_below_target_is_rejected() {
        let mut queue = WorkQueue::new();
        let mut block = genesis::block(Network::Solonet);
        block.header.difficulty_threshold = CompactDifficulty(0x1d00ffff);
        queue.set_template(block.clone());

        let err = queue.submit_work(block.header).unwrap_err();
        assert_eq!(err, SubmitError::BelowTarget);
    }
}
