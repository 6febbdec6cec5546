//! A static list of (height, hash) checkpoints (`spec.md` §4.8): while the
//! local tip is below the next checkpoint, a candidate header chain must
//! match the checkpoint at that height or is discarded outright, rather
//! than accepted and later reorganized away.

use solidus_chain::block::{Hash as BlockHash, Height};

/// The checkpoint list for a given genesis. Empty for any network whose
/// genesis isn't recognized (e.g. a private test network), which simply
/// disables checkpoint gating for it rather than erroring.
#[derive(Clone, Debug, Default)]
pub struct Checkpoints(Vec<(Height, BlockHash)>);

impl Checkpoints {
    pub fn new(mut points: Vec<(Height, BlockHash)>) -> Checkpoints {
        points.sort_by_key(|(height, _)| height.0);
        Checkpoints(points)
    }

    pub fn empty() -> Checkpoints {
        Checkpoints(Vec::new())
    }

    /// The first checkpoint strictly above `tip`, the one a header chain
    /// extending the tip must satisfy.
    pub fn next_after(&self, tip: Height) -> Option<(Height, BlockHash)> {
        self.0.iter().find(|(height, _)| height.0 > tip.0).copied()
    }

    /// Whether `hash` is the checkpointed hash at `height`, if any
    /// checkpoint is pinned there. No checkpoint at that height is not a
    /// mismatch.
    pub fn matches(&self, height: Height, hash: &BlockHash) -> bool {
        self.0.iter().find(|(h, _)| *h == height).map_or(true, |(_, expected)| expected == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_header_chain_that_contradicts_a_checkpoint_is_rejected() {
        let checkpoints = Checkpoints::new(vec![(Height(100), BlockHash([1u8; 32]))]);
        assert!(!checkpoints.matches(Height(100), &BlockHash([2u8; 32])));
        assert!(checkpoints.matches(Height(100), &BlockHash([1u8; 32])));
    }

    #[test]
    fn a_height_with_no_pinned_checkpoint_always_matches() {
        let checkpoints = Checkpoints::new(vec![(Height(100), BlockHash([1u8; 32]))]);
        assert!(checkpoints.matches(Height(50), &BlockHash([9u8; 32])));
    }

    #[test]
    fn next_after_finds_the_nearest_checkpoint_above_the_tip() {
        let checkpoints = Checkpoints::new(vec![(Height(100), BlockHash([1u8; 32])), (Height(200), BlockHash([2u8; 32]))]);
        assert_eq!(checkpoints.next_after(Height(150)).unwrap().0, Height(200));
        assert!(checkpoints.next_after(Height(200)).is_none());
    }
}
