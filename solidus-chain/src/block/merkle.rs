//! The transaction Merkle tree (I-B4) and the parallel transaction-status
//! Merkle tree (§6, `transaction_status_merkle_root`).

use crate::codec::digest;
use crate::define_hash;
use crate::transaction;

define_hash!(Root, "The root of a block's transaction Merkle tree.");

/// Hashes a list of leaf hashes into a Bitcoin-style Merkle root: at each
/// level, pairs of nodes are concatenated and double-hashed; an odd node out
/// is duplicated rather than promoted unchanged.
fn merkle_root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                digest::double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}

impl std::iter::FromIterator<transaction::Hash> for Root {
    fn from_iter<I: IntoIterator<Item = transaction::Hash>>(iter: I) -> Self {
        let leaves: Vec<[u8; 32]> = iter.into_iter().map(|h| h.0).collect();
        Root(merkle_root(leaves))
    }
}

/// Computes the transaction-status Merkle root over a bitmap of per-tx
/// validity (`spec.md` §6 `BTS:` status bitmap), one bit per transaction.
pub fn status_root(statuses: &[bool]) -> Root {
    let leaves: Vec<[u8; 32]> = statuses
        .iter()
        .map(|ok| {
            let mut leaf = [0u8; 32];
            leaf[0] = *ok as u8;
            digest::double_sha256(&leaf)
        })
        .collect();
    Root(merkle_root(leaves))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_root_equals_the_leaf_hash() {
        let leaf = transaction::Hash([7u8; 32]);
        let root: Root = std::iter::once(leaf).collect();
        assert_eq!(root.0, leaf.0);
    }

    #[test]
    fn three_leaf_root_duplicates_the_last_node() {
        let a = transaction::Hash([1u8; 32]);
        let b = transaction::Hash([2u8; 32]);
        let three: Root = vec![a, b, b].into_iter().collect();
        let four: Root = vec![a, b, b, b].into_iter().collect();
        // [a, b, b] pads to [a, b, b, b] before hashing, per the duplicate-last-node rule.
        assert_eq!(three.0, four.0);
    }

    #[test]
    fn empty_root_is_zero() {
        let root: Root = std::iter::empty().collect();
        assert_eq!(root.0, [0u8; 32]);
    }
}
