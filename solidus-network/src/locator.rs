//! Block locators: the geometric back-off list a peer sends to describe
//! its view of the chain without enumerating every block (`spec.md` §4.8).

use solidus_chain::block::{Hash as BlockHash, Height};

use crate::message::Locator;

/// Builds a locator for a chain of the given tip height, reading hashes
/// through `hash_at_height`. Heights `tip, tip-1, ..., tip-9` are included
/// densely, then the gap between successive entries doubles
/// (`tip-11, tip-15, tip-23, ...`) until height 0 is reached.
pub fn build_locator<F>(tip: Height, mut hash_at_height: F) -> Locator
where
    F: FnMut(Height) -> Option<BlockHash>,
{
    let mut hashes = Vec::new();
    let mut height = tip.0 as i64;
    let mut step: i64 = 1;
    let mut dense_entries = 0;

    loop {
        if let Some(hash) = hash_at_height(Height(height as u32)) {
            hashes.push(hash);
        }
        if height == 0 {
            break;
        }
        dense_entries += 1;
        if dense_entries >= 10 {
            step *= 2;
        }
        height = (height - step).max(0);
    }

    Locator(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn chain_of(len: u32) -> HashMap<Height, BlockHash> {
        (0..=len)
            .map(|h| {
                let mut hash = [0u8; 32];
                hash[0..4].copy_from_slice(&h.to_le_bytes());
                (Height(h), BlockHash(hash))
            })
            .collect()
    }

    #[test]
    fn a_short_chain_is_covered_densely() {
        let chain = chain_of(5);
        let locator = build_locator(Height(5), |h| chain.get(&h).copied());
        assert_eq!(locator.0.len(), 6);
        assert_eq!(locator.0[0], chain[&Height(5)]);
        assert_eq!(*locator.0.last().unwrap(), chain[&Height(0)]);
    }

    #[test]
    fn a_long_chain_s_locator_always_reaches_genesis() {
        let chain = chain_of(1000);
        let locator = build_locator(Height(1000), |h| chain.get(&h).copied());
        assert_eq!(*locator.0.last().unwrap(), chain[&Height(0)]);
        assert!(locator.0.len() < 30);
    }
}
