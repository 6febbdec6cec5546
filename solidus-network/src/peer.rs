//! Per-peer state (`spec.md` §4.8): the handshake fields tracked for every
//! connection, and the ban-score accounting that decides when a
//! misbehaving peer is disconnected and cooled down.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use solidus_chain::block::{Hash as BlockHash, Height};

/// A peer's advertised chain position and identity, refreshed on every
/// status exchange. Read by the synchroniser as an atomic snapshot; written
/// only by that peer's own handler task (`spec.md` §5).
#[derive(Clone, Copy, Debug)]
pub struct PeerStatus {
    pub best_height: Height,
    pub best_hash: BlockHash,
    pub genesis_hash: BlockHash,
    pub services: u64,
}

/// Points added to a peer's score for one act of misbehaviour.
/// `persistent` survives the cool-down decay the way a protocol violation
/// should; `transient` decays over time the way a single slow response
/// should not permanently count against an otherwise healthy peer.
#[derive(Clone, Copy, Debug)]
pub struct Misbehaviour {
    pub persistent: i32,
    pub transient: i32,
}

impl Misbehaviour {
    pub const DUPLICATE_BLOCK: Misbehaviour = Misbehaviour { persistent: 1, transient: 0 };
    pub const INVALID_BLOCK: Misbehaviour = Misbehaviour { persistent: 100, transient: 0 };
    pub const INVALID_MESSAGE: Misbehaviour = Misbehaviour { persistent: 20, transient: 0 };
    pub const WRONG_GENESIS: Misbehaviour = Misbehaviour { persistent: 100, transient: 0 };
    pub const REQUEST_TIMEOUT: Misbehaviour = Misbehaviour { persistent: 0, transient: 10 };
    pub const CHECKPOINT_MISMATCH: Misbehaviour = Misbehaviour { persistent: 100, transient: 0 };
}

/// A peer's misbehaviour score: a persistent component plus a transient
/// one that decays with good behaviour (`spec.md` §4.8).
#[derive(Clone, Copy, Debug, Default)]
pub struct BanScore {
    persistent: i32,
    transient: i32,
}

impl BanScore {
    pub const BAN_THRESHOLD: i32 = 100;
    const TRANSIENT_DECAY_PER_GOOD_RESPONSE: i32 = 1;

    pub fn add(&mut self, misbehaviour: Misbehaviour) {
        self.persistent += misbehaviour.persistent;
        self.transient += misbehaviour.transient;
    }

    /// Called whenever the peer answers a request correctly and on time.
    pub fn record_good_behaviour(&mut self) {
        self.transient = (self.transient - Self::TRANSIENT_DECAY_PER_GOOD_RESPONSE).max(0);
    }

    pub fn total(&self) -> i32 {
        self.persistent + self.transient
    }

    pub fn exceeds_threshold(&self) -> bool {
        self.total() >= Self::BAN_THRESHOLD
    }
}

/// A remote address cooling down after a ban, opaque outside this module
/// beyond the one question the synchroniser asks of it.
#[derive(Clone, Copy, Debug)]
pub struct CoolingDown {
    addr: SocketAddr,
    until: Instant,
}

impl CoolingDown {
    pub fn new(addr: SocketAddr, duration: Duration) -> CoolingDown {
        CoolingDown { addr, until: Instant::now() + duration }
    }

    pub fn matches(&self, addr: &SocketAddr) -> bool {
        &self.addr == addr
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_invalid_block_crosses_the_ban_threshold_on_its_own() {
        let mut score = BanScore::default();
        score.add(Misbehaviour::INVALID_BLOCK);
        assert!(score.exceeds_threshold());
    }

    #[test]
    fn good_behaviour_decays_the_transient_score_but_not_the_persistent_one() {
        let mut score = BanScore::default();
        score.add(Misbehaviour::REQUEST_TIMEOUT);
        score.add(Misbehaviour::DUPLICATE_BLOCK);
        for _ in 0..20 {
            score.record_good_behaviour();
        }
        assert_eq!(score.transient, 0);
        assert_eq!(score.persistent, 1);
    }
}
