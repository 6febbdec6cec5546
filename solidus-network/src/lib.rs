//! Peer-to-peer networking (`spec.md` §4.8, §6): the wire message set, its
//! length-prefixed framing, per-peer ban scoring, and the headers-first
//! synchroniser that drives a peer through catching the local node up to
//! the network.

pub mod checkpoints;
pub mod codec;
pub mod locator;
pub mod message;
pub mod peer;
pub mod sync;

pub use checkpoints::Checkpoints;
pub use codec::Codec;
pub use message::{BlockSelector, Locator, Message};
pub use peer::{BanScore, Misbehaviour, PeerStatus};
pub use sync::{BlockFetcher, SyncRequest, Synchroniser, SYNC_TIMEOUT};
