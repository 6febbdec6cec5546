//! The peer-to-peer wire protocol (`spec.md` §6): a closed set of typed
//! messages, each a thin wrapper around the same canonical encoding
//! `solidus-chain` already defines for blocks, headers and transactions.
//!
//! Unlike the Bitcoin-derived message set this protocol descends from,
//! there is no magic/checksum header and no free-form command string:
//! [`Codec`](crate::codec::Codec) frames each message with a length
//! prefix and a one-byte type tag, and the tag is a closed enum
//! discriminant rather than a 12-byte ascii string matched at decode time.

use std::sync::Arc;

use solidus_chain::block::{Block, Hash as BlockHash, Header, Height};
use solidus_chain::codec::{CodecError, Decode, Encode};
use solidus_chain::transaction::Transaction;

/// Selects a block by either of its two natural keys.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum BlockSelector {
    Hash(BlockHash),
    Height(Height),
}

impl Encode for BlockSelector {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            BlockSelector::Hash(hash) => {
                0u8.encode(&mut target)?;
                hash.encode(&mut target)
            }
            BlockSelector::Height(height) => {
                1u8.encode(&mut target)?;
                height.encode(&mut target)
            }
        }
    }
}

impl Decode for BlockSelector {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        match u8::decode(&mut reader)? {
            0 => Ok(BlockSelector::Hash(BlockHash::decode(&mut reader)?)),
            1 => Ok(BlockSelector::Height(Height::decode(&mut reader)?)),
            _ => Err(CodecError::Parse("unknown block selector tag")),
        }
    }
}

/// A block locator: the geometric back-off list `spec.md` §4.8 specifies,
/// heights `[tip, tip-1, ..., tip-9]` then doubling gaps down to genesis.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Locator(pub Vec<BlockHash>);

impl Encode for Locator {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.encode(target)
    }
}

impl Decode for Locator {
    fn decode<R: std::io::Read>(reader: R) -> Result<Self, CodecError> {
        Ok(Locator(Vec::decode(reader)?))
    }
}

/// `spec.md` §6's wire message set.
#[derive(Clone, Debug)]
pub enum Message {
    /// Requests the peer's status; answered with [`Message::StatusResponse`].
    StatusRequest,
    /// A peer's handshake status: its tip, its genesis (used to detect a
    /// peer on an incompatible network) and a bitflag of advertised services.
    StatusResponse {
        best_height: Height,
        best_hash: BlockHash,
        genesis_hash: BlockHash,
        services: u64,
    },
    GetHeaders { locator: Locator, stop_hash: BlockHash },
    Headers(Vec<Header>),
    GetBlocks { locator: Locator, stop_hash: BlockHash },
    Blocks(Vec<Block>),
    GetBlock(BlockSelector),
    Block(Block),
    Transaction(Arc<Transaction>),
    /// A freshly mined block, announced rather than requested.
    MineBlock(Block),
}

/// `spec.md` §6: header/block responses cap at these per-message limits
/// regardless of how many a request's locator would otherwise match.
pub const MAX_BLOCK_HEADERS_PER_MSG: usize = 2_000;
pub const MAX_BLOCKS_PER_MSG: usize = 500;

const TAG_STATUS_REQUEST: u8 = 0;
const TAG_STATUS_RESPONSE: u8 = 1;
const TAG_GET_HEADERS: u8 = 2;
const TAG_HEADERS: u8 = 3;
const TAG_GET_BLOCKS: u8 = 4;
const TAG_BLOCKS: u8 = 5;
const TAG_GET_BLOCK: u8 = 6;
const TAG_BLOCK: u8 = 7;
const TAG_TRANSACTION: u8 = 8;
const TAG_MINE_BLOCK: u8 = 9;

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Message::StatusRequest => TAG_STATUS_REQUEST,
            Message::StatusResponse { .. } => TAG_STATUS_RESPONSE,
            Message::GetHeaders { .. } => TAG_GET_HEADERS,
            Message::Headers(_) => TAG_HEADERS,
            Message::GetBlocks { .. } => TAG_GET_BLOCKS,
            Message::Blocks(_) => TAG_BLOCKS,
            Message::GetBlock(_) => TAG_GET_BLOCK,
            Message::Block(_) => TAG_BLOCK,
            Message::Transaction(_) => TAG_TRANSACTION,
            Message::MineBlock(_) => TAG_MINE_BLOCK,
        }
    }
}

impl Encode for Message {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.tag().encode(&mut target)?;
        match self {
            Message::StatusRequest => Ok(()),
            Message::StatusResponse { best_height, best_hash, genesis_hash, services } => {
                best_height.encode(&mut target)?;
                best_hash.encode(&mut target)?;
                genesis_hash.encode(&mut target)?;
                services.encode(&mut target)
            }
            Message::GetHeaders { locator, stop_hash } => {
                locator.encode(&mut target)?;
                stop_hash.encode(&mut target)
            }
            Message::Headers(headers) => headers.encode(&mut target),
            Message::GetBlocks { locator, stop_hash } => {
                locator.encode(&mut target)?;
                stop_hash.encode(&mut target)
            }
            Message::Blocks(blocks) => blocks.encode(&mut target),
            Message::GetBlock(selector) => selector.encode(&mut target),
            Message::Block(block) => block.encode(&mut target),
            Message::Transaction(tx) => tx.encode(&mut target),
            Message::MineBlock(block) => block.encode(&mut target),
        }
    }
}

impl Decode for Message {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        let tag = u8::decode(&mut reader)?;
        match tag {
            TAG_STATUS_REQUEST => Ok(Message::StatusRequest),
            TAG_STATUS_RESPONSE => Ok(Message::StatusResponse {
                best_height: Height::decode(&mut reader)?,
                best_hash: BlockHash::decode(&mut reader)?,
                genesis_hash: BlockHash::decode(&mut reader)?,
                services: u64::decode(&mut reader)?,
            }),
            TAG_GET_HEADERS => Ok(Message::GetHeaders {
                locator: Locator::decode(&mut reader)?,
                stop_hash: BlockHash::decode(&mut reader)?,
            }),
            TAG_HEADERS => Ok(Message::Headers(Vec::decode(&mut reader)?)),
            TAG_GET_BLOCKS => Ok(Message::GetBlocks {
                locator: Locator::decode(&mut reader)?,
                stop_hash: BlockHash::decode(&mut reader)?,
            }),
            TAG_BLOCKS => Ok(Message::Blocks(Vec::decode(&mut reader)?)),
            TAG_GET_BLOCK => Ok(Message::GetBlock(BlockSelector::decode(&mut reader)?)),
            TAG_BLOCK => Ok(Message::Block(Block::decode(&mut reader)?)),
            TAG_TRANSACTION => Ok(Message::Transaction(Arc::new(Transaction::decode(&mut reader)?))),
            TAG_MINE_BLOCK => Ok(Message::MineBlock(Block::decode(&mut reader)?)),
            _ => Err(CodecError::Parse("unknown message tag")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::parameters::{genesis, Network};

    #[test]
    fn status_response_round_trips() {
        let msg = Message::StatusResponse {
            best_height: Height(12),
            best_hash: BlockHash([7u8; 32]),
            genesis_hash: BlockHash([0u8; 32]),
            services: 1,
        };
        let bytes = msg.encode_to_vec().unwrap();
        let decoded = Message::decode(&bytes[..]).unwrap();
        match decoded {
            Message::StatusResponse { best_height, best_hash, .. } => {
                assert_eq!(best_height, Height(12));
                assert_eq!(best_hash, BlockHash([7u8; 32]));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn block_message_round_trips_a_real_block() {
        let block = genesis::block(Network::Solonet);
        let msg = Message::Block(block.clone());
        let bytes = msg.encode_to_vec().unwrap();
        let decoded = Message::decode(&bytes[..]).unwrap();
        match decoded {
            Message::Block(decoded_block) => assert_eq!(decoded_block.hash(), block.hash()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn get_block_selector_round_trips_both_variants() {
        for selector in [BlockSelector::Hash(BlockHash([3u8; 32])), BlockSelector::Height(Height(9))] {
            let bytes = selector.encode_to_vec().unwrap();
            let decoded = BlockSelector::decode(&bytes[..]).unwrap();
            assert_eq!(decoded, selector);
        }
    }
}
