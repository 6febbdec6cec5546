//! A Tokio codec mapping byte streams to [`Message`] streams: a 4-byte
//! little-endian length prefix followed by the message's own encoding,
//! the length-prefixed framing `spec.md` §6 calls for in place of the
//! Bitcoin-derived magic/command/checksum header this protocol descends
//! from.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use solidus_chain::codec::{Decode, Encode};

use crate::message::Message;

/// Messages larger than this are refused outright rather than buffered;
/// guards against a peer claiming an enormous length prefix and stalling
/// the connection on an allocation.
const MAX_MESSAGE_LEN: usize = 8 * 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("message of {0} bytes exceeds the maximum of {1}")]
    TooLong(usize, usize),
    #[error("malformed message: {0}")]
    Malformed(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<solidus_chain::codec::CodecError> for CodecError {
    fn from(_: solidus_chain::codec::CodecError) -> CodecError {
        CodecError::Malformed("failed to decode message body")
    }
}

/// Length-prefixed framing for [`Message`].
#[derive(Default)]
pub struct Codec {
    /// The length of the body currently being assembled, once its prefix
    /// has been read.
    body_len: Option<usize>,
}

impl Codec {
    pub fn new() -> Codec {
        Codec::default()
    }
}

impl Encoder<Message> for Codec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body = item.encode_to_vec()?;
        if body.len() > MAX_MESSAGE_LEN {
            return Err(CodecError::TooLong(body.len(), MAX_MESSAGE_LEN));
        }
        dst.reserve(LENGTH_PREFIX_LEN + body.len());
        dst.put_u32_le(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let body_len = match self.body_len {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_LEN {
                    return Ok(None);
                }
                let len = (&src[..LENGTH_PREFIX_LEN]).get_u32_le() as usize;
                if len > MAX_MESSAGE_LEN {
                    return Err(CodecError::TooLong(len, MAX_MESSAGE_LEN));
                }
                src.advance(LENGTH_PREFIX_LEN);
                self.body_len = Some(len);
                len
            }
        };

        if src.len() < body_len {
            src.reserve(body_len - src.len());
            return Ok(None);
        }

        let body = src.split_to(body_len);
        self.body_len = None;
        let message = Message::decode(&body[..])?;
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::block::{Hash as BlockHash, Height};

    #[test]
    fn a_message_split_across_two_reads_still_decodes() {
        let mut codec = Codec::new();
        let msg = Message::StatusResponse {
            best_height: Height(3),
            best_hash: BlockHash([1u8; 32]),
            genesis_hash: BlockHash([0u8; 32]),
            services: 0,
        };
        let mut encoded = BytesMut::new();
        codec.encode(msg, &mut encoded).unwrap();

        let split_at = encoded.len() / 2;
        let mut buf = BytesMut::from(&encoded[..split_at]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[split_at..]);
        let decoded = codec.decode(&mut buf).unwrap();
        assert!(matches!(decoded, Some(Message::StatusResponse { .. })));
    }

    #[test]
    fn an_oversized_length_prefix_is_rejected() {
        let mut codec = Codec::new();
        let mut buf = BytesMut::new();
        buf.put_u32_le((MAX_MESSAGE_LEN + 1) as u32);
        assert!(codec.decode(&mut buf).is_err());
    }
}
