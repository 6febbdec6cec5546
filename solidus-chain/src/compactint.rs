//! The Bitcoin-style variable-length integer ("varint") encoding used to
//! prefix every vector and string in the wire and disk formats.

use crate::codec::{CodecError, Decode, Encode};
use byteorder::{LittleEndian, WriteBytesExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactInt(u64);

impl Default for CompactInt {
    fn default() -> Self {
        CompactInt(0)
    }
}

impl CompactInt {
    pub fn new() -> CompactInt {
        CompactInt(0)
    }

    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn size(value: usize) -> usize {
        if value < 253 {
            1
        } else if value < std::u16::MAX as usize {
            2
        } else if value < std::u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl Encode for CompactInt {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.value() < 253 {
            target.write_all(&[self.value() as u8])
        } else if self.value() <= std::u16::MAX as u64 {
            target.write_all(&[253])?;
            target.write_u16::<LittleEndian>(self.value() as u16)
        } else if self.value() <= std::u32::MAX as u64 {
            target.write_all(&[254])?;
            target.write_u32::<LittleEndian>(self.value() as u32)
        } else {
            target.write_all(&[255])?;
            target.write_u64::<LittleEndian>(self.value())
        }
    }
}

impl Decode for CompactInt {
    fn decode<R: std::io::Read>(mut target: R) -> Result<CompactInt, CodecError> {
        let first = u8::decode(&mut target)?;
        if first < 253 {
            Ok(CompactInt::from(first as usize))
        } else if first == 253 {
            Ok(CompactInt::from(u16::decode(&mut target)? as usize))
        } else if first == 254 {
            Ok(CompactInt::from(u32::decode(&mut target)? as usize))
        } else {
            Ok(CompactInt(u64::decode(&mut target)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        for value in [0usize, 1, 252, 253, 254, 65535, 65536, 1 << 32] {
            let v = CompactInt::from(value);
            let bytes = v.encode_to_vec().unwrap();
            assert_eq!(bytes.len(), CompactInt::size(value));
            let decoded = CompactInt::decode(&bytes[..]).unwrap();
            assert_eq!(decoded.value(), value as u64);
        }
    }
}
