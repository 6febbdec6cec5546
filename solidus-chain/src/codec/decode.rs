use super::CompactInt;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use chrono::{TimeZone, Utc};
use std::io;
use std::net::{IpAddr::V4, IpAddr::V6, Ipv6Addr, SocketAddr};

use super::CodecError;

type Result<R> = std::result::Result<R, CodecError>;

/// Max items to blindly preallocate when decoding a length-prefixed vector;
/// beyond this, `Vec::push` grows the buffer incrementally instead, so a
/// malicious declared length can't trigger an unbounded allocation.
const BLIND_ALLOC_LIMIT: usize = 1024;

pub trait Decode {
    fn decode<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Helper for decoding more succinctly via type inference.
pub trait DecodeInto {
    fn decode_into<T>(self) -> Result<T>
    where
        T: Decode;
}

impl<R: io::Read> DecodeInto for R {
    fn decode_into<T>(self) -> Result<T>
    where
        T: Decode,
    {
        T::decode(self)
    }
}

impl Decode for bool {
    fn decode<R: io::Read>(mut reader: R) -> Result<bool> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::Parse("invalid bool")),
        }
    }
}

impl Decode for u8 {
    fn decode<R: io::Read>(mut reader: R) -> Result<u8> {
        Ok(reader.read_u8()?)
    }
}

impl Decode for u16 {
    fn decode<R: io::Read>(mut reader: R) -> Result<u16> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl Decode for u32 {
    fn decode<R: io::Read>(mut reader: R) -> Result<u32> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl Decode for u64 {
    fn decode<R: io::Read>(mut reader: R) -> Result<u64> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl Decode for i32 {
    fn decode<R: io::Read>(mut reader: R) -> Result<i32> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl Decode for i64 {
    fn decode<R: io::Read>(mut reader: R) -> Result<i64> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl Decode for chrono::DateTime<Utc> {
    fn decode<R: io::Read>(mut reader: R) -> Result<chrono::DateTime<Utc>> {
        Ok(Utc.timestamp(reader.read_u64::<LittleEndian>()? as i64, 0))
    }
}

impl<T> Decode for Vec<T>
where
    T: Decode,
{
    fn decode<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactInt::decode(&mut reader)?.value() as usize;
        let mut result: Vec<T> = Vec::with_capacity(std::cmp::min(len, BLIND_ALLOC_LIMIT));
        for _ in 0..len {
            result.push(T::decode(&mut reader)?);
        }
        Ok(result)
    }
}

impl Decode for String {
    fn decode<R: io::Read>(mut reader: R) -> Result<String> {
        let len = CompactInt::decode(&mut reader)?.value() as usize;
        let mut buf = vec![0; std::cmp::min(len, BLIND_ALLOC_LIMIT)];
        reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| CodecError::Parse("invalid utf-8"))
    }
}

impl Decode for SocketAddr {
    fn decode<R: io::Read>(mut reader: R) -> Result<SocketAddr> {
        let octets = <[u8; 16]>::decode(&mut reader)?;
        let v6_addr = Ipv6Addr::from(octets);
        let addr = match v6_addr.to_ipv4() {
            Some(v4_addr) => V4(v4_addr),
            None => V6(v6_addr),
        };
        Ok(SocketAddr::from((addr, reader.read_u16::<BigEndian>()?)))
    }
}

impl<T, U> Decode for (T, U)
where
    T: Decode,
    U: Decode,
{
    fn decode<R: io::Read>(mut reader: R) -> Result<(T, U)> {
        Ok((T::decode(&mut reader)?, U::decode(&mut reader)?))
    }
}

macro_rules! impl_decode_byte_array {
    ($size:expr) => {
        impl Decode for [u8; $size] {
            fn decode<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                reader.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_decode_byte_array!(4);
impl_decode_byte_array!(16);
impl_decode_byte_array!(32);
