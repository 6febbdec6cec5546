//! Canonical (de)serialization for consensus-critical structures.
//!
//! This module defines `Encode`/`Decode`, the wire- and disk-format analogs of
//! serde's `Serialize`/`Deserialize`, plus `digest`, which provides the
//! double-hash writer used to compute block and transaction ids without a
//! second serialization pass.

mod decode;
mod error;

pub mod digest;

use std::convert::TryFrom;

pub use decode::{Decode, DecodeInto};
pub use error::CodecError;

use crate::compactint::CompactInt;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use std::net::IpAddr;

pub trait Encode {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    fn encode_to_vec(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::new();
        self.encode(&mut data)?;
        Ok(data)
    }
}

impl Encode for bool {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&[*self as u8])
    }
}

impl Encode for u8 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&[*self])
    }
}

impl Encode for u16 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl Encode for u32 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl Encode for u64 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl Encode for i32 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i32::<LittleEndian>(*self)
    }
}

impl Encode for i64 {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i64::<LittleEndian>(*self)
    }
}

impl Encode for DateTime<Utc> {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        let secs = u64::try_from(self.timestamp()).unwrap_or(0);
        target.write_u64::<LittleEndian>(secs)
    }
}

impl Encode for IpAddr {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            IpAddr::V4(addr) => addr.to_ipv6_mapped().octets().encode(&mut target),
            IpAddr::V6(addr) => addr.octets().encode(&mut target),
        }
    }
}

impl Encode for std::net::SocketAddr {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.ip().encode(&mut target)?;
        target.write_u16::<BigEndian>(self.port())
    }
}

impl Encode for &[u8] {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

macro_rules! impl_encode_byte_array {
    ($size:expr) => {
        impl Encode for [u8; $size] {
            fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
            where
                W: std::io::Write,
            {
                target.write_all(&self[..])
            }
        }
    };
}

impl_encode_byte_array!(4);
impl_encode_byte_array!(16);
impl_encode_byte_array!(32);

impl<T> Encode for Vec<T>
where
    T: Encode,
{
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).encode(&mut target)?;
        for item in self.iter() {
            item.encode(&mut target)?;
        }
        Ok(())
    }
}

impl<T, U> Encode for (T, U)
where
    T: Encode,
    U: Encode,
{
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.0.encode(&mut target)?;
        self.1.encode(&mut target)
    }
}

impl Encode for String {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).encode(&mut target)?;
        self.as_bytes().encode(&mut target)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            Some(contents) => contents.encode(&mut target),
            None => Ok(()),
        }
    }
}
