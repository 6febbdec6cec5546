//! A macro that stamps out a fixed 32-byte, content-addressed identifier
//! type, used for block hashes, transaction ids, asset ids and entry ids.
//!
//! Every instance compares by byte equality, prints as big-endian hex (the
//! u256 display convention this lineage inherits from Bitcoin/zcashd), and
//! round-trips through `Encode`/`Decode` as a plain 32-byte array.

#[macro_export]
macro_rules! define_hash {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn from_bytes_exact(bytes: [u8; 32]) -> $name {
                $name(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                f.write_str(&hex::encode(&reversed))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                f.debug_tuple(stringify!($name))
                    .field(&hex::encode(&reversed))
                    .finish()
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::codec::CodecError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0; 32];
                if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
                    return Err($crate::codec::CodecError::Parse("hex decoding error"));
                }
                bytes.reverse();
                Ok($name(bytes))
            }
        }

        impl $crate::codec::Encode for $name {
            fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
                <[u8; 32] as $crate::codec::Encode>::encode(&self.0, &mut target)
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode<R: std::io::Read>(
                mut reader: R,
            ) -> Result<Self, $crate::codec::CodecError> {
                Ok($name(<[u8; 32] as $crate::codec::Decode>::decode(
                    &mut reader,
                )?))
            }
        }
    };
}
