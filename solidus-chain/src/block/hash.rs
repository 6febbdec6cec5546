use crate::codec::{digest, Encode};
use crate::define_hash;

use super::Header;

define_hash!(Hash, "A hash that identifies a block by its header's double-SHA256.");

impl<'a> From<&'a Header> for Hash {
    fn from(header: &'a Header) -> Hash {
        let mut writer = digest::Writer::default();
        header
            .encode(&mut writer)
            .expect("digest writer is infallible");
        Hash(writer.finish())
    }
}
