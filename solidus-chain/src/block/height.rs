use crate::codec::{CodecError, Decode, Encode};
use serde::{Deserialize, Serialize};

/// A block height; genesis is height 0.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct Height(pub u32);

impl Height {
    pub fn next(self) -> Height {
        Height(self.0 + 1)
    }

    pub fn previous(self) -> Option<Height> {
        self.0.checked_sub(1).map(Height)
    }
}

impl Encode for Height {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        crate::compactint::CompactInt::from(self.0 as usize).encode(target)
    }
}

impl Decode for Height {
    fn decode<R: std::io::Read>(reader: R) -> Result<Self, CodecError> {
        Ok(Height(crate::compactint::CompactInt::decode(reader)?.value() as u32))
    }
}
