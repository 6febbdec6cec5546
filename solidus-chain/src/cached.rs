use crate::codec::{CodecError, Decode, Encode};
use serde::{Deserialize, Serialize};

/// A `Cached<T>` is an option that is never (de)serialized on the wire.
///
/// It lets a struct carry a memoized derived value (a hash, a cached height)
/// without that value becoming part of the consensus-critical encoding, and
/// without risking a consensus break if two implementations compute the
/// cache differently.
#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Cached<T: Clone + Copy>(Option<T>);

impl<T: Clone + Copy> Default for Cached<T> {
    fn default() -> Self {
        Cached(None)
    }
}

impl<T: Clone + Copy> Cached<T> {
    pub fn new() -> Cached<T> {
        Cached(None)
    }
    pub fn from(val: T) -> Cached<T> {
        Cached(Some(val))
    }
    pub fn value(&self) -> Option<T> {
        self.0
    }
    pub fn mut_value(&mut self) -> &mut Option<T> {
        &mut self.0
    }
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }
}

/// Returns false only if both sides have a populated cache and their values differ.
///
/// This lets freshly-constructed values (empty cache) compare equal to their
/// decoded counterparts (populated cache) without forcing eager computation.
impl<T: PartialEq + Copy> PartialEq for Cached<T> {
    fn eq(&self, other: &Self) -> bool {
        match self.0 {
            None => true,
            Some(val) => match other.0 {
                Some(rhs) => val == rhs,
                None => true,
            },
        }
    }
}

impl<T: Clone + Copy> std::fmt::Debug for Cached<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: Clone + Copy> Encode for Cached<T> {
    fn encode<W>(&self, _: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        Ok(())
    }
}

impl<T: Clone + Copy> Decode for Cached<T> {
    fn decode<R: std::io::Read>(_: R) -> Result<Self, CodecError> {
        Ok(Cached(None))
    }
}
