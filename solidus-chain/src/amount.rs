//! Asset identifiers and amounts.
//!
//! `spec.md` §3: an `AssetId` names a fungible asset class; one distinguished
//! id is the native, fee-paying asset. `AssetAmount` pairs an id with an
//! unsigned quantity; arithmetic overflow is a hard error, never a wrap.

use crate::codec::{CodecError, Decode, Encode};
use crate::define_hash;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wire_derive::{Decode as DeriveDecode, Encode as DeriveEncode};

define_hash!(AssetId, "A 32-byte identifier for a fungible asset class.");

impl AssetId {
    /// The distinguished asset that pays transaction fees and block subsidies.
    pub const NATIVE: AssetId = AssetId([0u8; 32]);

    pub fn is_native(&self) -> bool {
        *self == AssetId::NATIVE
    }
}

/// An amount of some asset. Amounts are always unsigned; overflowing an
/// addition is `AmountError::Overflow`, never a silent wraparound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, DeriveEncode, DeriveDecode)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum AmountError {
    #[error("amount overflow")]
    Overflow,
    #[error("amount underflow")]
    Underflow,
}

impl AssetAmount {
    pub fn new(asset_id: AssetId, amount: u64) -> AssetAmount {
        AssetAmount { asset_id, amount }
    }

    pub fn checked_add(&self, other: u64) -> Result<u64, AmountError> {
        self.amount.checked_add(other).ok_or(AmountError::Overflow)
    }
}

/// Sums amounts of a single asset, returning `AmountError::Overflow` on
/// overflow rather than wrapping.
pub fn checked_sum<I: IntoIterator<Item = u64>>(amounts: I) -> Result<u64, AmountError> {
    let mut total: u64 = 0;
    for amount in amounts {
        total = total.checked_add(amount).ok_or(AmountError::Overflow)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        assert_eq!(
            checked_sum([u64::MAX, 1]),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn native_asset_is_distinguished() {
        assert!(AssetId::NATIVE.is_native());
        assert!(!AssetId([1u8; 32]).is_native());
    }
}
