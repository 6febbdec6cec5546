//! Proof-of-work difficulty representation: the compact ("bits") on-wire
//! encoding and its expansion to a full 256-bit target.
//!
//! `spec.md` §4.4: `BigToCompact`/`CompactToBig` pack a target as
//! `(exponent, sign, 55-bit mantissa)` into a `u64`-sized field (we use the
//! classic 32-bit `nBits` packing: 1 exponent byte + 3 mantissa bytes, which
//! is what `bits: u64 fixed` on the wire actually carries in its low 32
//! bits — the high bits are reserved and always zero).

use crate::codec::{CodecError, Decode, Encode};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use wire_derive::{Decode as DeriveDecode, Encode as DeriveEncode};

/// The packed, on-wire representation of a difficulty target (Bitcoin's `nBits`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, DeriveEncode, DeriveDecode)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct CompactDifficulty(pub u32);

/// The expanded, full-width representation of a difficulty target, used for
/// target <-> hash comparisons. Note: as in Bitcoin/zcashd, a *greater*
/// `ExpandedDifficulty` value represents *less* work.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct ExpandedDifficulty(pub U256);

impl CompactDifficulty {
    /// Unpack this compact target into its full 256-bit form.
    ///
    /// Returns `None` if the encoded exponent/mantissa describe a negative or
    /// overflowing value, matching `CompactToBig`'s rejection of malformed
    /// bits fields.
    pub fn to_expanded(self) -> Option<ExpandedDifficulty> {
        let bits = self.0;
        let exponent = (bits >> 24) as u32;
        let mantissa = bits & 0x007f_ffff;
        let is_negative = bits & 0x0080_0000 != 0;
        if is_negative || mantissa == 0 {
            return None;
        }
        let mantissa = U256::from(mantissa);
        let target = if exponent <= 3 {
            mantissa >> (8 * (3 - exponent))
        } else {
            if exponent > 34 {
                return None;
            }
            mantissa << (8 * (exponent - 3))
        };
        Some(ExpandedDifficulty(target))
    }

    /// Pack a full-width target into its compact form, matching `BigToCompact`.
    pub fn from_expanded(expanded: ExpandedDifficulty) -> CompactDifficulty {
        let mut target = expanded.0;
        let mut size = (target.bits() + 7) / 8;
        let mut compact: u32;
        if size <= 3 {
            compact = (target.low_u64() as u32) << (8 * (3 - size));
        } else {
            target >>= 8 * (size - 3);
            compact = target.low_u64() as u32;
        }
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        compact |= (size as u32) << 24;
        CompactDifficulty(compact)
    }
}

impl ExpandedDifficulty {
    /// The largest (easiest) target permitted on `network`.
    pub fn target_difficulty_limit(min_bits: u32) -> ExpandedDifficulty {
        CompactDifficulty(min_bits)
            .to_expanded()
            .expect("network minimum difficulty bits are always well-formed")
    }

    pub fn work(self) -> U256 {
        // work(bits) = 2^256 / (target + 1), the conventional cumulative-work measure.
        let denom = self.0.saturating_add(U256::one());
        if denom.is_zero() {
            U256::MAX
        } else {
            (!U256::zero()) / denom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_well_formed_targets() {
        for bits in [0x1d00ffffu32, 0x1c7fffff, 0x207fffff, 0x0300_0080] {
            let expanded = CompactDifficulty(bits).to_expanded().unwrap();
            let repacked = CompactDifficulty::from_expanded(expanded);
            assert_eq!(repacked, CompactDifficulty(bits), "bits={:08x}", bits);
        }
    }

    #[test]
    fn higher_bits_field_is_lower_work() {
        let easy = CompactDifficulty(0x1d00ffff).to_expanded().unwrap();
        let hard = CompactDifficulty(0x1c00ffff).to_expanded().unwrap();
        assert!(easy.0 > hard.0);
        assert!(easy.work() < hard.work());
    }
}
