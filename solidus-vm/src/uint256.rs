//! Unsigned 256-bit arithmetic for stack values (`spec.md` §4.1, §9).
//!
//! Values on the stack are byte strings; when an opcode needs to interpret
//! one as a number, it is read as a little-endian unsigned 256-bit integer.
//! Every checked operation returns `VmError::Range` on overflow rather than
//! wrapping, and a value longer than 32 bytes is `VmError::BadValue` before
//! it is ever turned into a number. Nothing here allocates beyond the fixed
//! `U256`/`Vec<u8>` already on the stack.

use crate::error::VmError;
use primitive_types::U256;

/// Reads a stack item as an unsigned 256-bit integer.
pub fn to_u256(bytes: &[u8]) -> Result<U256, VmError> {
    if bytes.len() > 32 {
        return Err(VmError::BadValue);
    }
    let mut buf = [0u8; 32];
    buf[..bytes.len()].copy_from_slice(bytes);
    // stack bytes are little-endian; U256::from_little_endian wants that directly.
    Ok(U256::from_little_endian(&buf))
}

/// Encodes an unsigned 256-bit integer back to its minimal little-endian
/// stack representation (trailing zero bytes dropped, matching the VM's
/// canonical "shortest encoding" convention; zero encodes as the empty string).
pub fn from_u256(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_little_endian(&mut buf);
    let mut len = 32;
    while len > 0 && buf[len - 1] == 0 {
        len -= 1;
    }
    buf[..len].to_vec()
}

pub fn checked_add(a: U256, b: U256) -> Result<U256, VmError> {
    a.checked_add(b).ok_or(VmError::Range)
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256, VmError> {
    a.checked_sub(b).ok_or(VmError::Range)
}

pub fn checked_mul(a: U256, b: U256) -> Result<U256, VmError> {
    a.checked_mul(b).ok_or(VmError::Range)
}

pub fn checked_div(a: U256, b: U256) -> Result<U256, VmError> {
    if b.is_zero() {
        return Err(VmError::DivZero);
    }
    Ok(a / b)
}

pub fn checked_mod(a: U256, b: U256) -> Result<U256, VmError> {
    if b.is_zero() {
        return Err(VmError::DivZero);
    }
    Ok(a % b)
}

/// Left-shift by 256 or more bits is always zero (`spec.md` §9).
pub fn checked_shl(a: U256, shift: u32) -> U256 {
    if shift >= 256 {
        U256::zero()
    } else {
        a << shift
    }
}

/// Right-shift by 256 or more bits is always zero (`spec.md` §9).
pub fn checked_shr(a: U256, shift: u32) -> U256 {
    if shift >= 256 {
        U256::zero()
    } else {
        a >> shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_minimal_encoding() {
        let n = U256::from(12345u64);
        let bytes = from_u256(n);
        assert_eq!(to_u256(&bytes).unwrap(), n);
    }

    #[test]
    fn zero_encodes_empty() {
        assert!(from_u256(U256::zero()).is_empty());
    }

    #[test]
    fn more_than_32_bytes_is_bad_value() {
        let bytes = vec![1u8; 33];
        assert_eq!(to_u256(&bytes), Err(VmError::BadValue));
    }

    #[test]
    fn overflowing_add_is_range_error() {
        assert_eq!(checked_add(U256::MAX, U256::one()), Err(VmError::Range));
    }

    #[test]
    fn division_by_zero_is_div_zero_error() {
        assert_eq!(checked_div(U256::one(), U256::zero()), Err(VmError::DivZero));
    }

    #[test]
    fn shift_by_256_or_more_is_zero() {
        assert!(checked_shl(U256::one(), 256).is_zero());
        assert!(checked_shr(U256::MAX, 300).is_zero());
    }
}
