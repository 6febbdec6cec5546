//! The VM's error taxonomy (`spec.md` §4.1, §7 `VMRange`/`VMDivZero`/
//! `VMBadValue`/`VMVerifyFailed`/`VMFalseResult`). Every variant here maps
//! onto one of those stable root kinds; `solidus-consensus` wraps whichever
//! one escapes a run with the failing tx id and input index before handing
//! it to a caller.

use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum VmError {
    /// Arithmetic over/underflowed the unsigned 256-bit range.
    #[error("arithmetic result out of range")]
    Range,

    /// A division or modulo by zero.
    #[error("division by zero")]
    DivZero,

    /// A value pushed to the stack was longer than 32 bytes where a number
    /// was required, or otherwise malformed for the opcode that read it.
    #[error("bad value")]
    BadValue,

    /// The VM ran to completion but the top of stack was false or missing.
    #[error("false result")]
    FalseResult,

    /// A `VERIFY`-family opcode's condition failed.
    #[error("verify failed")]
    VerifyFailed,

    /// The gas budget was exhausted before the program finished.
    #[error("gas exceeded")]
    GasExceeded,

    /// An opcode was asked to pop more stack items than are present.
    #[error("stack underflow")]
    StackUnderflow,

    /// The program counter landed outside the program, or a jump target
    /// was out of bounds.
    #[error("program counter out of range")]
    PcOutOfRange,

    /// An unrecognised opcode byte.
    #[error("unrecognized opcode 0x{0:02x}")]
    InvalidOpcode(u8),

    /// A signature-check opcode's signature or public key was malformed.
    #[error("bad signature")]
    BadSignature,

    /// The unsupported VM version a control program declared.
    #[error("unsupported vm version {0}")]
    UnsupportedVmVersion(u64),
}
