//! The error types `solidus-chain` itself can produce. Downstream crates
//! (`solidus-vm`, `solidus-consensus`, `solidus-state`) define their own
//! error enums rather than growing this one; this crate only needs to speak
//! for decoding and for the handful of checked arithmetic / time operations
//! its own types expose.

use crate::amount::AmountError;
use crate::block::BlockTimeError;
use crate::codec::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    BlockTime(#[from] BlockTimeError),
}
