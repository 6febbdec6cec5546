use std::io;

use thiserror::Error;

/// An error produced while encoding or decoding a consensus-critical type.
#[derive(Error, Debug)]
pub enum CodecError {
    /// An io error that prevented decoding.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The data to be decoded was malformed.
    #[error("parse error: {0}")]
    Parse(&'static str),
}
