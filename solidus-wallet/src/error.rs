use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),
    #[error("corrupt stored record: {0}")]
    Corrupt(&'static str),
    #[error("no account with alias {0:?}")]
    UnknownAlias(String),
}
