//! The stable error taxonomy `spec.md` §7 requires: "classification is
//! stable across versions because external peers use it to score
//! behaviour." `ErrorKind` is that closed set of identifiers; `TransactionError`
//! and `BlockError` are the concrete, contextful errors the validator
//! actually returns, each mapping onto exactly one `ErrorKind`.

use solidus_chain::block::{Hash as BlockHash, Height};
use solidus_chain::transaction::Hash as TxHash;
use solidus_vm::VmError;
use thiserror::Error;

/// The stable root kind of a validation failure (`spec.md` §7). The RPC
/// boundary (outside this crate's scope) maps each kind to an HTTP status;
/// ban-scoring in the synchroniser keys off these variants too.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    BadRequest,
    InvalidRequestBody,
    InsufficientFunds,
    ImmatureFunds,
    ReservedUtxo,
    UtxoNotFound,
    BadAssetAmount,
    BadAction,
    MissingFields,
    BadActionConstruction,
    WrongNetwork,
    RequestTimedOut,
    Unauthenticated,
    MismatchedMerkleRoot,
    MismatchedBlock,
    MisorderedBlockHeight,
    VersionRegression,
    BadTimestamp,
    BadWork,
    BadCoinbase,
    OverBlockLimit,
    VmRange,
    VmDivZero,
    VmBadValue,
    VmVerifyFailed,
    VmFalseResult,
    StorageCorrupt,
}

impl ErrorKind {
    /// A small set of codes are transient: the synchroniser's retry logic
    /// re-tries on these instead of banning the peer (`spec.md` §7).
    pub fn is_temporary(self) -> bool {
        matches!(self, ErrorKind::RequestTimedOut | ErrorKind::StorageCorrupt)
    }
}

impl From<&VmError> for ErrorKind {
    fn from(err: &VmError) -> ErrorKind {
        match err {
            VmError::Range => ErrorKind::VmRange,
            VmError::DivZero => ErrorKind::VmDivZero,
            VmError::BadValue
            | VmError::InvalidOpcode(_)
            | VmError::PcOutOfRange
            | VmError::StackUnderflow
            | VmError::UnsupportedVmVersion(_)
            | VmError::BadSignature => ErrorKind::VmBadValue,
            VmError::VerifyFailed | VmError::GasExceeded => ErrorKind::VmVerifyFailed,
            VmError::FalseResult => ErrorKind::VmFalseResult,
        }
    }
}

/// A validation error arising while checking a single transaction. Wrapped
/// with the failing tx id (and, for VM failures, the input index) before it
/// escapes to a caller (`spec.md` §4.5 propagation policy).
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("transaction declares a coinbase input outside the first position")]
    CoinbaseNotFirst,
    #[error("transaction contains more than one coinbase input")]
    MultipleCoinbaseInputs,
    #[error("duplicate input spends output {0}")]
    DuplicateInput(solidus_chain::entry::EntryId),
    #[error("spend input's output_id {declared} does not match its committed source_id/position/asset_amount/control_program (recomputes to {computed})")]
    MismatchedOutputId {
        declared: solidus_chain::entry::EntryId,
        computed: solidus_chain::entry::EntryId,
    },
    #[error("block time {block_time} falls outside transaction time_range (height {height:?})")]
    TimeRangeViolated { block_time: u64, height: Height },
    #[error("asset {0} is unbalanced: inputs != outputs")]
    Unbalanced(solidus_chain::amount::AssetId),
    #[error("native-asset fee would be negative")]
    NegativeFee,
    #[error("transaction has no native-asset input and so cannot pay gas")]
    NoGasInput,
    #[error("gas used {used} exceeds the gas budget {limit}")]
    GasExceeded { used: u64, limit: u64 },
    #[error("input {input_index} of tx {tx_id}: {source}")]
    Vm {
        tx_id: TxHash,
        input_index: usize,
        #[source]
        source: VmError,
    },
    #[error(transparent)]
    Utxo(#[from] solidus_state::UtxoError),
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::NoInputs
            | TransactionError::NoOutputs
            | TransactionError::CoinbaseNotFirst
            | TransactionError::MultipleCoinbaseInputs
            | TransactionError::DuplicateInput(_)
            | TransactionError::TimeRangeViolated { .. } => ErrorKind::BadAction,
            TransactionError::MismatchedOutputId { .. } => ErrorKind::UtxoNotFound,
            TransactionError::Unbalanced(_) | TransactionError::NegativeFee => ErrorKind::BadAssetAmount,
            TransactionError::NoGasInput => ErrorKind::InsufficientFunds,
            TransactionError::GasExceeded { .. } => ErrorKind::OverBlockLimit,
            TransactionError::Vm { source, .. } => source.into(),
            TransactionError::Utxo(solidus_state::UtxoError::SpendMissing(_)) => ErrorKind::UtxoNotFound,
            TransactionError::Utxo(solidus_state::UtxoError::DoubleSpend(_)) => ErrorKind::ReservedUtxo,
            TransactionError::Utxo(solidus_state::UtxoError::ImmatureCoinbase(_)) => ErrorKind::ImmatureFunds,
        }
    }
}

/// A validation error arising while checking a whole block. Wrapped with
/// the block's hash and height (`spec.md` §4.5 propagation policy).
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block has no transactions")]
    NoTransactions,
    #[error("block height {actual:?} does not follow parent height {expected:?}")]
    MisorderedHeight { expected: Height, actual: Height },
    #[error("block's previous_block_hash does not match its parent")]
    MismatchedParent,
    #[error("block version {0} is older than its parent's version")]
    VersionRegression(u32),
    #[error(transparent)]
    Timestamp(#[from] solidus_chain::block::BlockTimeError),
    #[error("block bits {actual:?} do not match required difficulty {expected:?}")]
    BadDifficulty { expected: u32, actual: u32 },
    #[error("block hash exceeds its difficulty target")]
    BadWork,
    #[error("transactions Merkle root mismatch")]
    MismatchedMerkleRoot,
    #[error("transaction-status Merkle root mismatch")]
    MismatchedStatusRoot,
    #[error("first transaction is not a coinbase")]
    CoinbaseNotFirst,
    #[error("a non-first transaction contains a coinbase input")]
    CoinbaseInputFound,
    #[error("coinbase pays {actual} but subsidy + fees is {expected}")]
    BadCoinbaseAmount { expected: u64, actual: u64 },
    #[error("coinbase arbitrary data exceeds the maximum length")]
    CoinbaseDataTooLong,
    #[error("block gas {actual} exceeds the maximum {max}")]
    OverGasLimit { actual: u64, max: u64 },
    #[error("block size {actual} exceeds the maximum {max}")]
    OverSizeLimit { actual: usize, max: usize },
    #[error("transaction {index} failed validation: {source}")]
    Transaction {
        index: usize,
        #[source]
        source: TransactionError,
    },
}

impl BlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::NoTransactions | BlockError::CoinbaseNotFirst | BlockError::CoinbaseInputFound => {
                ErrorKind::BadCoinbase
            }
            BlockError::MisorderedHeight { .. } => ErrorKind::MisorderedBlockHeight,
            BlockError::MismatchedParent => ErrorKind::MismatchedBlock,
            BlockError::VersionRegression(_) => ErrorKind::VersionRegression,
            BlockError::Timestamp(_) => ErrorKind::BadTimestamp,
            BlockError::BadDifficulty { .. } | BlockError::BadWork => ErrorKind::BadWork,
            BlockError::MismatchedMerkleRoot | BlockError::MismatchedStatusRoot => ErrorKind::MismatchedMerkleRoot,
            BlockError::BadCoinbaseAmount { .. } | BlockError::CoinbaseDataTooLong => ErrorKind::BadCoinbase,
            BlockError::OverGasLimit { .. } | BlockError::OverSizeLimit { .. } => ErrorKind::OverBlockLimit,
            BlockError::Transaction { source, .. } => source.kind(),
        }
    }
}

/// A block-level error paired with the hash and height it was found at, the
/// shape the synchroniser's ban-scoring and RPC error responses consume.
#[derive(Error, Debug)]
#[error("block {hash:?} at height {height:?}: {source}")]
pub struct BlockErrorAt {
    pub hash: BlockHash,
    pub height: Height,
    #[source]
    pub source: BlockError,
}
