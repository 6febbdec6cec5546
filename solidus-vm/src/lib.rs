//! The script VM: a bounded-gas stack machine that evaluates a
//! `ControlProgram` against a witness stack to decide whether a spend or
//! issuance is authorized (`spec.md` §4.1).
//!
//! This crate knows nothing about blocks, the UTXO set, or the mempool; it
//! is a pure function from `(program, witness, gas budget, context)` to
//! `Result<RunOutcome, VmError>`. `solidus-consensus` is the only caller.

pub mod context;
pub mod error;
pub mod opcode;
pub mod uint256;
pub mod vm;

pub use context::TxContext;
pub use error::VmError;
pub use vm::{RunOutcome, VirtualMachine};
