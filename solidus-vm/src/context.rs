//! The context-introspection surface a running program can query
//! (`spec.md` §4.1: `CHECKOUTPUT`, `PROGRAM`, `TXSIGHASH`).
//!
//! `solidus-vm` has no notion of a transaction or a UTXO set; it only knows
//! about the current input's control program and witness, plus whatever a
//! `TxContext` implementation is willing to answer. `solidus-consensus`
//! supplies the real implementation, built from the entity graph so that
//! `TXSIGHASH` commits to the whole transaction (`spec.md` §4.2).

use solidus_chain::amount::AssetAmount;
use solidus_chain::txio::ControlProgram;

/// Everything a program executing for one input may ask about its
/// surrounding transaction.
pub trait TxContext {
    /// The id of the entry the VM should treat as "this transaction",
    /// returned by `TXSIGHASH`.
    fn tx_sighash(&self) -> [u8; 32];

    /// The control program and asset amount of the input currently
    /// spending, returned by `PROGRAM`/`AMOUNT`/`ASSETID`.
    fn current_program(&self) -> &ControlProgram;
    fn current_asset_amount(&self) -> AssetAmount;

    /// `CHECKOUTPUT`: whether output `index` of this transaction carries
    /// exactly `asset_amount` locked by `control_program`.
    fn check_output(&self, index: u64, asset_amount: AssetAmount, control_program: &ControlProgram) -> bool;
}

/// A `TxContext` for tests and for programs that never use introspection
/// opcodes (e.g. `trivial_true`, issuance programs with no outputs to check).
pub struct NullContext {
    pub sighash: [u8; 32],
    pub program: ControlProgram,
    pub asset_amount: AssetAmount,
}

impl TxContext for NullContext {
    fn tx_sighash(&self) -> [u8; 32] {
        self.sighash
    }

    fn current_program(&self) -> &ControlProgram {
        &self.program
    }

    fn current_asset_amount(&self) -> AssetAmount {
        self.asset_amount
    }

    fn check_output(&self, _index: u64, _asset_amount: AssetAmount, _control_program: &ControlProgram) -> bool {
        false
    }
}
