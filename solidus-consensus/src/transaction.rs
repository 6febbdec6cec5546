//! `ValidateTx` (`spec.md` §4.5): structural checks, per-asset balance,
//! per-input script execution, and gas accounting for a single transaction
//! against a `UtxoView`.

use std::collections::{BTreeMap, HashSet};

use solidus_chain::amount::AssetId;
use solidus_chain::block::Height;
use solidus_chain::entry::{self, EntryId};
use solidus_chain::parameters::ChainParams;
use solidus_chain::transaction::Transaction;
use solidus_chain::txio::{ControlProgram, TxInput, TxOutput};
use solidus_state::{UtxoSource, UtxoView};
use solidus_vm::{TxContext, VirtualMachine};

use crate::error::TransactionError;
use crate::gas::GasState;

/// The `TxContext` seen by the input at `input_index`: `tx_sighash` commits
/// to the whole transaction via its entity-graph id (`spec.md` §4.2), so a
/// signature over it covers every other input and output as a side effect.
struct InputContext<'a> {
    tx_id: [u8; 32],
    program: &'a ControlProgram,
    asset_amount: solidus_chain::amount::AssetAmount,
    outputs: &'a [TxOutput],
}

impl<'a> TxContext for InputContext<'a> {
    fn tx_sighash(&self) -> [u8; 32] {
        self.tx_id
    }

    fn current_program(&self) -> &ControlProgram {
        self.program
    }

    fn current_asset_amount(&self) -> solidus_chain::amount::AssetAmount {
        self.asset_amount
    }

    fn check_output(
        &self,
        index: u64,
        asset_amount: solidus_chain::amount::AssetAmount,
        control_program: &ControlProgram,
    ) -> bool {
        self.outputs
            .get(index as usize)
            .map(|output| output.asset_amount == asset_amount && &output.control_program == control_program)
            .unwrap_or(false)
    }
}

/// Runs every spend/issuance input's control program once. Coinbase inputs
/// carry no program and are skipped; callers check I-T1 separately.
fn run_scripts(tx: &Transaction, tx_id: [u8; 32], gas_budget: u64) -> Result<u64, (usize, solidus_vm::VmError)> {
    let mut remaining = gas_budget;
    for (index, input) in tx.inputs.iter().enumerate() {
        let (program, asset_amount, witness) = match input {
            TxInput::Spend {
                control_program,
                asset_amount,
                witness_arguments,
                ..
            } => (control_program, *asset_amount, witness_arguments),
            TxInput::Issuance {
                issuance_program,
                asset_amount,
                witness_arguments,
                ..
            } => (issuance_program, *asset_amount, witness_arguments),
            TxInput::Coinbase { .. } => continue,
        };
        let context = InputContext {
            tx_id,
            program,
            asset_amount,
            outputs: &tx.outputs,
        };
        let vm = VirtualMachine::new(program, witness, remaining, &context).map_err(|e| (index, e))?;
        let outcome = vm.run().map_err(|e| (index, e))?;
        remaining = remaining.saturating_sub(outcome.gas_used);
    }
    Ok(gas_budget - remaining)
}

/// Checks I-T2/I-T3: every non-native asset balances input-for-output
/// exactly; the native asset may have a non-negative surplus (the fee).
fn check_balance(tx: &Transaction) -> Result<u128, TransactionError> {
    let spent = tx.spent_by_asset();
    let created = tx.created_by_asset();

    let mut assets: BTreeMap<AssetId, ()> = BTreeMap::new();
    for asset in spent.keys().chain(created.keys()) {
        assets.insert(*asset, ());
    }

    for asset in assets.keys() {
        if asset.is_native() {
            continue;
        }
        let in_amount = spent.get(asset).copied().unwrap_or(0);
        let out_amount = created.get(asset).copied().unwrap_or(0);
        if in_amount != out_amount {
            return Err(TransactionError::Unbalanced(*asset));
        }
    }

    let native_in = spent.get(&AssetId::NATIVE).copied().unwrap_or(0);
    let native_out = created.get(&AssetId::NATIVE).copied().unwrap_or(0);
    native_in
        .checked_sub(native_out)
        .ok_or(TransactionError::NegativeFee)
}

fn check_no_duplicate_inputs(tx: &Transaction) -> Result<(), TransactionError> {
    let mut seen: HashSet<EntryId> = HashSet::new();
    for input in &tx.inputs {
        if let TxInput::Spend { output_id, .. } = input {
            if !seen.insert(*output_id) {
                return Err(TransactionError::DuplicateInput(*output_id));
            }
        }
    }
    Ok(())
}

/// `output_id` is content-addressed (`spec.md` §3 "Output id"): a `Spend`
/// must declare the exact `source_id`/`source_position`/`asset_amount`/
/// `control_program` that hash to its referenced `output_id`, or the UTXO
/// lookup it feeds (by `output_id` alone) would accept a forged binding —
/// any declared program against any existing output, any declared amount
/// against any existing UTXO.
fn check_spend_output_ids(tx: &Transaction) -> Result<(), TransactionError> {
    for input in &tx.inputs {
        if let TxInput::Spend {
            output_id,
            asset_amount,
            source_id,
            source_position,
            control_program,
            ..
        } = input
        {
            let computed = entry::output_id(*source_id, *source_position, *asset_amount, control_program);
            if computed != *output_id {
                return Err(TransactionError::MismatchedOutputId {
                    declared: *output_id,
                    computed,
                });
            }
        }
    }
    Ok(())
}

fn check_coinbase_shape(tx: &Transaction) -> Result<(), TransactionError> {
    let coinbase_positions: Vec<usize> = tx
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, i)| i.is_coinbase())
        .map(|(idx, _)| idx)
        .collect();
    match coinbase_positions.as_slice() {
        [] => Ok(()),
        [0] if tx.inputs.len() == 1 => Ok(()),
        [0] => Err(TransactionError::MultipleCoinbaseInputs),
        _ => Err(TransactionError::CoinbaseNotFirst),
    }
}

/// `spec.md` §4.5 `ValidateTx`. `block_time` is the timestamp the
/// transaction is being validated against (the candidate block's time, or
/// the current time for mempool admission); `height` is that block's height.
pub fn validate_transaction<S: UtxoSource>(
    params: &ChainParams,
    view: &mut UtxoView<S>,
    height: Height,
    block_time: u64,
    tx: &Transaction,
) -> Result<GasState, TransactionError> {
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    check_coinbase_shape(tx)?;
    check_no_duplicate_inputs(tx)?;
    check_spend_output_ids(tx)?;
    if !tx.time_range.contains(block_time) {
        return Err(TransactionError::TimeRangeViolated {
            block_time,
            height,
        });
    }

    let storage = GasState::storage_only(tx.serialized_size());

    if tx.is_coinbase() {
        view.apply_transaction(height, params.coinbase_maturity, tx, false, params.native_asset)?;
        return Ok(storage);
    }

    let native_fee = check_balance(tx)?;

    if native_fee == 0 && !tx.spent_by_asset().contains_key(&AssetId::NATIVE) {
        return Err(TransactionError::NoGasInput);
    }

    let tx_id = entry::transaction_id(tx).0;
    match run_scripts(tx, tx_id, params.max_tx_gas) {
        Ok(vm_gas) => {
            let gas = storage.with_vm_gas(vm_gas);
            if gas.gas_used > params.max_tx_gas {
                return Err(TransactionError::GasExceeded {
                    used: gas.gas_used,
                    limit: params.max_tx_gas,
                });
            }
            if !gas.covered_by(native_fee) {
                return Err(TransactionError::NoGasInput);
            }
            view.apply_transaction(height, params.coinbase_maturity, tx, false, params.native_asset)?;
            Ok(gas)
        }
        Err((input_index, source)) => {
            // S4: a script failure can still be admitted, gas-only, if the
            // native-asset spend alone covers storage gas.
            if storage.storage_covered_by(native_fee) {
                view.apply_transaction(height, params.coinbase_maturity, tx, true, params.native_asset)?;
                Ok(GasState {
                    gas_valid: false,
                    ..storage
                })
            } else {
                Err(TransactionError::Vm {
                    tx_id: tx.hash(),
                    input_index,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::amount::AssetAmount;
    use solidus_chain::parameters::Network;
    use solidus_chain::transaction::TimeRange;
    use solidus_chain::txio::{CoinbaseData, ControlProgram as CP};
    use solidus_state::UtxoEntry;
    use std::collections::HashMap;

    fn params() -> ChainParams {
        ChainParams::for_network(Network::Solonet)
    }

    fn coinbase_tx(amount: u64) -> Transaction {
        Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase {
                data: CoinbaseData(vec![1]),
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, amount), CP::trivial_true())],
        )
    }

    #[test]
    fn coinbase_transaction_always_validates_as_storage_only() {
        let backing: HashMap<EntryId, UtxoEntry> = HashMap::new();
        let mut view = UtxoView::new(&backing);
        let tx = coinbase_tx(100);
        let gas = validate_transaction(&params(), &mut view, Height(0), 1000, &tx).unwrap();
        assert!(gas.gas_valid);
        assert_eq!(gas.vm_gas, 0);
    }

    #[test]
    fn spend_with_trivial_true_program_validates_and_pays_gas() {
        let output_id = entry::output_id(
            entry::mux_id(&[]),
            0,
            AssetAmount::new(AssetId::NATIVE, 1000),
            &CP::trivial_true(),
        );
        let mut backing = HashMap::new();
        backing.insert(output_id, UtxoEntry::new(output_id, false, Height(0)));

        let spend_tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 1000),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: CP::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 900), CP::trivial_true())],
        );

        let mut view = UtxoView::new(&backing);
        let gas = validate_transaction(&params(), &mut view, Height(1), 1000, &spend_tx).unwrap();
        assert!(gas.gas_valid);
    }

    #[test]
    fn unbalanced_non_native_asset_is_rejected() {
        let asset = AssetId([9u8; 32]);
        let output_id = entry::output_id(entry::mux_id(&[]), 0, AssetAmount::new(asset, 10), &CP::trivial_true());
        let mut backing = HashMap::new();
        backing.insert(output_id, UtxoEntry::new(output_id, false, Height(0)));

        let tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id,
                asset_amount: AssetAmount::new(asset, 10),
                source_id: EntryId([0u8; 32]),
                source_position: 0,
                control_program: CP::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(asset, 9), CP::trivial_true())],
        );

        let mut view = UtxoView::new(&backing);
        let err = validate_transaction(&params(), &mut view, Height(1), 1000, &tx).unwrap_err();
        assert!(matches!(err, TransactionError::Unbalanced(a) if a == asset));
    }

    #[test]
    fn spend_claiming_a_victim_output_id_under_a_forged_binding_is_rejected() {
        // The victim output really exists, locked under `trivial_true`. An
        // attacker declares the same `output_id` but a different
        // `control_program`/`asset_amount` binding for it.
        let victim_output_id = entry::output_id(
            entry::mux_id(&[]),
            0,
            AssetAmount::new(AssetId::NATIVE, 5),
            &CP::trivial_true(),
        );
        let mut backing = HashMap::new();
        backing.insert(victim_output_id, UtxoEntry::new(victim_output_id, false, Height(0)));

        let forged_tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Spend {
                output_id: victim_output_id,
                asset_amount: AssetAmount::new(AssetId::NATIVE, 1_000_000),
                source_id: EntryId([0xffu8; 32]),
                source_position: 7,
                control_program: CP::trivial_true(),
                witness_arguments: vec![],
            }],
            vec![TxOutput::new(AssetAmount::new(AssetId::NATIVE, 1_000_000), CP::trivial_true())],
        );

        let mut view = UtxoView::new(&backing);
        let err = validate_transaction(&params(), &mut view, Height(1), 1000, &forged_tx).unwrap_err();
        assert!(matches!(err, TransactionError::MismatchedOutputId { declared, .. } if declared == victim_output_id));
    }
}
