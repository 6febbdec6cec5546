//! The entity graph: a content-addressed DAG of entries that gives every
//! transaction, spend, issuance and output a stable id derived only from its
//! own fields and the ids of the entries it references (`spec.md` §4.2).
//!
//! A transaction's id is the id of its `TxHeader` entry. Two transactions
//! that differ in any witness byte, any output amount, or any ordering
//! produce different entries and therefore different ids; two entries that
//! happen to carry identical fields and identical references collapse to
//! the same id, which is how `solidus-vm`'s `TXSIGHASH` opcode can commit to
//! "the rest of this transaction" without walking it twice.

use crate::amount::AssetAmount;
use crate::codec::{digest, Encode};
use crate::define_hash;
use crate::transaction::Transaction;
use crate::txio::{ControlProgram, TxInput};

define_hash!(EntryId, "The content-addressed id of a node in the entity graph.");

const TAG_ISSUANCE: u8 = 0;
const TAG_SPEND: u8 = 1;
const TAG_MUX: u8 = 2;
const TAG_OUTPUT: u8 = 3;
const TAG_RETIREMENT: u8 = 4;
const TAG_TX_HEADER: u8 = 5;
const TAG_COINBASE: u8 = 6;

/// Computes an entry's id by hashing a type tag, the entry's own scalar
/// fields, and the ids of the entries it points to — never the full
/// contents of those referenced entries.
fn entry_id<F: FnOnce(&mut digest::Writer)>(tag: u8, write_fields: F) -> EntryId {
    let mut writer = digest::Writer::default();
    tag.encode(&mut writer).expect("digest writer is infallible");
    write_fields(&mut writer);
    EntryId(writer.finish())
}

/// The id an issuance input contributes to the graph.
pub fn issuance_id(nonce: &[u8], asset_amount: AssetAmount, issuance_program: &ControlProgram) -> EntryId {
    entry_id(TAG_ISSUANCE, |w| {
        nonce.to_vec().encode(&mut *w).expect("digest writer is infallible");
        asset_amount.encode(&mut *w).expect("digest writer is infallible");
        issuance_program.encode(&mut *w).expect("digest writer is infallible");
    })
}

/// The id a spend input contributes to the graph. Spends are witnessed —
/// the signature data over the control program is part of what is
/// committed to, so two spends of the same output with different
/// witnesses are different entries.
pub fn spend_id(spent_output_id: EntryId, witness_arguments: &[Vec<u8>]) -> EntryId {
    entry_id(TAG_SPEND, |w| {
        spent_output_id.encode(&mut *w).expect("digest writer is infallible");
        witness_arguments
            .to_vec()
            .encode(&mut *w)
            .expect("digest writer is infallible");
    })
}

/// The id of the single coinbase entry a coinbase transaction contributes.
pub fn coinbase_id(data: &[u8]) -> EntryId {
    entry_id(TAG_COINBASE, |w| {
        data.to_vec().encode(&mut *w).expect("digest writer is infallible");
    })
}

/// The id of the `Mux` entry that fans a transaction's input entries in to
/// its output entries.
pub fn mux_id(sources: &[(EntryId, AssetAmount)]) -> EntryId {
    entry_id(TAG_MUX, |w| {
        sources.to_vec().encode(&mut *w).expect("digest writer is infallible");
    })
}

/// The id of an `Output` entry — this is also the `OutputId` a later
/// transaction's `Spend` input references.
pub fn output_id(
    source_id: EntryId,
    position: u64,
    asset_amount: AssetAmount,
    control_program: &ControlProgram,
) -> EntryId {
    entry_id(TAG_OUTPUT, |w| {
        source_id.encode(&mut *w).expect("digest writer is infallible");
        position.encode(&mut *w).expect("digest writer is infallible");
        asset_amount.encode(&mut *w).expect("digest writer is infallible");
        control_program.encode(&mut *w).expect("digest writer is infallible");
    })
}

/// The id of a `Retirement` entry — an output whose control program is
/// empty, marking those units permanently unspendable.
pub fn retirement_id(source_id: EntryId, position: u64, asset_amount: AssetAmount) -> EntryId {
    entry_id(TAG_RETIREMENT, |w| {
        source_id.encode(&mut *w).expect("digest writer is infallible");
        position.encode(&mut *w).expect("digest writer is infallible");
        asset_amount.encode(&mut *w).expect("digest writer is infallible");
    })
}

/// The id of a transaction's `TxHeader` entry, which is the transaction id.
pub fn tx_header_id(version: u32, result_ids: &[EntryId]) -> EntryId {
    entry_id(TAG_TX_HEADER, |w| {
        version.encode(&mut *w).expect("digest writer is infallible");
        result_ids.to_vec().encode(&mut *w).expect("digest writer is infallible");
    })
}

/// Walks a transaction's inputs and outputs, builds the entity graph the
/// fields imply, and returns the transaction id (the `TxHeader` entry's id).
///
/// A non-coinbase transaction's graph is: one `Issuance` or `Spend` entry
/// per input, fanned in to a single `Mux` entry, fanned out to one `Output`
/// entry per output, all gathered under the `TxHeader`. A coinbase
/// transaction has exactly one input and contributes a `Coinbase` entry
/// directly as the `Mux`'s sole source, since it spends nothing and
/// issues nothing (I-T1).
fn input_sources(tx: &Transaction) -> Vec<(EntryId, AssetAmount)> {
    tx.inputs
        .iter()
        .map(|input| match input {
            TxInput::Spend {
                output_id,
                asset_amount,
                witness_arguments,
                ..
            } => (spend_id(*output_id, witness_arguments), *asset_amount),
            TxInput::Issuance {
                nonce,
                asset_amount,
                issuance_program,
                ..
            } => (issuance_id(nonce, *asset_amount, issuance_program), *asset_amount),
            TxInput::Coinbase { data } => (
                coinbase_id(&data.0),
                AssetAmount::new(crate::amount::AssetId::NATIVE, 0),
            ),
        })
        .collect()
}

/// The ids a transaction's outputs get in the entity graph, in output order.
/// This is the authoritative way to compute a tx's `OutputId`s — anyone
/// needing to look up or create the `UtxoEntry` for output `i` of `tx` must
/// use `output_ids(tx)[i]` rather than recomputing the `Mux` id by hand.
pub fn output_ids(tx: &Transaction) -> Vec<EntryId> {
    let mux = mux_id(&input_sources(tx));
    tx.outputs
        .iter()
        .enumerate()
        .map(|(position, output)| {
            output_id(mux, position as u64, output.asset_amount, &output.control_program)
        })
        .collect()
}

pub fn transaction_id(tx: &Transaction) -> EntryId {
    let result_ids = output_ids(tx);
    tx_header_id(tx.version, &result_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::AssetId;
    use crate::txio::ControlProgram;

    #[test]
    fn different_witnesses_yield_different_spend_ids() {
        let output = output_id(
            EntryId([1u8; 32]),
            0,
            AssetAmount::new(AssetId::NATIVE, 10),
            &ControlProgram::trivial_true(),
        );
        let a = spend_id(output, &[vec![1]]);
        let b = spend_id(output, &[vec![2]]);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn output_id_is_sensitive_to_position() {
        let mux = EntryId([7u8; 32]);
        let amount = AssetAmount::new(AssetId::NATIVE, 5);
        let program = ControlProgram::trivial_true();
        let a = output_id(mux, 0, amount, &program);
        let b = output_id(mux, 1, amount, &program);
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn coinbase_data_determines_the_coinbase_entry_id() {
        assert_ne!(coinbase_id(b"a").0, coinbase_id(b"b").0);
        assert_eq!(coinbase_id(b"a").0, coinbase_id(b"a").0);
    }
}
