//! Transactions (`spec.md` §3, I-T1–I-T5).

use crate::amount::{AssetAmount, AssetId};
use crate::cached::Cached;
use crate::codec::{CodecError, Decode, Encode};
use crate::define_hash;
use crate::entry;
use crate::txio::{TxInput, TxOutput};
use wire_derive::{Decode as DeriveDecode, Encode as DeriveEncode};

define_hash!(Hash, "A transaction id: the hash of its TxHeader entry in the entity graph.");

/// The half-open range of block timestamps a transaction is valid within.
/// `max == 0` means no upper bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode, DeriveDecode)]
pub struct TimeRange {
    pub min: u64,
    pub max: u64,
}

impl TimeRange {
    pub fn unbounded() -> TimeRange {
        TimeRange { min: 0, max: 0 }
    }

    pub fn contains(&self, block_time_secs: u64) -> bool {
        block_time_secs >= self.min && (self.max == 0 || block_time_secs <= self.max)
    }
}

/// A transaction: a set of inputs consumed and outputs created, bound
/// together by the entity graph (`entry::transaction_id`) rather than a
/// flat hash of the wire encoding, so that equivalent re-encodings of the
/// same economic event share an id.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode)]
pub struct Transaction {
    pub version: u32,
    pub time_range: TimeRange,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,

    /// Cached transaction id (I-T4's `serialized_size` is provided instead
    /// by [`Transaction::serialized_size`], computed on demand rather than
    /// cached, since callers rarely need it more than once).
    #[serde(skip)]
    hash: Cached<Hash>,
}

impl Decode for Transaction {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        Ok(Transaction {
            version: u32::decode(&mut reader)?,
            time_range: TimeRange::decode(&mut reader)?,
            inputs: Vec::decode(&mut reader)?,
            outputs: Vec::decode(&mut reader)?,
            hash: Cached::new(),
        })
    }
}

impl Transaction {
    pub fn new(
        version: u32,
        time_range: TimeRange,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
    ) -> Transaction {
        Transaction {
            version,
            time_range,
            inputs,
            outputs,
            hash: Cached::new(),
        }
    }

    /// The transaction id (I-T1 through I-T5 are checked elsewhere; this is
    /// purely the content address).
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash(entry::transaction_id(self).0)
    }

    /// (I-T1) Whether this transaction's sole input is a coinbase input.
    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs.as_slice(), [TxInput::Coinbase { .. }])
    }

    pub fn has_coinbase_input(&self) -> bool {
        self.inputs.iter().any(TxInput::is_coinbase)
    }

    /// (I-T4) The exact length of this transaction's canonical encoding.
    pub fn serialized_size(&self) -> usize {
        self.encode_to_vec()
            .expect("encoding to a Vec is infallible")
            .len()
    }

    /// Sums this transaction's inputs and outputs per asset (I-T2, I-T3).
    /// Issuance and coinbase inputs are excluded from `inputs_by_asset`, as
    /// they mint rather than move value; the caller is expected to validate
    /// those separately.
    pub fn spent_by_asset(&self) -> std::collections::BTreeMap<AssetId, u128> {
        let mut totals = std::collections::BTreeMap::new();
        for input in &self.inputs {
            if let TxInput::Spend { asset_amount, .. } = input {
                *totals.entry(asset_amount.asset_id).or_insert(0u128) += asset_amount.amount as u128;
            }
        }
        totals
    }

    pub fn created_by_asset(&self) -> std::collections::BTreeMap<AssetId, u128> {
        let mut totals = std::collections::BTreeMap::new();
        for output in &self.outputs {
            *totals
                .entry(output.asset_amount.asset_id)
                .or_insert(0u128) += output.asset_amount.amount as u128;
        }
        totals
    }

    /// (I-T3) native-asset inputs minus native-asset outputs; the caller
    /// must already know this is non-negative (the validator enforces it).
    pub fn native_fee(&self) -> Option<u128> {
        let spent = self
            .spent_by_asset()
            .get(&AssetId::NATIVE)
            .copied()
            .unwrap_or(0);
        let created = self
            .created_by_asset()
            .get(&AssetId::NATIVE)
            .copied()
            .unwrap_or(0);
        spent.checked_sub(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txio::{ControlProgram, TxOutput};

    fn sample_output() -> TxOutput {
        TxOutput::new(
            AssetAmount::new(AssetId::NATIVE, 10),
            ControlProgram::trivial_true(),
        )
    }

    #[test]
    fn coinbase_transaction_has_exactly_the_coinbase_input() {
        let tx = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase {
                data: crate::txio::CoinbaseData(vec![1, 2, 3]),
            }],
            vec![sample_output()],
        );
        assert!(tx.is_coinbase());
    }

    #[test]
    fn a_spend_alongside_other_inputs_is_not_a_coinbase_transaction() {
        let spend = TxInput::Spend {
            output_id: crate::entry::EntryId([0u8; 32]),
            asset_amount: AssetAmount::new(AssetId::NATIVE, 10),
            source_id: crate::entry::EntryId([0u8; 32]),
            source_position: 0,
            control_program: ControlProgram::trivial_true(),
            witness_arguments: vec![],
        };
        let tx = Transaction::new(1, TimeRange::unbounded(), vec![spend], vec![sample_output()]);
        assert!(!tx.is_coinbase());
        assert!(!tx.has_coinbase_input());
    }

    #[test]
    fn different_transactions_have_different_ids() {
        let a = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase {
                data: crate::txio::CoinbaseData(vec![1]),
            }],
            vec![sample_output()],
        );
        let b = Transaction::new(
            1,
            TimeRange::unbounded(),
            vec![TxInput::Coinbase {
                data: crate::txio::CoinbaseData(vec![2]),
            }],
            vec![sample_output()],
        );
        assert_ne!(a.hash().0, b.hash().0);
    }

    #[test]
    fn time_range_with_no_upper_bound_accepts_any_future_time() {
        let range = TimeRange::unbounded();
        assert!(range.contains(0));
        assert!(range.contains(u64::MAX));
    }
}
