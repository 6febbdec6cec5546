//! Control programs and the inputs/outputs that make up a transaction.
//!
//! `spec.md` §3: a `ControlProgram` is a VM-version tag plus a flat opcode
//! sequence, evaluated by `solidus-vm` against a witness stack. `TxInput` is
//! a closed, tagged sum type (spend / issuance / coinbase) rather than the
//! interface-dispatched shape `spec.md` §9 flags for re-architecture.

use crate::amount::AssetAmount;
use crate::codec::{CodecError, Decode, Encode};
use crate::compactint::CompactInt;
use crate::entry::EntryId;
use wire_derive::{Decode as DeriveDecode, Encode as DeriveEncode};

/// A VM-versioned, flat opcode sequence.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize, DeriveEncode, DeriveDecode)]
pub struct ControlProgram {
    pub vm_version: u64,
    pub code: Vec<u8>,
}

impl ControlProgram {
    pub fn new(vm_version: u64, code: Vec<u8>) -> ControlProgram {
        ControlProgram { vm_version, code }
    }

    /// A control program that any witness satisfies — useful for issuance
    /// programs and tests. `0x51` is the VM's `OP_TRUE` opcode; the VM's
    /// opcode table itself lives in `solidus-vm`, which depends on this
    /// crate rather than the other way around.
    pub fn trivial_true() -> ControlProgram {
        const OP_TRUE: u8 = 0x51;
        ControlProgram::new(1, vec![OP_TRUE])
    }

    pub fn serialized_size(&self) -> usize {
        CompactInt::size(1) + CompactInt::size(self.code.len()) + self.code.len()
    }
}

/// Arbitrary data a miner embeds in a coinbase input.
#[derive(Clone, Eq, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode, DeriveDecode)]
pub struct CoinbaseData(pub Vec<u8>);

impl std::fmt::Debug for CoinbaseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let escaped = String::from_utf8(
            self.0
                .iter()
                .cloned()
                .flat_map(std::ascii::escape_default)
                .collect(),
        )
        .unwrap_or_else(|_| hex::encode(&self.0));
        f.debug_tuple("CoinbaseData").field(&escaped).finish()
    }
}

/// A transaction input (`spec.md` §3). Closed sum type: every spend is
/// exactly one of these three shapes, matched exhaustively everywhere.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TxInput {
    /// Spends a previously-created, unspent output.
    Spend {
        output_id: EntryId,
        asset_amount: AssetAmount,
        source_id: EntryId,
        source_position: u64,
        control_program: ControlProgram,
        witness_arguments: Vec<Vec<u8>>,
    },
    /// Mints units of a non-native asset under an issuance program.
    Issuance {
        nonce: Vec<u8>,
        asset_amount: AssetAmount,
        issuance_program: ControlProgram,
        asset_definition: Vec<u8>,
        witness_arguments: Vec<Vec<u8>>,
    },
    /// The single, free-form input of a block's first transaction.
    Coinbase { data: CoinbaseData },
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        matches!(self, TxInput::Coinbase { .. })
    }

    pub fn asset_amount(&self) -> Option<AssetAmount> {
        match self {
            TxInput::Spend { asset_amount, .. } => Some(*asset_amount),
            TxInput::Issuance { asset_amount, .. } => Some(*asset_amount),
            TxInput::Coinbase { .. } => None,
        }
    }

    pub fn witness_arguments(&self) -> &[Vec<u8>] {
        match self {
            TxInput::Spend {
                witness_arguments, ..
            } => witness_arguments,
            TxInput::Issuance {
                witness_arguments, ..
            } => witness_arguments,
            TxInput::Coinbase { .. } => &[],
        }
    }
}

/// A transaction output: an amount of some asset, locked by a control program.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize, DeriveEncode, DeriveDecode)]
pub struct TxOutput {
    pub asset_amount: AssetAmount,
    pub control_program: ControlProgram,
}

impl TxOutput {
    pub fn new(asset_amount: AssetAmount, control_program: ControlProgram) -> TxOutput {
        TxOutput {
            asset_amount,
            control_program,
        }
    }
}

impl Encode for TxInput {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            TxInput::Spend {
                output_id,
                asset_amount,
                source_id,
                source_position,
                control_program,
                witness_arguments,
            } => {
                0u8.encode(&mut target)?;
                output_id.encode(&mut target)?;
                asset_amount.encode(&mut target)?;
                source_id.encode(&mut target)?;
                source_position.encode(&mut target)?;
                control_program.encode(&mut target)?;
                witness_arguments.encode(&mut target)
            }
            TxInput::Issuance {
                nonce,
                asset_amount,
                issuance_program,
                asset_definition,
                witness_arguments,
            } => {
                1u8.encode(&mut target)?;
                nonce.clone().encode(&mut target)?;
                asset_amount.encode(&mut target)?;
                issuance_program.encode(&mut target)?;
                asset_definition.clone().encode(&mut target)?;
                witness_arguments.encode(&mut target)
            }
            TxInput::Coinbase { data } => {
                2u8.encode(&mut target)?;
                data.encode(&mut target)
            }
        }
    }
}

impl Decode for TxInput {
    fn decode<R: std::io::Read>(mut reader: R) -> Result<Self, crate::codec::CodecError> {
        match u8::decode(&mut reader)? {
            0 => Ok(TxInput::Spend {
                output_id: EntryId::decode(&mut reader)?,
                asset_amount: AssetAmount::decode(&mut reader)?,
                source_id: EntryId::decode(&mut reader)?,
                source_position: u64::decode(&mut reader)?,
                control_program: ControlProgram::decode(&mut reader)?,
                witness_arguments: Vec::decode(&mut reader)?,
            }),
            1 => Ok(TxInput::Issuance {
                nonce: Vec::decode(&mut reader)?,
                asset_amount: AssetAmount::decode(&mut reader)?,
                issuance_program: ControlProgram::decode(&mut reader)?,
                asset_definition: Vec::decode(&mut reader)?,
                witness_arguments: Vec::decode(&mut reader)?,
            }),
            2 => Ok(TxInput::Coinbase {
                data: CoinbaseData::decode(&mut reader)?,
            }),
            _ => Err(crate::codec::CodecError::Parse("invalid tx input tag")),
        }
    }
}
