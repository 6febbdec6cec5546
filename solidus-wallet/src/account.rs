//! Account, address and asset-definition records (`spec.md` §4.10).

use serde::{Deserialize, Serialize};
use solidus_chain::amount::AssetId;
use solidus_chain::txio::ControlProgram;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub alias: String,
}

/// One address generated for an account: a control program at a given
/// derivation index. Looked up by the SHA3-256 of its control program's
/// encoding, the way `spec.md` §4.10's connect handler recognizes an output
/// as locally owned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Address {
    pub account_id: AccountId,
    pub program_index: u64,
    pub control_program: ControlProgram,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub asset_id: AssetId,
    pub alias: String,
    pub definition: Vec<u8>,
}

/// The content address an output's control program is indexed under.
pub fn program_digest(program: &ControlProgram) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    hasher.update(&program.vm_version.to_le_bytes());
    hasher.update(&program.code);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
