//! The `AccountUTXO` table (`spec.md` §4.10): every output the wallet has
//! ever seen pay into a locally managed address.

use serde::{Deserialize, Serialize};
use solidus_chain::amount::AssetId;
use solidus_chain::block::Height;
use solidus_chain::entry::EntryId;
use solidus_chain::txio::ControlProgram;

use crate::account::AccountId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountUtxo {
    pub output_id: EntryId,
    pub asset_id: AssetId,
    pub amount: u64,
    pub account_id: AccountId,
    pub program_index: u64,
    pub control_program: ControlProgram,
    pub block_height: Height,
    pub spent: bool,
    /// The height a later block's spend marked this entry spent at, kept so
    /// `reset_to_height` can undo exactly that spend on rewind.
    pub spent_at_height: Option<Height>,
}
