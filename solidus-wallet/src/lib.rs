//! The wallet indexer (`spec.md` §4.10): accounts, addresses, the
//! `AccountUTXO` table and annotated transaction history, kept in step with
//! the chain and mempool by [`indexer::Wallet`].

pub mod account;
pub mod account_utxo;
pub mod error;
pub mod history;
pub mod indexer;
pub mod store;

pub use account::{Account, AccountId, Address, AssetDefinition};
pub use account_utxo::AccountUtxo;
pub use error::WalletError;
pub use history::AnnotatedTx;
pub use indexer::{BlockByHeight, Wallet};
pub use store::WalletStore;
