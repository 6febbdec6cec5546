//! Block template assembly and the proof-of-work search (`spec.md` §4.9).
//!
//! This crate has no opinion on how its caller schedules work: `template`
//! builds a candidate block against a `UtxoSource` snapshot and a
//! `solidus_mempool::Mempool`, `pow` searches a nonce range (meant to run
//! inside a blocking task, §5), and `getwork` layers the external
//! GetWork/SubmitWork protocol over the same template.

pub mod getwork;
pub mod pow;
pub mod template;

pub use getwork::{SubmitError, WorkQueue};
pub use template::{assemble_block, build_template, next_header_shape, Template, TemplateHeader};
