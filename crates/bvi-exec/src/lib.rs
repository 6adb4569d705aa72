//! # bvi-exec
//!
//! Scan handlers that drive remote analysis backends.
//!
//! The only backend today is the binary homology analysis service: [`BhaHandler`] resolves the
//! scan inputs, hands them to an [`Executor`] that submits the scan and polls its status marker in
//! the blob store, then persists the matched functions.

mod error;
pub use error::{ExecError, ExecResult};

pub mod bha;
pub use bha::{BhaClient, BhaConfig, BhaHandler, Executor, ScanOutcome, ScanStatus};
