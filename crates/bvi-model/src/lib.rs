//! Domain types shared by the scan scheduler crates.
//!
//! Nothing in here performs I/O: these are the documents the scheduler reads and writes through its
//! collaborator ports, and the messages it exchanges with the queue.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod message;
pub use message::*;
