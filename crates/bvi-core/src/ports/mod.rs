//! Contracts of the external collaborators the scheduler drives.
//!
//! Implementations live outside this crate except for the in-memory ones in [`crate::memory`].

mod queue;
pub use queue::{Acker, Delivery, Queue};

mod store;
pub use store::DocumentStore;

mod blob;
pub use blob::{BlobStore, ObjectInfo};

mod terminate;
pub use terminate::{TerminationCall, TerminationChannel, decode_reply, encode_reply};
