//! In-process collaborators.
//!
//! They honour the same contracts as the production ones (redelivery of unacknowledged messages,
//! conditional updates, no-responder replies) and back the test suites of every crate.

mod queue;
pub use queue::MemoryQueue;

mod store;
pub use store::MemoryStore;

mod blob;
pub use blob::MemoryBlobStore;

mod terminate;
pub use terminate::MemoryTerminations;
