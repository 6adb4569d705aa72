//! Payloads exchanged over the work and config queues and the termination channel.

use serde::{Serialize, de::DeserializeOwned};

use crate::ModelError;

mod created;
pub use created::CreatedTask;

mod config;
pub use config::ConfigUpdate;

mod terminate;
pub use terminate::TerminateRequest;

/// A queue payload with a JSON wire form.
pub trait Message: Sized + Send + 'static {
    fn payload(&self) -> Result<Vec<u8>, ModelError>;
    fn decode(bytes: &[u8]) -> Result<Self, ModelError>;
}

impl<T> Message for T
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn payload(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(self).map_err(ModelError::Encode)
    }

    fn decode(bytes: &[u8]) -> Result<Self, ModelError> {
        serde_json::from_slice(bytes).map_err(ModelError::Decode)
    }
}
