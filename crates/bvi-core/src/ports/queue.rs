use async_trait::async_trait;
use bvi_model::Message;

use crate::error::CoreError;

/// Acknowledges one fetched message.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), CoreError>;
}

/// A fetched message together with its acknowledgement handle.
///
/// Dropping a delivery without [`ack`](Self::ack) leaves the message unacknowledged; the queue
/// makes it visible again.
pub struct Delivery<M> {
    pub message: M,
    acker: Box<dyn Acker>,
}

impl<M> Delivery<M> {
    pub fn new(message: M, acker: Box<dyn Acker>) -> Self {
        Self { message, acker }
    }

    pub async fn ack(&self) -> Result<(), CoreError> {
        self.acker.ack().await
    }
}

/// Durable pull queue with manual acknowledgement (at-least-once).
#[async_trait]
pub trait Queue<M: Message + Sync>: Send + Sync {
    /// Create the stream/consumer topology; idempotent.
    async fn init(&self) -> Result<(), CoreError>;

    async fn publish(&self, message: &M) -> Result<(), CoreError>;

    /// Fetch at most one message; `Ok(None)` when nothing is available.
    async fn fetch_one(&self) -> Result<Option<Delivery<M>>, CoreError>;

    async fn delete_consumer(&self) -> Result<(), CoreError>;
}
