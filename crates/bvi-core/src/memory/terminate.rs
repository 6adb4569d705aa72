use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bvi_model::{Message, TerminateRequest};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::CoreError,
    ports::{TerminationCall, TerminationChannel, decode_reply},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Request/reply channel with at most one responder.
#[derive(Clone, Default)]
pub struct MemoryTerminations {
    responder: Arc<Mutex<Option<mpsc::Sender<TerminationCall>>>>,
}

impl MemoryTerminations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_responder(&self) -> bool {
        self.responder.lock().is_some()
    }
}

#[async_trait]
impl TerminationChannel for MemoryTerminations {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TerminationCall>, CoreError> {
        let (tx, rx) = mpsc::channel(64);
        *self.responder.lock() = Some(tx);
        Ok(rx)
    }

    async fn request(&self, request: &TerminateRequest) -> Result<bool, CoreError> {
        let responder = self.responder.lock().clone();
        let Some(responder) = responder else {
            return Ok(false);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let call = TerminationCall::new(request.payload()?, reply_tx);
        if responder.send(call).await.is_err() {
            return Ok(false);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Ok(decode_reply(&reply)),
            Ok(Err(_)) => Ok(false),
            Err(_) => Err(CoreError::Channel(format!(
                "no reply for task {} within {}s",
                request.task_id,
                REQUEST_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn unsubscribe(&self) -> Result<(), CoreError> {
        self.responder.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_responder_means_nothing_in_flight() {
        let channel = MemoryTerminations::new();
        let terminated = channel
            .request(&TerminateRequest { task_id: "t".into() })
            .await
            .unwrap();
        assert!(!terminated);
    }

    #[tokio::test]
    async fn responder_reply_is_returned() {
        let channel = MemoryTerminations::new();
        let mut rx = channel.subscribe().await.unwrap();
        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                call.respond(true);
            }
        });

        let terminated = channel
            .request(&TerminateRequest { task_id: "t".into() })
            .await
            .unwrap();
        assert!(terminated);

        channel.unsubscribe().await.unwrap();
        assert!(!channel.has_responder());
    }
}
