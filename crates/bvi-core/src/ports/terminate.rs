use async_trait::async_trait;
use bvi_model::{Message, ModelError, TerminateRequest};
use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;

const REPLY_TRUE: &[u8] = b"true";
const REPLY_FALSE: &[u8] = b"false";

pub fn encode_reply(terminated: bool) -> Vec<u8> {
    let reply = if terminated { REPLY_TRUE } else { REPLY_FALSE };
    reply.to_vec()
}

/// Anything other than the literal `true` reads as "nothing in flight".
pub fn decode_reply(bytes: &[u8]) -> bool {
    bytes.trim_ascii() == REPLY_TRUE
}

/// One incoming termination request awaiting its reply.
#[derive(Debug)]
pub struct TerminationCall {
    payload: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

impl TerminationCall {
    pub fn new(payload: Vec<u8>, reply: oneshot::Sender<Vec<u8>>) -> Self {
        Self { payload, reply }
    }

    pub fn request(&self) -> Result<TerminateRequest, ModelError> {
        TerminateRequest::decode(&self.payload)
    }

    /// Reply to the requester; a requester that stopped waiting is ignored.
    pub fn respond(self, terminated: bool) {
        let _ = self.reply.send(encode_reply(terminated));
    }
}

/// Request/reply channel carrying termination requests.
#[async_trait]
pub trait TerminationChannel: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TerminationCall>, CoreError>;

    /// Send a request and wait for the reply.
    ///
    /// A request nobody listens to resolves to `Ok(false)`.
    async fn request(&self, request: &TerminateRequest) -> Result<bool, CoreError>;

    async fn unsubscribe(&self) -> Result<(), CoreError>;
}
