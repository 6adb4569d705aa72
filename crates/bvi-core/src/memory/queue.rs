use std::{
    collections::VecDeque,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bvi_model::Message;
use parking_lot::Mutex;
use tracing::warn;

use crate::{
    error::CoreError,
    ports::{Acker, Delivery, Queue},
};

#[derive(Default)]
struct Shared {
    ready: Mutex<VecDeque<Vec<u8>>>,
    acked: AtomicUsize,
}

/// FIFO queue of encoded payloads.
///
/// A fetched message that is dropped without acknowledgement goes back to the head of the queue.
pub struct MemoryQueue<M> {
    shared: Arc<Shared>,
    _message: PhantomData<fn() -> M>,
}

impl<M> MemoryQueue<M> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            _message: PhantomData,
        }
    }

    /// Messages waiting for a fetch.
    pub fn pending(&self) -> usize {
        self.shared.ready.lock().len()
    }

    /// Messages acknowledged so far.
    pub fn acked(&self) -> usize {
        self.shared.acked.load(Ordering::SeqCst)
    }

    /// Enqueue raw bytes, bypassing encoding.
    pub fn push_raw(&self, payload: Vec<u8>) {
        self.shared.ready.lock().push_back(payload);
    }
}

impl<M> Default for MemoryQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for MemoryQueue<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _message: PhantomData,
        }
    }
}

struct MemoryAcker {
    shared: Arc<Shared>,
    payload: Mutex<Option<Vec<u8>>>,
    acked: AtomicBool,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(&self) -> Result<(), CoreError> {
        if !self.acked.swap(true, Ordering::SeqCst) {
            self.payload.lock().take();
            self.shared.acked.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.lock().take() {
            self.shared.ready.lock().push_front(payload);
        }
    }
}

#[async_trait]
impl<M> Queue<M> for MemoryQueue<M>
where
    M: Message + Sync,
{
    async fn init(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn publish(&self, message: &M) -> Result<(), CoreError> {
        self.push_raw(message.payload()?);
        Ok(())
    }

    async fn fetch_one(&self) -> Result<Option<Delivery<M>>, CoreError> {
        loop {
            let Some(payload) = self.shared.ready.lock().pop_front() else {
                return Ok(None);
            };
            match M::decode(&payload) {
                Ok(message) => {
                    let acker = MemoryAcker {
                        shared: Arc::clone(&self.shared),
                        payload: Mutex::new(Some(payload)),
                        acked: AtomicBool::new(false),
                    };
                    return Ok(Some(Delivery::new(message, Box::new(acker))));
                }
                Err(e) => warn!(error = %e, "dropping undecodable message"),
            }
        }
    }

    async fn delete_consumer(&self) -> Result<(), CoreError> {
        Ok(())
    }
}
