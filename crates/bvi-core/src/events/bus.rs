use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::error;

use super::Event;

/// Receives scheduler events synchronously on the emitting task; keep it cheap.
pub trait Subscribe: Send + Sync {
    fn on_event(&self, event: &Event);

    fn name(&self) -> &'static str;
}

/// Fan-out to every subscriber; a panicking subscriber is logged and skipped.
#[derive(Clone, Default)]
pub struct Subscribers {
    list: Vec<Arc<dyn Subscribe>>,
}

impl Subscribers {
    pub fn new(list: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { list }
    }

    pub fn push(&mut self, subscriber: Arc<dyn Subscribe>) {
        self.list.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn emit(&self, event: Event) {
        for subscriber in &self.list {
            let delivered = catch_unwind(AssertUnwindSafe(|| subscriber.on_event(&event)));
            if delivered.is_err() {
                error!(
                    subscriber = subscriber.name(),
                    kind = ?event.kind,
                    "subscriber panicked while processing an event"
                );
            }
        }
    }
}
