//! Non-blocking admission counters.
//!
//! Callers poll [`AdmissionLimiter::available`] and back off themselves; nothing here waits.

mod category;
pub use category::CategoryLimiters;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Slots {
    capacity: usize,
    running: usize,
}

/// Bounded counter of admitted work units.
///
/// `running <= capacity` holds after every [`reserve`](Self::reserve); a capacity lowered by
/// [`tune`](Self::tune) may leave `running` above it until enough units are released.
#[derive(Debug)]
pub struct AdmissionLimiter {
    slots: Mutex<Slots>,
}

impl AdmissionLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                capacity,
                running: 0,
            }),
        }
    }

    /// Take `delta` units, all or nothing.
    pub fn reserve(&self, delta: usize) -> bool {
        let mut slots = self.slots.lock();
        match slots.running.checked_add(delta) {
            Some(next) if next <= slots.capacity => {
                slots.running = next;
                true
            }
            _ => false,
        }
    }

    /// Give back one unit; never goes below zero.
    pub fn release(&self) {
        let mut slots = self.slots.lock();
        slots.running = slots.running.saturating_sub(1);
    }

    /// Replace the capacity. Running units are kept.
    pub fn tune(&self, capacity: usize) {
        self.slots.lock().capacity = capacity;
    }

    #[inline]
    pub fn available(&self) -> bool {
        let slots = self.slots.lock();
        slots.running < slots.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity
    }

    #[inline]
    pub fn running(&self) -> usize {
        self.slots.lock().running
    }

    /// `(capacity, running)` read under one lock.
    pub fn snapshot(&self) -> (usize, usize) {
        let slots = self.slots.lock();
        (slots.capacity, slots.running)
    }
}
