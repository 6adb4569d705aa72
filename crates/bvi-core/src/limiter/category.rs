use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;

use super::AdmissionLimiter;

/// Secondary limits keyed by category (source language).
///
/// Unknown keys are unrestricted: `reserve` succeeds and `release` is a no-op, so a release racing
/// with [`remove`](Self::remove) is harmless.
#[derive(Debug, Default)]
pub struct CategoryLimiters {
    limiters: DashMap<String, Arc<AdmissionLimiter>>,
}

impl CategoryLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_limits(limits: &HashMap<String, usize>) -> Self {
        let this = Self::new();
        for (key, capacity) in limits {
            this.add_limiter(key.clone(), *capacity);
        }
        this
    }

    /// Register a limiter, or retune it if the key already has one.
    pub fn add_limiter(&self, key: impl Into<String>, capacity: usize) {
        self.limiters
            .entry(key.into())
            .and_modify(|l| l.tune(capacity))
            .or_insert_with(|| Arc::new(AdmissionLimiter::new(capacity)));
    }

    pub fn remove(&self, key: &str) -> bool {
        self.limiters.remove(key).is_some()
    }

    pub fn tune(&self, key: &str, capacity: usize) -> bool {
        match self.get(key) {
            Some(limiter) => {
                limiter.tune(capacity);
                true
            }
            None => false,
        }
    }

    pub fn reserve(&self, key: &str) -> bool {
        self.get(key).is_none_or(|l| l.reserve(1))
    }

    pub fn release(&self, key: &str) {
        if let Some(limiter) = self.get(key) {
            limiter.release();
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<AdmissionLimiter>> {
        self.limiters.get(key).map(|l| Arc::clone(l.value()))
    }
}
