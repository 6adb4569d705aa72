use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bvi_model::{TaskId, TaskType};
use dashmap::{DashMap, mapref::entry::Entry};

use super::CancelToken;

/// Registry key: one per running Task, plus one per admitted cohort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CancelKey {
    Job { task_id: TaskId, task_type: TaskType },
    Cohort(TaskId),
}

impl CancelKey {
    pub fn job(task_id: impl Into<TaskId>, task_type: TaskType) -> Self {
        CancelKey::Job {
            task_id: task_id.into(),
            task_type,
        }
    }

    pub fn cohort(task_id: impl Into<TaskId>) -> Self {
        CancelKey::Cohort(task_id.into())
    }
}

/// Tokens of in-flight work, and termination tombstones for cohorts.
///
/// A tombstone marks a cohort that was asked to terminate; members that register after the
/// request check it and never start.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    tokens: DashMap<CancelKey, Arc<CancelToken>>,
    tombstones: DashMap<TaskId, Instant>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token previously stored under `key`, if any.
    pub fn register(&self, key: CancelKey, token: Arc<CancelToken>) -> Option<Arc<CancelToken>> {
        self.tokens.insert(key, token)
    }

    /// Store `token` only if `key` is free; returns whether it was stored.
    pub fn try_register(&self, key: CancelKey, token: Arc<CancelToken>) -> bool {
        match self.tokens.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(token);
                true
            }
        }
    }

    pub fn take(&self, key: &CancelKey) -> Option<Arc<CancelToken>> {
        self.tokens.remove(key).map(|(_, token)| token)
    }

    /// Remove `key` only while it still maps to `token`.
    pub fn remove_if_same(&self, key: &CancelKey, token: &Arc<CancelToken>) -> bool {
        self.tokens
            .remove_if(key, |_, current| Arc::ptr_eq(current, token))
            .is_some()
    }

    pub fn contains(&self, key: &CancelKey) -> bool {
        self.tokens.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tombstone(&self, task_id: &str) {
        self.tombstones.insert(task_id.to_string(), Instant::now());
    }

    pub fn is_tombstoned(&self, task_id: &str) -> bool {
        self.tombstones.contains_key(task_id)
    }

    /// Drop tombstones older than `ttl`; returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let before = self.tombstones.len();
        self.tombstones.retain(|_, at| at.elapsed() < ttl);
        before.saturating_sub(self.tombstones.len())
    }
}
