//! Global admission limit for item-detail pages
//!
//! The gate owns the single `items_enqueued` counter. Every newly enqueued
//! item-detail task goes through [`AdmissionGate::admit`], which performs
//! the limit check, the frontier insertion and the increment under one lock
//! so concurrent workers never push the counter past `max_items`.
//!
//! The counter survives restarts through the checkpoint store under
//! [`CHECKPOINT_KEY`].

use crate::storage::{CheckpointStore, StorageError, StorageResult};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Checkpoint key holding the admission counter
pub const CHECKPOINT_KEY: &str = "detailsEnqueued";

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The task was new and has been counted
    Admitted,

    /// The frontier already knew the URL; nothing was counted
    Duplicate,

    /// The limit is reached; nothing was enqueued
    Denied,
}

/// Serialized admission counter with an optional upper bound
#[derive(Debug)]
pub struct AdmissionGate {
    max_items: Option<u64>,
    items_enqueued: Mutex<u64>,
}

impl AdmissionGate {
    /// Creates a gate starting from `start` admissions
    pub fn new(max_items: Option<u64>, start: u64) -> Self {
        Self {
            max_items,
            items_enqueued: Mutex::new(start),
        }
    }

    /// Creates a gate seeded from the checkpoint store
    ///
    /// An absent checkpoint starts the counter at zero.
    pub fn restore<S: CheckpointStore + ?Sized>(
        max_items: Option<u64>,
        store: &S,
    ) -> StorageResult<Self> {
        let start = match store.get_value(CHECKPOINT_KEY)? {
            None => 0,
            Some(value) => value.as_u64().ok_or_else(|| {
                StorageError::Serialization(format!(
                    "checkpoint '{}' is not a non-negative integer: {}",
                    CHECKPOINT_KEY, value
                ))
            })?,
        };

        if start > 0 {
            tracing::info!("Restored {} item admissions from checkpoint", start);
        }

        Ok(Self::new(max_items, start))
    }

    /// Returns true while another item-detail page may be admitted
    pub fn admitted(&self) -> bool {
        Self::below_limit(self.max_items, *self.counter())
    }

    /// Counts one admission
    pub fn record_admission(&self) {
        *self.counter() += 1;
    }

    pub fn items_enqueued(&self) -> u64 {
        *self.counter()
    }

    /// Runs `enqueue` if the limit allows it, counting the task when it was new
    ///
    /// `enqueue` reports whether the frontier added the task. The gate stays
    /// locked until the counter is updated.
    pub fn admit<E>(&self, enqueue: impl FnOnce() -> Result<bool, E>) -> Result<Admission, E> {
        let mut count = self.counter();
        if !Self::below_limit(self.max_items, *count) {
            return Ok(Admission::Denied);
        }

        if enqueue()? {
            *count += 1;
            Ok(Admission::Admitted)
        } else {
            Ok(Admission::Duplicate)
        }
    }

    /// Writes the current counter to the checkpoint store
    pub fn flush<S: CheckpointStore + ?Sized>(&self, store: &Mutex<S>) -> StorageResult<()> {
        let count = self.items_enqueued();
        let mut store = store
            .lock()
            .map_err(|e| StorageError::Database(format!("Failed to lock storage: {}", e)))?;
        store.set_value(CHECKPOINT_KEY, &serde_json::Value::from(count))?;

        tracing::debug!("Checkpointed {} item admissions", count);
        Ok(())
    }

    fn below_limit(max_items: Option<u64>, count: u64) -> bool {
        max_items.map_or(true, |max| count < max)
    }

    fn counter(&self) -> MutexGuard<'_, u64> {
        self.items_enqueued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
