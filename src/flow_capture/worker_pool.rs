//! Process-wide admission gate for calls against the log source.
//!
//! Every recorder holds a `WorkerSlot` for the duration of one tailing burst.
//! The slot returns its permit when dropped, so every exit path of a burst
//! (success, error, cancellation) releases it.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error_handling::types::RecorderError;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

/// A held pool slot. Released on drop.
#[derive(Debug)]
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits until a slot is free.
    pub async fn acquire(&self) -> Result<WorkerSlot, RecorderError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RecorderError::PoolClosed)?;
        Ok(WorkerSlot { _permit: permit })
    }

    /// Wakes every waiter with `PoolClosed` and refuses later admissions;
    /// used at shutdown.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
