//! One-at-a-time execution guard

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits a single holder at a time; later callers are turned away
#[derive(Debug, Clone)]
pub struct OneAtATime {
    semaphore: Arc<Semaphore>,
}

impl Default for OneAtATime {
    fn default() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }
}

impl OneAtATime {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another [`RunGuard`] is alive
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| RunGuard { _permit: permit })
    }

    pub fn is_running(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

/// Holds the single permit; dropping it lets the next run in
#[derive(Debug)]
pub struct RunGuard {
    _permit: OwnedSemaphorePermit,
}
