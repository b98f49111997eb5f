//! In-memory connector for tests.
//!
//! [`MemoryConnector`] opens nothing. It counts lifecycle calls and can be
//! told to fail the next establish or verify, which is enough to drive the
//! applier and request hooks without a database.

use crate::connection::{ConnectionTarget, Connector};
use crate::error::{ConfigError, ConfigResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Pool handed out by [`MemoryConnector`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPool {
    /// Sequence number of the establish call that produced this pool.
    pub id: u64,
    /// What the pool was opened for.
    pub target: Arc<ConnectionTarget>,
}

/// Connector that records calls instead of connecting.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    next_id: AtomicU64,
    established: AtomicUsize,
    verified: AtomicUsize,
    released: AtomicUsize,
    closed: AtomicUsize,
    fail_establish: AtomicBool,
    fail_verify: AtomicBool,
    targets: Mutex<Vec<ConnectionTarget>>,
}

impl MemoryConnector {
    /// Create a connector with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `establish` fail.
    pub fn fail_next_establish(&self) {
        self.fail_establish.store(true, Ordering::SeqCst);
    }

    /// Make the next `verify` fail.
    pub fn fail_next_verify(&self) {
        self.fail_verify.store(true, Ordering::SeqCst);
    }

    /// Successful `establish` calls.
    pub fn established(&self) -> usize {
        self.established.load(Ordering::SeqCst)
    }

    /// `verify` calls, failed or not.
    pub fn verified(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }

    /// `release` calls.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// `close` calls.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pools established and not yet closed.
    pub fn open_pools(&self) -> usize {
        self.established() - self.closed()
    }

    /// Every target passed to a successful `establish`, oldest first.
    pub fn targets(&self) -> Vec<ConnectionTarget> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Pool = MemoryPool;

    async fn establish(&self, target: &ConnectionTarget) -> ConfigResult<MemoryPool> {
        if self.fail_establish.swap(false, Ordering::SeqCst) {
            return Err(ConfigError::establish("connection refused"));
        }
        if target.adapter().is_none() {
            return Err(ConfigError::establish(format!(
                "database configuration for '{}' does not specify an adapter",
                target.environment
            )));
        }

        self.established.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().push(target.clone());
        Ok(MemoryPool {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            target: Arc::new(target.clone()),
        })
    }

    async fn verify(&self, _pool: &MemoryPool) -> ConfigResult<()> {
        self.verified.fetch_add(1, Ordering::SeqCst);
        if self.fail_verify.swap(false, Ordering::SeqCst) {
            return Err(ConfigError::establish("connection lost"));
        }
        Ok(())
    }

    async fn release(&self, _pool: &MemoryPool) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self, _pool: MemoryPool) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
