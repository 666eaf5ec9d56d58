//! Semaphore-backed resource locks for concurrent workers.
//!
//! Permits are forgotten on acquire and re-added only on an explicit
//! release. A worker that is aborted while holding a resource therefore
//! leaves it owned, the same way a real deadlock leaks what it holds.

use crate::error::ModelError;
use crate::model::Resource;
use crate::report::LeakedResource;
use stalemate_env::{ProcessId, ResourceId};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;

/// One resource shared by concurrent workers.
#[derive(Debug)]
pub struct ResourceLock {
    name: String,
    permits: Semaphore,
    holders: Mutex<Vec<ProcessId>>,
}

impl ResourceLock {
    pub fn new(resource: &Resource) -> Self {
        let capacity = usize::try_from(resource.capacity).unwrap_or(0);
        Self {
            name: resource.name.clone(),
            permits: Semaphore::new(capacity),
            holders: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn holders_guard(&self) -> MutexGuard<'_, Vec<ProcessId>> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits without bound for one unit.
    pub async fn acquire(&self, pid: ProcessId) -> Result<(), ModelError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ModelError::ResourceClosed(self.name.clone()))?;
        permit.forget();
        self.holders_guard().push(pid);
        Ok(())
    }

    /// Waits at most `timeout` for one unit.
    ///
    /// # Returns
    /// * `Ok(true)` - Unit acquired
    /// * `Ok(false)` - Timed out, nothing acquired
    pub async fn acquire_timeout(&self, pid: ProcessId, timeout: Duration) -> Result<bool, ModelError> {
        match tokio::time::timeout(timeout, self.acquire(pid)).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Ok(false),
        }
    }

    /// Returns one unit held by `pid`. Returns false if `pid` held none.
    pub fn release(&self, pid: ProcessId) -> bool {
        let mut holders = self.holders_guard();
        match holders.iter().position(|&p| p == pid) {
            Some(pos) => {
                holders.remove(pos);
                self.permits.add_permits(1);
                true
            }
            None => false,
        }
    }

    pub fn holders(&self) -> Vec<ProcessId> {
        self.holders_guard().clone()
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// All resource locks of a concurrent run, indexed by resource ordinal.
#[derive(Debug)]
pub struct LockTable {
    locks: Vec<ResourceLock>,
}

impl LockTable {
    pub fn new(resources: &[Resource]) -> Self {
        Self {
            locks: resources.iter().map(ResourceLock::new).collect(),
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&ResourceLock> {
        self.locks.get(id.index())
    }

    /// Looks up a lock, failing for unknown ids.
    pub fn lock(&self, id: ResourceId) -> Result<&ResourceLock, ModelError> {
        self.get(id).ok_or_else(|| ModelError::UnknownResource(id.to_string()))
    }

    /// Every (resource, holder) pair still owned.
    pub fn leaked(&self) -> Vec<LeakedResource> {
        self.locks
            .iter()
            .flat_map(|lock| {
                lock.holders().into_iter().map(move |holder| LeakedResource {
                    resource: lock.name.clone(),
                    holder: holder.to_string(),
                })
            })
            .collect()
    }
}
