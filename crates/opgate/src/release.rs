use opgate_bulkhead::BulkheadPermit;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Releases {
    pending: HashMap<u64, BulkheadPermit>,
    active: HashMap<u64, BulkheadPermit>,
}

/// Holds bulkhead permits between the gate and the end of an operation.
///
/// A permit enters the pending map when the gate takes it, moves to the
/// active map when the operation starts and is dropped (freeing the slot)
/// when the operation ends. Keys come from a counter, so operations sharing a
/// context never collide.
#[derive(Default)]
pub struct ReleaseTracker {
    next_id: AtomicU64,
    releases: Mutex<Releases>,
}

impl ReleaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `permit` as pending and returns its key.
    pub fn track(&self, permit: BulkheadPermit) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().pending.insert(id, permit);
        id
    }

    /// Moves a pending permit to active. Returns false if `id` was not pending.
    pub fn activate(&self, id: u64) -> bool {
        let mut releases = self.lock();
        match releases.pending.remove(&id) {
            Some(permit) => {
                releases.active.insert(id, permit);
                true
            }
            None => false,
        }
    }

    /// Frees the slot held under `id`, active or still pending.
    ///
    /// Returns false if there was nothing to free, which makes repeated
    /// releases harmless.
    pub fn release(&self, id: u64) -> bool {
        let permit = {
            let mut releases = self.lock();
            releases
                .active
                .remove(&id)
                .or_else(|| releases.pending.remove(&id))
        };
        // Dropped outside the lock; listeners run on release.
        match permit {
            Some(permit) => {
                permit.release();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn active(&self) -> usize {
        self.lock().active.len()
    }

    /// Permits not yet released.
    pub fn outstanding(&self) -> usize {
        let releases = self.lock();
        releases.pending.len() + releases.active.len()
    }

    fn lock(&self) -> MutexGuard<'_, Releases> {
        self.releases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ReleaseTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let releases = self.lock();
        f.debug_struct("ReleaseTracker")
            .field("pending", &releases.pending.len())
            .field("active", &releases.active.len())
            .finish()
    }
}
