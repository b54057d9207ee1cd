//! Center-wide exclusive scheduling lock.
//!
//! At most one job holds the lock at a time. Holding it is represented by a
//! [`SchedulingGuard`]: dropping the guard releases the lock, so a run that
//! panics or bails out early cannot leave the center stuck.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::models::JobId;

#[derive(Clone, Default)]
pub struct SchedulingLock {
    holder: Arc<Mutex<Option<JobId>>>,
}

/// Proof that `job` holds the lock. Releases it on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SchedulingGuard {
    holder: Arc<Mutex<Option<JobId>>>,
    job: JobId,
}

impl SchedulingLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `job`.
    ///
    /// # Errors
    /// The id of the job currently holding it.
    pub fn try_acquire(&self, job: JobId) -> Result<SchedulingGuard, JobId> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) => Err(current),
            None => {
                *holder = Some(job);
                Ok(SchedulingGuard {
                    holder: Arc::clone(&self.holder),
                    job,
                })
            }
        }
    }

    pub fn holder(&self) -> Option<JobId> {
        *self.holder.lock()
    }

    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }

    /// Release the lock if `job` holds it, without its guard.
    ///
    /// The guard still owned elsewhere becomes inert.
    pub fn force_release(&self, job: JobId) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(job) {
            *holder = None;
            true
        } else {
            false
        }
    }
}

impl SchedulingGuard {
    pub fn job(&self) -> JobId {
        self.job
    }
}

impl Drop for SchedulingGuard {
    fn drop(&mut self) {
        let mut holder = self.holder.lock();
        if *holder == Some(self.job) {
            *holder = None;
            log::debug!("Scheduling lock released by job {}", self.job);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive() {
        let lock = SchedulingLock::new();
        let a = JobId::generate();
        let b = JobId::generate();
        let guard = lock.try_acquire(a).unwrap();
        assert_eq!(lock.try_acquire(b).err(), Some(a));
        assert_eq!(lock.holder(), Some(a));
        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire(b).is_ok());
    }

    #[test]
    fn test_released_on_panic() {
        let lock = SchedulingLock::new();
        let job = JobId::generate();
        let cloned = lock.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.try_acquire(job).unwrap();
            panic!("run crashed");
        }));
        assert!(result.is_err());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_force_release_makes_stale_guard_inert() {
        let lock = SchedulingLock::new();
        let a = JobId::generate();
        let b = JobId::generate();
        let stale = lock.try_acquire(a).unwrap();
        assert!(!lock.force_release(b));
        assert!(lock.force_release(a));
        let _current = lock.try_acquire(b).unwrap();
        drop(stale);
        assert_eq!(lock.holder(), Some(b));
    }
}
