//! Registro de análises em andamento.
//!
//! O [`JobRegistry`] garante no máximo um lançamento em voo por
//! [`JobKey`]. Cada operação é um único passo sob o mutex, sem `await`
//! no meio, então o check-and-set de [`JobRegistry::reserve`] é atômico
//! para qualquer chamador.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::status::JobKey;

/// Process- or session-scoped set of in-flight job keys.
#[derive(Debug, Default)]
pub struct JobRegistry {
    in_flight: Mutex<HashSet<JobKey>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<JobKey>> {
        // The set stays consistent even if a holder panicked: every
        // critical section is a single insert/remove/clear.
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks `key` in-flight. Returns `false` if it already was.
    pub fn reserve(&self, key: &JobKey) -> bool {
        let inserted = self.lock().insert(key.clone());
        debug!(numero = %key, inserted, "reserve");
        inserted
    }

    /// Removes the in-flight mark. Releasing a key that is not held is a no-op.
    pub fn release(&self, key: &JobKey) {
        let removed = self.lock().remove(key);
        debug!(numero = %key, removed, "release");
    }

    pub fn is_held(&self, key: &JobKey) -> bool {
        self.lock().contains(key)
    }

    /// Drops every reservation (session teardown).
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Snapshot of the keys currently in flight, sorted.
    pub fn in_flight(&self) -> Vec<JobKey> {
        let mut keys: Vec<JobKey> = self.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Like [`reserve`](Self::reserve) but hands back a guard that releases
    /// the key when dropped, whichever way the owning code exits.
    pub fn try_reserve(self: &Arc<Self>, key: &JobKey) -> Option<Reservation> {
        self.reserve(key).then(|| Reservation {
            registry: Arc::clone(self),
            key: key.clone(),
        })
    }
}

/// A held reservation. Dropping it releases the key.
#[derive(Debug)]
pub struct Reservation {
    registry: Arc<JobRegistry>,
    key: JobKey,
}

impl Reservation {
    pub fn key(&self) -> &JobKey {
        &self.key
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_is_exclusive_until_release() {
        let registry = JobRegistry::new();
        let key = JobKey::new("X");

        assert!(registry.reserve(&key));
        assert!(!registry.reserve(&key));
        assert!(registry.is_held(&key));

        registry.release(&key);
        assert!(!registry.is_held(&key));
        assert!(registry.reserve(&key));
    }

    #[test]
    fn release_is_idempotent() {
        let registry = JobRegistry::new();
        let key = JobKey::new("X");
        registry.reserve(&key);

        registry.release(&key);
        registry.release(&key);
        assert!(!registry.is_held(&key));

        registry.release(&JobKey::new("never-held"));
    }

    #[test]
    fn clear_drops_everything() {
        let registry = JobRegistry::new();
        registry.reserve(&JobKey::new("b"));
        registry.reserve(&JobKey::new("a"));
        assert_eq!(registry.in_flight(), vec![JobKey::new("a"), JobKey::new("b")]);

        registry.clear();
        assert!(registry.in_flight().is_empty());
    }

    #[test]
    fn reservation_guard_releases_on_drop() {
        let registry = Arc::new(JobRegistry::new());
        let key = JobKey::new("X");

        let guard = registry.try_reserve(&key).unwrap();
        assert!(registry.try_reserve(&key).is_none());
        drop(guard);

        assert!(!registry.is_held(&key));
    }

    #[test]
    fn reservation_guard_releases_on_panic() {
        let registry = Arc::new(JobRegistry::new());
        let key = JobKey::new("X");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.try_reserve(&key).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!registry.is_held(&key));
    }

    #[test]
    fn concurrent_reserve_has_exactly_one_winner() {
        let registry = Arc::new(JobRegistry::new());
        let key = JobKey::new("X");
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.reserve(&key)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
