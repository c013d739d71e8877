//! Observadores independentes do ciclo de vida das análises.
//!
//! Cada observador é um modelo de estado puro alimentado pelo
//! [`EventBus`]; nenhum conhece o launcher ou o watcher.

mod badges;
mod notifications;
mod tracker;

use std::sync::{Arc, Mutex};

pub use badges::{Badge, StatusBadges};
pub use notifications::{Notification, NotificationCenter, NotificationKind};
pub use tracker::{ProgressTracker, TrackedAnalysis};

use crate::events::{EventBus, LifecycleEvent, Subscription};

pub trait Observer {
    /// Filter applied by the bus before `handle` is called.
    fn interested(event: &LifecycleEvent) -> bool;

    fn handle(&mut self, event: &LifecycleEvent);
}

/// Subscribe a shared observer to `bus`.
pub fn attach<O>(bus: &EventBus, observer: &Arc<Mutex<O>>) -> Subscription
where
    O: Observer + Send + 'static,
{
    let observer = Arc::clone(observer);
    bus.subscribe(O::interested, move |event| {
        observer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .handle(event)
    })
}
