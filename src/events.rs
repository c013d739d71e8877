//! Barramento de eventos do ciclo de vida das análises.
//!
//! Desacopla quem publica (launcher, watcher, decisões de status) de quem
//! observa (central de notificações, rastreador de progresso, badges).
//! A entrega é síncrona e na ordem de inscrição; eventos publicados sem
//! inscritos são descartados.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::status::{BiddingRecord, Status};

/// What happened to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventKind {
    /// Launch accepted locally; the remote call is under way.
    Started,
    /// Another actor holds the server-side lock for this job.
    InProgress,
    Finished,
    Failed,
    /// The result already exists; observers should open it.
    Navigate,
    /// A validated status write succeeded.
    StatusUpdated {
        from: Status,
        to: Status,
    },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Finished | EventKind::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::InProgress => "in_progress",
            EventKind::Finished => "finished",
            EventKind::Failed => "failed",
            EventKind::Navigate => "navigate",
            EventKind::StatusUpdated { .. } => "status_updated",
        }
    }
}

/// Immutable record of one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: String,
    pub kind: EventKind,
    pub job: BiddingRecord,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, job: BiddingRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            job,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

type Predicate = dyn Fn(&LifecycleEvent) -> bool + Send + Sync;
type Handler = dyn Fn(&LifecycleEvent) + Send + Sync;

struct Subscriber {
    id: u64,
    active: AtomicBool,
    predicate: Box<Predicate>,
    handler: Box<Handler>,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe).
pub struct Subscription {
    subscriber: Arc<Subscriber>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.subscriber.id
    }

    /// Stops delivery to this handler. Safe to call from inside a handler,
    /// including the handler being removed; calling it twice is a no-op.
    pub fn unsubscribe(&self) {
        self.subscriber.active.store(false, Ordering::SeqCst);
    }
}

/// Topic-less publish/subscribe channel for [`LifecycleEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Subscriber>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for events accepted by `predicate`.
    pub fn subscribe<P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        P: Fn(&LifecycleEvent) -> bool + Send + Sync + 'static,
        H: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let subscriber = Arc::new(Subscriber {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        });
        let mut subscribers = self.lock();
        subscribers.retain(|s| s.active.load(Ordering::SeqCst));
        subscribers.push(Arc::clone(&subscriber));
        Subscription { subscriber }
    }

    pub fn subscribe_all<H>(&self, handler: H) -> Subscription
    where
        H: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribe(|_| true, handler)
    }

    /// Deliver `event` to every matching subscriber in registration order.
    ///
    /// The subscriber list is snapshotted before delivery, so handlers may
    /// subscribe, unsubscribe or publish re-entrantly. A panicking handler
    /// is logged and skipped; the remaining handlers still run.
    pub fn publish(&self, event: LifecycleEvent) {
        let snapshot: Vec<Arc<Subscriber>> = self.lock().clone();
        debug!(
            kind = event.kind.name(),
            numero = %event.job.key(),
            subscribers = snapshot.len(),
            "publish"
        );

        for subscriber in snapshot {
            if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                if (subscriber.predicate)(&event) {
                    (subscriber.handler)(&event);
                }
            }));
            if delivered.is_err() {
                error!(
                    subscriber = subscriber.id,
                    kind = event.kind.name(),
                    "event handler panicked"
                );
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|s| s.active.load(Ordering::SeqCst))
            .count()
    }
}
