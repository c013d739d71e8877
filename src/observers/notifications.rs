use chrono::{DateTime, Duration, Utc};

use super::Observer;
use crate::events::{EventKind, LifecycleEvent};
use crate::status::JobKey;

const MAX_NOTIFICATIONS: usize = 5;
const EXPIRY_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Started,
    /// Blocking informational modal: stays until acknowledged.
    InProgress,
    Finished,
    Failed,
}

impl NotificationKind {
    fn prefix(self) -> &'static str {
        match self {
            NotificationKind::Started => "iniciada",
            NotificationKind::InProgress => "andamento",
            NotificationKind::Finished => "finalizada",
            NotificationKind::Failed => "erro",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            NotificationKind::Started => "Análise Iniciada",
            NotificationKind::InProgress => "Análise em Andamento",
            NotificationKind::Finished => "Análise Finalizada",
            NotificationKind::Failed => "Erro na Análise",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub numero: JobKey,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dismissible: bool,
}

/// Toast/notification feed, newest first, capped at five entries.
///
/// `navigate` and status updates never produce a notification.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    notifications: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Remove one notification (dismiss or acknowledge).
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }

    /// Drop dismissible notifications older than 30 s. Blocking ones stay.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(EXPIRY_SECS);
        self.notifications
            .retain(|n| !n.dismissible || n.created_at > cutoff);
    }

    fn push(&mut self, kind: NotificationKind, event: &LifecycleEvent) {
        let numero = event.job.key().clone();
        if matches!(kind, NotificationKind::Finished | NotificationKind::Failed) {
            // Settled: the earlier progress notifications for this record are stale.
            self.notifications.retain(|n| {
                n.numero != numero
                    || matches!(n.kind, NotificationKind::Finished | NotificationKind::Failed)
            });
        }
        let notification = Notification {
            id: format!(
                "{}_{}_{}",
                kind.prefix(),
                numero,
                event.timestamp.timestamp_millis()
            ),
            kind,
            numero,
            message: event.detail.clone().filter(|_| kind == NotificationKind::Failed),
            created_at: event.timestamp,
            dismissible: kind != NotificationKind::InProgress,
        };
        self.notifications.insert(0, notification);
        self.notifications.truncate(MAX_NOTIFICATIONS);
    }
}

impl Observer for NotificationCenter {
    fn interested(event: &LifecycleEvent) -> bool {
        matches!(
            event.kind,
            EventKind::Started | EventKind::InProgress | EventKind::Finished | EventKind::Failed
        )
    }

    fn handle(&mut self, event: &LifecycleEvent) {
        let kind = match event.kind {
            EventKind::Started => NotificationKind::Started,
            EventKind::InProgress => NotificationKind::InProgress,
            EventKind::Finished => NotificationKind::Finished,
            EventKind::Failed => NotificationKind::Failed,
            EventKind::Navigate | EventKind::StatusUpdated { .. } => return,
        };
        self.push(kind, event);
    }
}
