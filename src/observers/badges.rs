use std::collections::HashMap;

use super::Observer;
use crate::events::{EventKind, LifecycleEvent};
use crate::status::{Action, BiddingRecord, JobKey, Status, StatusGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub status: Status,
    pub running: bool,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        self.status.label()
    }

    /// Whether the "analisar" control should be enabled.
    pub fn can_start_analysis(&self) -> bool {
        !self.running && StatusGraph::can_start_analysis(self.status)
    }
}

/// Per-record status badges derived from lifecycle events.
#[derive(Debug, Default)]
pub struct StatusBadges {
    badges: HashMap<JobKey, Badge>,
}

impl StatusBadges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the authoritative record list.
    pub fn seed<'a>(&mut self, records: impl IntoIterator<Item = &'a BiddingRecord>) {
        for record in records {
            self.badges.insert(
                record.key().clone(),
                Badge {
                    status: record.status,
                    running: StatusGraph::is_analysis_in_progress(record.status),
                },
            );
        }
    }

    pub fn get(&self, key: &JobKey) -> Option<Badge> {
        self.badges.get(key).copied()
    }
}

impl Observer for StatusBadges {
    fn interested(_event: &LifecycleEvent) -> bool {
        true
    }

    fn handle(&mut self, event: &LifecycleEvent) {
        let badge = self
            .badges
            .entry(event.job.key().clone())
            .or_insert(Badge {
                status: event.job.status,
                running: false,
            });

        match event.kind {
            EventKind::Started => {
                badge.status = StatusGraph::next_status(badge.status, Action::Analyze);
                badge.running = true;
            }
            EventKind::Finished => {
                if StatusGraph::can_transition(badge.status, Status::Analisado) {
                    badge.status = Status::Analisado;
                }
                badge.running = false;
            }
            EventKind::Failed | EventKind::Navigate | EventKind::InProgress => {
                badge.running = false;
            }
            EventKind::StatusUpdated { to, .. } => badge.status = to,
        }
    }
}
