use chrono::{DateTime, Utc};

use super::Observer;
use crate::events::{EventKind, LifecycleEvent};
use crate::registry::JobRegistry;
use crate::status::{BiddingRecord, JobKey};

/// Typical duration of a full analysis, used for the progress estimate.
const ESTIMATED_DURATION_SECS: f64 = 180.0;
const MAX_ESTIMATE: f64 = 95.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAnalysis {
    pub record: BiddingRecord,
    pub started_at: DateTime<Utc>,
}

impl TrackedAnalysis {
    /// Estimated percentage, capped at 95 until the job actually settles.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        (elapsed / ESTIMATED_DURATION_SECS * 100.0).min(MAX_ESTIMATE)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> &'static str {
        match self.progress(now) {
            p if p < 30.0 => "Processando documentos...",
            p if p < 60.0 => "Analisando estratégia...",
            p if p < 85.0 => "Verificando requisitos...",
            _ => "Finalizando relatório...",
        }
    }

    /// Elapsed time as `m:ss`.
    pub fn elapsed_label(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.started_at).num_seconds().max(0);
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

/// Floating multi-job progress panel.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    running: Vec<TrackedAnalysis>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> &[TrackedAnalysis] {
        &self.running
    }

    pub fn get(&self, key: &JobKey) -> Option<&TrackedAnalysis> {
        self.running.iter().find(|a| a.record.key() == key)
    }

    /// Drop entries the registry no longer holds (re-derive on mount).
    pub fn sync_with(&mut self, registry: &JobRegistry) {
        self.running.retain(|a| registry.is_held(a.record.key()));
    }

    fn remove(&mut self, key: &JobKey) {
        self.running.retain(|a| a.record.key() != key);
    }
}

impl Observer for ProgressTracker {
    fn interested(event: &LifecycleEvent) -> bool {
        matches!(
            event.kind,
            EventKind::Started
                | EventKind::Finished
                | EventKind::Failed
                | EventKind::Navigate
                | EventKind::InProgress
        )
    }

    fn handle(&mut self, event: &LifecycleEvent) {
        let key = event.job.key();
        self.remove(key);
        if event.kind == EventKind::Started {
            self.running.push(TrackedAnalysis {
                record: event.job.clone(),
                started_at: event.timestamp,
            });
        }
    }
}
