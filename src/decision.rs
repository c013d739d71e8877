//! Decisões do usuário sobre uma licitação (aprovar, recusar, analisar).
//!
//! A transição é validada pelo [`StatusGraph`] e só é aplicada ao registro
//! local depois que o backend confirma a escrita. Nada é otimista.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::api::{ApiError, RecordStore};
use crate::events::{EventBus, EventKind, LifecycleEvent};
use crate::status::{Action, BiddingRecord, Status, StatusGraph};

/// Result of asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Applied { from: Status, to: Status },
    /// The action is not legal from the current status; nothing was written.
    Unchanged(Status),
}

pub struct StatusDecider<R> {
    store: Arc<R>,
    bus: Arc<EventBus>,
}

impl<R: RecordStore> StatusDecider<R> {
    pub fn new(store: Arc<R>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub async fn apply(
        &self,
        record: &mut BiddingRecord,
        action: Action,
    ) -> Result<Decision, ApiError> {
        let from = record.status;
        let to = StatusGraph::next_status(from, action);
        if to == from {
            debug!(numero = %record.key(), %from, %action, "ação sem efeito");
            return Ok(Decision::Unchanged(from));
        }

        self.store
            .update_status(record.key(), record.tenant(), to)
            .await?;

        record.status = to;
        record.data_atualizacao = Utc::now();
        info!(numero = %record.key(), %from, %to, "status atualizado");
        self.bus.publish(LifecycleEvent::new(
            EventKind::StatusUpdated { from, to },
            record.clone(),
        ));
        Ok(Decision::Applied { from, to })
    }

    pub async fn approve(&self, record: &mut BiddingRecord) -> Result<Decision, ApiError> {
        self.apply(record, Action::Approve).await
    }

    pub async fn reject(&self, record: &mut BiddingRecord) -> Result<Decision, ApiError> {
        self.apply(record, Action::Reject).await
    }
}
