//! Lançamento de análises com deduplicação e classificação de resultado.
//!
//! Cada tentativa passa por [`JobRegistry`], chama o backend e termina em
//! exatamente um [`Outcome`], publicando exatamente um evento final no
//! [`EventBus`]. A reserva é liberada antes da publicação final, em
//! qualquer caminho (inclusive cancelamento da future).

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::{AnalysisApi, AnalysisPayload, ApiError};
use crate::events::{EventBus, EventKind, LifecycleEvent};
use crate::registry::{JobRegistry, Reservation};
use crate::status::{BiddingRecord, JobKey, Tenant};

/// Classified result of one launch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Accepted and running in the background.
    Started,
    /// The analysis result already exists (HTTP 409); treated as success.
    AlreadyExists,
    /// Another actor holds the server-side lock (HTTP 423).
    InProgressElsewhere,
    Finished(AnalysisPayload),
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Finished(_) | Outcome::AlreadyExists)
    }

    /// The event that announces this outcome. `Started` is announced when
    /// the reservation is taken, so it has none here.
    pub fn terminal_event(&self, job: &BiddingRecord) -> Option<LifecycleEvent> {
        let event = match self {
            Outcome::Started => return None,
            Outcome::Finished(payload) => {
                let event = LifecycleEvent::new(EventKind::Finished, job.clone());
                match payload.notification() {
                    Some(notification) => event.with_detail(notification.to_string()),
                    None => event,
                }
            }
            Outcome::AlreadyExists => LifecycleEvent::new(EventKind::Navigate, job.clone()),
            Outcome::InProgressElsewhere => LifecycleEvent::new(EventKind::InProgress, job.clone()),
            Outcome::Failed(reason) => {
                LifecycleEvent::new(EventKind::Failed, job.clone()).with_detail(reason.clone())
            }
        };
        Some(event)
    }
}

impl From<Result<AnalysisPayload, ApiError>> for Outcome {
    fn from(result: Result<AnalysisPayload, ApiError>) -> Self {
        match result {
            Ok(payload) => Outcome::Finished(payload),
            Err(ApiError::AlreadyExists) => Outcome::AlreadyExists,
            Err(ApiError::InProgress) => Outcome::InProgressElsewhere,
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }
}

/// Failure detail of an attempt that ended without an outcome.
pub const CANCELLED_REASON: &str = "análise cancelada";

type RefreshFn = dyn Fn() + Send + Sync;

/// Runs analysis launches end to end.
pub struct AnalysisLauncher<C> {
    client: Arc<C>,
    registry: Arc<JobRegistry>,
    bus: Arc<EventBus>,
    on_refresh: Option<Arc<RefreshFn>>,
}

impl<C> Clone for AnalysisLauncher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            bus: Arc::clone(&self.bus),
            on_refresh: self.on_refresh.clone(),
        }
    }
}

impl<C: AnalysisApi> AnalysisLauncher<C> {
    pub fn new(client: Arc<C>, registry: Arc<JobRegistry>, bus: Arc<EventBus>) -> Self {
        Self {
            client,
            registry,
            bus,
            on_refresh: None,
        }
    }

    /// Called after every `Finished` outcome, typically to reload the record list.
    pub fn with_refresh<F>(mut self, refresh: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_refresh = Some(Arc::new(refresh));
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn is_in_flight(&self, key: &JobKey) -> bool {
        self.registry.is_held(key)
    }

    /// Run one attempt and wait for its outcome.
    ///
    /// Returns `None` without publishing anything when another attempt for
    /// the same key is already in flight.
    pub async fn launch(&self, job: &BiddingRecord, tenant: &Tenant) -> Option<Outcome> {
        let reservation = self.begin(job)?;
        Some(self.complete(reservation, job, tenant).await)
    }

    /// Reserve and publish `started` now, finish the attempt on a spawned task.
    ///
    /// Returns `Some(Outcome::Started)` when the attempt was accepted. The
    /// terminal outcome is only observable through the event bus.
    pub fn launch_in_background(&self, job: BiddingRecord, tenant: Tenant) -> Option<Outcome>
    where
        C: 'static,
    {
        let reservation = self.begin(&job)?;
        let launcher = self.clone();
        tokio::spawn(async move {
            launcher.complete(reservation, &job, &tenant).await;
        });
        Some(Outcome::Started)
    }

    fn begin(&self, job: &BiddingRecord) -> Option<Reservation> {
        let Some(reservation) = self.registry.try_reserve(job.key()) else {
            info!(numero = %job.key(), "análise já em andamento, ignorando");
            return None;
        };
        info!(numero = %job.key(), "análise iniciada");
        self.bus
            .publish(LifecycleEvent::new(EventKind::Started, job.clone()));
        Some(reservation)
    }

    async fn complete(
        &self,
        reservation: Reservation,
        job: &BiddingRecord,
        tenant: &Tenant,
    ) -> Outcome {
        let attempt = Attempt {
            bus: &self.bus,
            job,
            reservation: Some(reservation),
        };
        if job.tenant() != tenant {
            warn!(
                numero = %job.key(),
                registro = %job.tenant(),
                empresa = %tenant,
                "empresa diferente da registrada"
            );
        }
        let outcome = Outcome::from(self.client.start_analysis(job.key(), tenant).await);

        match &outcome {
            Outcome::Finished(_) => info!(numero = %job.key(), "análise concluída"),
            Outcome::AlreadyExists => {
                info!(numero = %job.key(), "análise já existe, navegando para resultados")
            }
            Outcome::InProgressElsewhere => {
                info!(numero = %job.key(), "análise em andamento em outra sessão")
            }
            Outcome::Failed(reason) => error!(numero = %job.key(), %reason, "falha na análise"),
            Outcome::Started => {}
        }
        attempt.settle(&outcome);

        if let (Outcome::Finished(_), Some(refresh)) = (&outcome, &self.on_refresh) {
            refresh();
        }
        outcome
    }
}

/// One running attempt. Owns the reservation and publishes the terminal
/// event exactly once: from `settle`, or as `failed` when dropped unsettled
/// (future cancelled or client panicked).
struct Attempt<'a> {
    bus: &'a EventBus,
    job: &'a BiddingRecord,
    reservation: Option<Reservation>,
}

impl Attempt<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.reservation.take();
        if let Some(event) = outcome.terminal_event(self.job) {
            self.bus.publish(event);
        }
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        drop(reservation);
        warn!(numero = %self.job.key(), "análise interrompida antes do resultado");
        self.bus.publish(
            LifecycleEvent::new(EventKind::Failed, self.job.clone())
                .with_detail(CANCELLED_REASON),
        );
    }
}
