//! Acompanhamento por polling de análises que não podem ser aguardadas
//! diretamente (fila do servidor, outra sessão processando).
//!
//! Cada `watch` recebe uma geração nova e um [`CancellationToken`]. Toda
//! resposta é conferida contra a geração vigente antes de qualquer efeito,
//! então uma resposta que chega depois de [`PollingWatcher::stop`] é
//! descartada mesmo que a requisição já estivesse em voo.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{PollState, StatusQueryApi, StatusReport};
use crate::events::{EventBus, EventKind, LifecycleEvent};
use crate::status::{BiddingRecord, JobKey};

const DEFAULT_ERROR_DETAIL: &str = "Erro na análise";

/// Polling cadence and error budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub interval: Duration,
    /// Consecutive transport failures tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_consecutive_errors: 3,
        }
    }
}

/// Observable state of one watched job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Polling {
        queue_position: Option<u32>,
        eta_minutes: Option<u32>,
    },
    Done,
    Error(String),
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Done | WatchState::Error(_))
    }
}

struct Watch {
    generation: u64,
    cancel: CancellationToken,
    state: WatchState,
}

struct Inner<S> {
    client: Arc<S>,
    bus: Arc<EventBus>,
    config: WatcherConfig,
    watches: Mutex<HashMap<JobKey, Watch>>,
    generation: AtomicU64,
}

impl<S> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, Watch>> {
        self.watches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `state` if `generation` still owns `key`. Returns whether it did.
    fn apply(&self, key: &JobKey, generation: u64, state: WatchState) -> bool {
        let mut watches = self.lock();
        match watches.get_mut(key) {
            Some(watch)
                if watch.generation == generation
                    && !watch.cancel.is_cancelled()
                    && !watch.state.is_terminal() =>
            {
                watch.state = state;
                true
            }
            _ => false,
        }
    }
}

/// Periodically queries job status until a terminal state or `stop`.
pub struct PollingWatcher<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for PollingWatcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StatusQueryApi + 'static> PollingWatcher<S> {
    pub fn new(client: Arc<S>, bus: Arc<EventBus>, config: WatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                bus,
                config,
                watches: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start polling `job`. The first query is issued immediately.
    ///
    /// Returns `false` if the job is already being polled. Watching a job
    /// whose previous watch ended starts a fresh one.
    pub fn watch(&self, job: BiddingRecord) -> bool {
        let key = job.key().clone();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        {
            let mut watches = self.inner.lock();
            if watches.get(&key).is_some_and(|w| !w.state.is_terminal()) {
                debug!(numero = %key, "já acompanhando");
                return false;
            }
            // Finished watches are only kept until the next watch starts.
            watches.retain(|_, w| !w.state.is_terminal());
            watches.insert(
                key.clone(),
                Watch {
                    generation,
                    cancel: cancel.clone(),
                    state: WatchState::Polling {
                        queue_position: None,
                        eta_minutes: None,
                    },
                },
            );
        }
        info!(numero = %key, generation, "acompanhamento iniciado");
        tokio::spawn(poll(Arc::clone(&self.inner), job, generation, cancel));
        true
    }

    /// Cancel polling for `key`. No tick runs after this returns, and a
    /// response already in flight is discarded when it lands.
    pub fn stop(&self, key: &JobKey) -> bool {
        let removed = self.inner.lock().remove(key);
        match removed {
            Some(watch) => {
                watch.cancel.cancel();
                info!(numero = %key, "acompanhamento interrompido");
                !watch.state.is_terminal()
            }
            None => false,
        }
    }

    /// Cancel every watch (session teardown).
    pub fn stop_all(&self) {
        for (_, watch) in self.inner.lock().drain() {
            watch.cancel.cancel();
        }
    }

    pub fn is_watching(&self, key: &JobKey) -> bool {
        self.inner
            .lock()
            .get(key)
            .is_some_and(|w| !w.state.is_terminal())
    }

    /// Last known state; `None` if never watched, stopped or forgotten.
    ///
    /// A terminal state stays readable until `forget`, `stop` or the next
    /// `watch` call.
    pub fn snapshot(&self, key: &JobKey) -> Option<WatchState> {
        self.inner.lock().get(key).map(|w| w.state.clone())
    }

    /// Drop the terminal state kept for `key`. Running watches are untouched.
    pub fn forget(&self, key: &JobKey) -> bool {
        let mut watches = self.inner.lock();
        if watches.get(key).is_some_and(|w| w.state.is_terminal()) {
            watches.remove(key);
            true
        } else {
            false
        }
    }
}

async fn poll<S: StatusQueryApi>(
    inner: Arc<Inner<S>>,
    job: BiddingRecord,
    generation: u64,
    cancel: CancellationToken,
) {
    let key = job.key().clone();
    let mut consecutive_errors = 0u32;

    loop {
        let result = inner.client.query_status(&key).await;

        let terminal = match result {
            Ok(StatusReport { status, queue_position, eta_minutes, error_detail }) => {
                consecutive_errors = 0;
                match status {
                    PollState::Pending | PollState::Processing => {
                        let state = WatchState::Polling { queue_position, eta_minutes };
                        if !inner.apply(&key, generation, state) {
                            debug!(numero = %key, generation, "resposta descartada");
                            return;
                        }
                        debug!(numero = %key, ?status, ?queue_position, "ainda processando");
                        None
                    }
                    PollState::Done => Some(WatchState::Done),
                    PollState::Error => Some(WatchState::Error(
                        error_detail.unwrap_or_else(|| DEFAULT_ERROR_DETAIL.to_string()),
                    )),
                }
            }
            Err(err) => {
                consecutive_errors += 1;
                warn!(
                    numero = %key,
                    attempt = consecutive_errors,
                    error = %err,
                    "falha ao consultar status"
                );
                (consecutive_errors >= inner.config.max_consecutive_errors)
                    .then(|| WatchState::Error(err.to_string()))
            }
        };

        if let Some(state) = terminal {
            if !inner.apply(&key, generation, state.clone()) {
                debug!(numero = %key, generation, "resultado final descartado");
                return;
            }
            let event = match state {
                WatchState::Error(detail) => {
                    LifecycleEvent::new(EventKind::Failed, job).with_detail(detail)
                }
                _ => LifecycleEvent::new(EventKind::Finished, job),
            };
            info!(numero = %key, kind = event.kind.name(), "acompanhamento concluído");
            inner.bus.publish(event);
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(inner.config.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::status::Status;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, mpsc};

    type Reply = Result<StatusReport, ApiError>;

    /// Scripted status endpoint. The call numbered `gate_call` (1-based)
    /// signals `entered` and then waits on `release`.
    struct MockStatus {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
        gate_call: Option<usize>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl MockStatus {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                gate_call: None,
                entered: Arc::new(Notify::new()),
                release: Arc::new(Notify::new()),
            }
        }

        fn gated_at(mut self, call: usize) -> Self {
            self.gate_call = Some(call);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusQueryApi for MockStatus {
        async fn query_status(&self, _key: &JobKey) -> Reply {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(report(PollState::Processing)));
            if self.gate_call == Some(call) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            reply
        }
    }

    fn report(status: PollState) -> StatusReport {
        StatusReport {
            status,
            queue_position: None,
            eta_minutes: None,
            error_detail: None,
        }
    }

    fn network_error() -> ApiError {
        ApiError::Http {
            status: 502,
            code: None,
            message: "Bad Gateway".into(),
        }
    }

    fn job() -> BiddingRecord {
        BiddingRecord::new("X", "12345678000190", Status::EmAnalise)
    }

    fn fast() -> WatcherConfig {
        WatcherConfig {
            interval: Duration::from_millis(5),
            max_consecutive_errors: 3,
        }
    }

    struct Harness {
        watcher: PollingWatcher<MockStatus>,
        client: Arc<MockStatus>,
        terminal: mpsc::UnboundedReceiver<LifecycleEvent>,
    }

    fn harness(client: MockStatus, config: WatcherConfig) -> Harness {
        let bus = Arc::new(EventBus::new());
        let (tx, terminal) = mpsc::unbounded_channel();
        bus.subscribe(
            |e| e.kind.is_terminal(),
            move |e| {
                let _ = tx.send(e.clone());
            },
        );
        let client = Arc::new(client);
        let watcher = PollingWatcher::new(Arc::clone(&client), bus, config);
        Harness {
            watcher,
            client,
            terminal,
        }
    }

    async fn next_terminal(h: &mut Harness) -> LifecycleEvent {
        tokio::time::timeout(Duration::from_secs(2), h.terminal.recv())
            .await
            .expect("no terminal event")
            .expect("bus closed")
    }

    #[tokio::test]
    async fn polls_until_done_then_stops_ticking() {
        let mut h = harness(
            MockStatus::new(vec![
                Ok(report(PollState::Processing)),
                Ok(report(PollState::Processing)),
                Ok(report(PollState::Processing)),
                Ok(report(PollState::Done)),
            ]),
            fast(),
        );
        let job = job();

        assert!(h.watcher.watch(job.clone()));
        let event = next_terminal(&mut h).await;
        assert_eq!(event.kind, EventKind::Finished);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.client.calls(), 4);
        assert!(h.terminal.try_recv().is_err());
        assert_eq!(h.watcher.snapshot(job.key()), Some(WatchState::Done));
        assert!(!h.watcher.is_watching(job.key()));
    }

    #[tokio::test]
    async fn stop_discards_response_already_in_flight() {
        let mut h = harness(
            MockStatus::new(vec![
                Ok(report(PollState::Processing)),
                Ok(report(PollState::Processing)),
                Ok(report(PollState::Done)),
            ])
            .gated_at(3),
            fast(),
        );
        let job = job();

        h.watcher.watch(job.clone());
        tokio::time::timeout(Duration::from_secs(2), h.client.entered.notified())
            .await
            .unwrap();

        assert!(h.watcher.stop(job.key()));
        h.client.release.notify_one();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.terminal.try_recv().is_err());
        assert_eq!(h.client.calls(), 3);
        assert_eq!(h.watcher.snapshot(job.key()), None);
    }

    #[tokio::test]
    async fn stop_while_sleeping_prevents_further_ticks() {
        let mut h = harness(
            MockStatus::new(vec![Ok(report(PollState::Pending))]),
            WatcherConfig {
                interval: Duration::from_secs(3600),
                ..fast()
            },
        );
        let job = job();

        h.watcher.watch(job.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.client.calls(), 1);

        assert!(h.watcher.stop(job.key()));
        assert!(!h.watcher.stop(job.key()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.client.calls(), 1);
        assert!(h.terminal.try_recv().is_err());
    }

    #[tokio::test]
    async fn immediate_terminal_status_publishes_once() {
        let mut h = harness(MockStatus::new(vec![Ok(report(PollState::Done))]), fast());
        let job = job();

        h.watcher.watch(job.clone());
        assert_eq!(next_terminal(&mut h).await.kind, EventKind::Finished);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.client.calls(), 1);
    }

    #[tokio::test]
    async fn server_error_publishes_failed_with_detail() {
        let mut h = harness(
            MockStatus::new(vec![Ok(StatusReport {
                error_detail: Some("PDF ilegível".into()),
                ..report(PollState::Error)
            })]),
            fast(),
        );
        let job = job();

        h.watcher.watch(job.clone());
        let event = next_terminal(&mut h).await;
        assert_eq!(event.kind, EventKind::Failed);
        assert_eq!(event.detail.as_deref(), Some("PDF ilegível"));
        assert_eq!(
            h.watcher.snapshot(job.key()),
            Some(WatchState::Error("PDF ilegível".into()))
        );
    }

    #[tokio::test]
    async fn transport_errors_exhaust_budget() {
        let mut h = harness(
            MockStatus::new(vec![
                Err(network_error()),
                Err(network_error()),
                Err(network_error()),
            ]),
            fast(),
        );

        h.watcher.watch(job());
        let event = next_terminal(&mut h).await;
        assert_eq!(event.kind, EventKind::Failed);
        assert_eq!(event.detail.as_deref(), Some("Bad Gateway"));
        assert_eq!(h.client.calls(), 3);
    }

    #[tokio::test]
    async fn transient_errors_reset_after_success() {
        let mut h = harness(
            MockStatus::new(vec![
                Err(network_error()),
                Err(network_error()),
                Ok(report(PollState::Processing)),
                Err(network_error()),
                Ok(report(PollState::Done)),
            ]),
            fast(),
        );

        h.watcher.watch(job());
        assert_eq!(next_terminal(&mut h).await.kind, EventKind::Finished);
        assert_eq!(h.client.calls(), 5);
    }

    #[tokio::test]
    async fn finished_watches_are_pruned() {
        let mut h = harness(
            MockStatus::new(vec![Ok(report(PollState::Done))]),
            WatcherConfig {
                interval: Duration::from_secs(3600),
                ..fast()
            },
        );
        let first = job();
        let second = BiddingRecord::new("Y", "12345678000190", Status::EmAnalise);

        h.watcher.watch(first.clone());
        next_terminal(&mut h).await;
        assert_eq!(h.watcher.snapshot(first.key()), Some(WatchState::Done));

        assert!(h.watcher.watch(second.clone()));
        assert_eq!(h.watcher.snapshot(first.key()), None);
        assert!(h.watcher.is_watching(second.key()));
        assert!(!h.watcher.forget(second.key()));

        h.watcher.stop_all();
    }

    #[tokio::test]
    async fn forget_drops_terminal_state() {
        let mut h = harness(MockStatus::new(vec![Ok(report(PollState::Done))]), fast());
        let job = job();

        h.watcher.watch(job.clone());
        next_terminal(&mut h).await;

        assert!(h.watcher.forget(job.key()));
        assert_eq!(h.watcher.snapshot(job.key()), None);
        assert!(!h.watcher.forget(job.key()));
    }

    #[tokio::test]
    async fn second_watch_while_polling_is_rejected() {
        let h = harness(
            MockStatus::new(vec![]),
            WatcherConfig {
                interval: Duration::from_secs(3600),
                ..fast()
            },
        );
        let job = job();

        assert!(h.watcher.watch(job.clone()));
        assert!(!h.watcher.watch(job.clone()));
        assert!(h.watcher.is_watching(job.key()));

        h.watcher.stop_all();
        assert!(!h.watcher.is_watching(job.key()));
    }

    #[tokio::test]
    async fn queue_position_is_exposed() {
        let h = harness(
            MockStatus::new(vec![Ok(StatusReport {
                queue_position: Some(4),
                eta_minutes: Some(12),
                ..report(PollState::Pending)
            })]),
            WatcherConfig {
                interval: Duration::from_secs(3600),
                ..fast()
            },
        );
        let job = job();

        h.watcher.watch(job.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            h.watcher.snapshot(job.key()),
            Some(WatchState::Polling {
                queue_position: Some(4),
                eta_minutes: Some(12)
            })
        );
        h.watcher.stop(job.key());
    }
}
