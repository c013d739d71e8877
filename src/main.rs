mod cli;
mod ui;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alicit::api::ApiClient;
use alicit::config::AlicitConfig;
use alicit::decision::{Decision, StatusDecider};
use alicit::events::{EventBus, EventKind};
use alicit::launcher::{AnalysisLauncher, Outcome};
use alicit::observers::{self, NotificationCenter, ProgressTracker, StatusBadges};
use alicit::registry::JobRegistry;
use alicit::status::{Action, BiddingRecord, Status, StatusGraph};
use alicit::watcher::{PollingWatcher, WatchState};
use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use ui::AnalysisProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AlicitConfig::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    let client = Arc::new(config.client()?);
    let bus = Arc::new(EventBus::new());
    let progress = AnalysisProgress::new();
    let _render = progress.attach(&bus);

    match cli.command {
        Command::Analisar {
            numero,
            cnpj,
            status,
        } => {
            let record = BiddingRecord::new(numero, cnpj, status);
            analisar(client, bus, &progress, record).await
        }
        Command::Acompanhar { numero, cnpj } => {
            let cnpj = cnpj.unwrap_or_default();
            let record = BiddingRecord::new(numero, cnpj, Status::EmAnalise);
            acompanhar(client, bus, &progress, &config, record).await
        }
        Command::Decidir {
            numero,
            cnpj,
            status,
            acao,
        } => {
            let mut record = BiddingRecord::new(numero, cnpj, status);
            let decider = StatusDecider::new(client, bus);
            match decider.apply(&mut record, acao.into()).await? {
                Decision::Applied { .. } => Ok(()),
                Decision::Unchanged(current) => {
                    bail!(
                        "ação {} não é permitida a partir de {}",
                        Action::from(acao),
                        current.label()
                    )
                }
            }
        }
        Command::Status { status } => {
            ui::print_status(status);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

async fn analisar(
    client: Arc<ApiClient>,
    bus: Arc<EventBus>,
    progress: &AnalysisProgress,
    record: BiddingRecord,
) -> Result<()> {
    if !StatusGraph::can_start_analysis(record.status) {
        bail!(
            "não é possível iniciar análise a partir de {}",
            record.status.label()
        );
    }

    let tracker = Arc::new(Mutex::new(ProgressTracker::new()));
    let badges = Arc::new(Mutex::new(StatusBadges::new()));
    let notifications = Arc::new(Mutex::new(NotificationCenter::new()));
    let _subs = [
        observers::attach(&bus, &tracker),
        observers::attach(&bus, &badges),
        observers::attach(&bus, &notifications),
    ];
    lock(&badges).seed([&record]);

    let launcher = AnalysisLauncher::new(client, Arc::new(JobRegistry::new()), bus);
    let tenant = record.tenant().clone();
    let launch = launcher.launch(&record, &tenant);
    tokio::pin!(launch);

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let outcome = loop {
        tokio::select! {
            outcome = &mut launch => break outcome,
            _ = tick.tick() => {
                if let Some(tracked) = lock(&tracker).get(record.key()) {
                    progress.estimate(tracked);
                }
            }
        }
    };

    if let Some(badge) = lock(&badges).get(record.key()) {
        println!("  Status: {}", badge.label());
    }
    match outcome {
        Some(Outcome::Failed(reason)) => bail!(reason),
        Some(Outcome::InProgressElsewhere) => {
            // Aviso bloqueante: exige confirmação explícita.
            let notifications = lock(&notifications);
            if let Some(notice) = notifications
                .notifications()
                .iter()
                .find(|n| !n.dismissible)
            {
                println!(
                    "  {}: aguarde a conclusão antes de tentar novamente",
                    notice.kind.title()
                );
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn acompanhar(
    client: Arc<ApiClient>,
    bus: Arc<EventBus>,
    progress: &AnalysisProgress,
    config: &AlicitConfig,
    record: BiddingRecord,
) -> Result<()> {
    let key = record.key().clone();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let watched = key.clone();
    let _done = bus.subscribe(
        move |event| event.kind.is_terminal() && event.job.key() == &watched,
        move |event| {
            let _ = done_tx.send(event.kind);
        },
    );

    let watcher = PollingWatcher::new(client, bus, config.watcher());
    watcher.watch(record);

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            kind = done_rx.recv() => {
                return match kind {
                    Some(EventKind::Failed) => bail!("análise de {key} terminou com erro"),
                    _ => Ok(()),
                };
            }
            _ = tick.tick() => {
                if let Some(state @ WatchState::Polling { .. }) = watcher.snapshot(&key) {
                    progress.queue(&state);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                watcher.stop_all();
                progress.clear();
                println!("  Acompanhamento de {key} interrompido");
                return Ok(());
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
