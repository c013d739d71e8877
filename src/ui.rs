//! Interface de terminal do ALICIT: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`AnalysisProgress`] é mais um observador do
//! [`EventBus`]: desenha o ciclo de vida das análises conforme os eventos chegam.

use std::time::Duration;

use chrono::Utc;

use alicit::events::{EventBus, EventKind, LifecycleEvent, Subscription};
use alicit::observers::TrackedAnalysis;
use alicit::status::{Status, StatusGraph};
use alicit::watcher::WatchState;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Indicador visual de progresso para análises no terminal.
///
/// Exibe um spinner animado enquanto há análise em curso e mensagens
/// coloridas para conclusão (verde), falha (vermelho) e aviso (amarelo).
#[derive(Clone)]
pub struct AnalysisProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl AnalysisProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Inscreve o renderizador em todos os eventos do barramento.
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let progress = self.clone();
        bus.subscribe_all(move |event| progress.render(event))
    }

    fn render(&self, event: &LifecycleEvent) {
        match event.kind {
            EventKind::Started => {
                self.pb.set_message(describe(event));
                self.pb.enable_steady_tick(Duration::from_millis(100));
            }
            EventKind::Finished => self.finish(&self.green, "✓", event),
            EventKind::Failed => self.finish(&self.red, "✗", event),
            EventKind::Navigate | EventKind::InProgress => self.finish(&self.yellow, "!", event),
            EventKind::StatusUpdated { .. } => {
                self.pb.println(format!("  {} {}", self.green.apply_to("→"), describe(event)));
            }
        }
    }

    fn finish(&self, style: &Style, mark: &str, event: &LifecycleEvent) {
        self.pb.finish_and_clear();
        println!("  {} {}", style.apply_to(mark), describe(event));
    }

    /// Atualiza a linha do spinner com a posição na fila.
    pub fn queue(&self, state: &WatchState) {
        if let WatchState::Polling {
            queue_position,
            eta_minutes,
        } = state
        {
            let mut msg = String::from("Aguardando processamento");
            if let Some(pos) = queue_position {
                msg.push_str(&format!(" · posição {pos}"));
            }
            if let Some(eta) = eta_minutes {
                msg.push_str(&format!(" · ~{eta} min"));
            }
            self.pb.set_message(msg);
            self.pb.enable_steady_tick(Duration::from_millis(100));
        }
    }

    /// Atualiza a linha do spinner com a estimativa do rastreador.
    pub fn estimate(&self, tracked: &TrackedAnalysis) {
        let now = Utc::now();
        self.pb.set_message(format!(
            "Analisando edital {} · {:.0}% · {} · {}",
            tracked.record.key(),
            tracked.progress(now),
            tracked.phase(now),
            tracked.elapsed_label(now)
        ));
    }

    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}

/// Linha de texto exibida para um evento.
pub fn describe(event: &LifecycleEvent) -> String {
    let numero = event.job.key();
    match event.kind {
        EventKind::Started => format!("Analisando edital {numero}..."),
        EventKind::Finished => match &event.detail {
            Some(detail) => format!("Análise de {numero} concluída: {detail}"),
            None => format!("Análise de {numero} concluída"),
        },
        EventKind::Failed => format!(
            "Erro na análise de {numero}: {}",
            event.detail.as_deref().unwrap_or("erro desconhecido")
        ),
        EventKind::Navigate => format!("Análise de {numero} já existe"),
        EventKind::InProgress => {
            format!("Análise de {numero} já está em andamento por outro usuário")
        }
        EventKind::StatusUpdated { from, to } => {
            format!("{numero}: {} → {}", from.label(), to.label())
        }
    }
}

/// Imprime as capacidades de um status e suas transições.
pub fn print_status(status: Status) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    let yes = |b: bool| if b { "sim" } else { "não" };

    println!("{} ({status})", bold.apply_to(status.label()));
    println!("  {}", dim.apply_to(status.description()));
    println!("  iniciar análise:    {}", yes(StatusGraph::can_start_analysis(status)));
    println!("  tomar decisão:      {}", yes(StatusGraph::can_make_decision(status)));
    println!("  abrir análise:      {}", yes(StatusGraph::can_navigate_to_analysis_view(status)));
    println!("  editável:           {}", yes(StatusGraph::is_editable(status)));
    println!("  terminal:           {}", yes(StatusGraph::is_terminal(status)));

    let next: Vec<&str> = StatusGraph::next_statuses(status)
        .iter()
        .map(|s| s.as_str())
        .collect();
    if next.is_empty() {
        println!("  próximos:           -");
    } else {
        println!("  próximos:           {}", next.join(", "));
    }
}
