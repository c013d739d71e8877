use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Os estados de ciclo de vida de uma licitação acompanhada por uma empresa.
///
/// Fluxo feliz: NAO_DEFINIDO → NAO_ANALISADO → EM_ANALISE → ANALISADO →
/// PROPOSTA → ENVIADA → VENCIDA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NaoDefinido,
    NaoAnalisado,
    EmAnalise,
    Analisado,
    Proposta,
    Enviada,
    Vencida,
    Recusada,
    Perdida,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::NaoDefinido,
        Status::NaoAnalisado,
        Status::EmAnalise,
        Status::Analisado,
        Status::Proposta,
        Status::Enviada,
        Status::Vencida,
        Status::Recusada,
        Status::Perdida,
    ];

    /// Nome usado no fio (JSON e rotas da API).
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NaoDefinido => "nao_definido",
            Status::NaoAnalisado => "nao_analisado",
            Status::EmAnalise => "em_analise",
            Status::Analisado => "analisado",
            Status::Proposta => "proposta",
            Status::Enviada => "enviada",
            Status::Vencida => "vencida",
            Status::Recusada => "recusada",
            Status::Perdida => "perdida",
        }
    }

    /// Rótulo exibido ao usuário.
    pub fn label(self) -> &'static str {
        match self {
            Status::NaoDefinido => "Não Definido",
            Status::NaoAnalisado => "Não Analisado",
            Status::EmAnalise => "Em Análise",
            Status::Analisado => "Analisado",
            Status::Proposta => "Proposta",
            Status::Enviada => "Enviada",
            Status::Vencida => "Vencida",
            Status::Recusada => "Recusada",
            Status::Perdida => "Perdida",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Status::NaoDefinido => "Status não definido",
            Status::NaoAnalisado => "Aguardando análise de IA",
            Status::EmAnalise => "Análise em andamento",
            Status::Analisado => "Análise concluída, aguardando decisão",
            Status::Proposta => "Aprovado para elaboração de proposta",
            Status::Enviada => "Proposta enviada",
            Status::Vencida => "Licitação vencida",
            Status::Recusada => "Recusada após análise",
            Status::Perdida => "Licitação perdida",
        }
    }

    /// Converts a raw status string stored by the backend.
    ///
    /// Legacy names (`aprovado`, `analise`, `impugnacao`, `recusado`) are
    /// folded into the current set; anything unknown becomes `NaoDefinido`.
    pub fn from_backend(raw: &str) -> Status {
        match raw {
            "aprovado" | "impugnacao" => Status::NaoAnalisado,
            "analise" => Status::EmAnalise,
            "recusado" => Status::Recusada,
            other => other.parse().unwrap_or(Status::NaoDefinido),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status desconhecido: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// User actions that can move a record through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    Analyze,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Approve => write!(f, "approve"),
            Action::Reject => write!(f, "reject"),
            Action::Analyze => write!(f, "analyze"),
        }
    }
}

/// Single source of truth for legal status transitions.
///
/// Every method is a pure function of its arguments. Asking for a
/// transition that is not in the table is never an error: `next_status`
/// hands back the current status unchanged.
pub struct StatusGraph;

impl StatusGraph {
    /// The outgoing edges of `status` in the transition table.
    pub fn next_statuses(status: Status) -> &'static [Status] {
        match status {
            Status::NaoDefinido => &[Status::NaoAnalisado],
            Status::NaoAnalisado => &[Status::EmAnalise],
            Status::EmAnalise => &[Status::Analisado],
            Status::Analisado => &[Status::Proposta, Status::Recusada],
            Status::Proposta => &[Status::Enviada],
            Status::Enviada => &[Status::Vencida, Status::Perdida],
            Status::Vencida | Status::Recusada | Status::Perdida => &[],
        }
    }

    pub fn can_transition(from: Status, to: Status) -> bool {
        Self::next_statuses(from).contains(&to)
    }

    /// Resolve the status that `action` leads to from `current`.
    ///
    /// Returns `current` when the action is not allowed there.
    pub fn next_status(current: Status, action: Action) -> Status {
        let target = match (current, action) {
            (Status::NaoAnalisado, Action::Analyze) => Status::EmAnalise,
            (Status::Analisado, Action::Approve) => Status::Proposta,
            (Status::Analisado, Action::Reject) => Status::Recusada,
            _ => return current,
        };
        debug_assert!(Self::can_transition(current, target));
        target
    }

    /// Whether `action` actually moves a record sitting in `current`.
    pub fn can_perform(action: Action, current: Status) -> bool {
        Self::next_status(current, action) != current
    }

    pub fn can_start_analysis(status: Status) -> bool {
        status == Status::NaoAnalisado
    }

    pub fn can_make_decision(status: Status) -> bool {
        status == Status::Analisado
    }

    pub fn can_navigate_to_analysis_view(status: Status) -> bool {
        matches!(
            status,
            Status::Analisado | Status::Proposta | Status::Recusada
        )
    }

    pub fn is_analysis_in_progress(status: Status) -> bool {
        status == Status::EmAnalise
    }

    pub fn is_terminal(status: Status) -> bool {
        matches!(status, Status::Vencida | Status::Recusada | Status::Perdida)
    }

    pub fn is_editable(status: Status) -> bool {
        matches!(status, Status::NaoAnalisado | Status::Analisado)
    }

    /// Past the analysis stage (a decision was taken at some point).
    pub fn is_completed(status: Status) -> bool {
        matches!(
            status,
            Status::Proposta
                | Status::Enviada
                | Status::Vencida
                | Status::Recusada
                | Status::Perdida
        )
    }

    pub fn is_pending(status: Status) -> bool {
        matches!(status, Status::NaoAnalisado | Status::EmAnalise)
    }
}
