//! Tipos de dados das requisições e respostas do backend.
//!
//! Os nomes de campo no JSON seguem o backend (`numeroControlePNCP`,
//! `empresaCNPJ`, `posicaoFila`...), mapeados via `serde(rename)`.

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Corpo de `POST /edital/analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(rename = "numeroControlePNCP")]
    pub numero_controle_pncp: String,
    #[serde(rename = "empresaCNPJ")]
    pub empresa_cnpj: String,
}

/// Successful analysis response, kept opaque apart from the optional
/// `notification` block the backend attaches on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisPayload(pub serde_json::Value);

impl AnalysisPayload {
    pub fn notification(&self) -> Option<&serde_json::Value> {
        self.0.get("notification").filter(|n| !n.is_null())
    }
}

/// Server-side state of a queued analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "processando")]
    Processing,
    #[serde(rename = "concluida")]
    Done,
    #[serde(rename = "erro")]
    Error,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollState::Done | PollState::Error)
    }
}

/// Resposta de `GET /edital/status/{numero}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: PollState,
    /// Posição na fila de processamento.
    #[serde(rename = "posicaoFila", default)]
    pub queue_position: Option<u32>,
    /// Tempo estimado em minutos.
    #[serde(rename = "tempoEstimado", default)]
    pub eta_minutes: Option<u32>,
    #[serde(rename = "erro", default)]
    pub error_detail: Option<String>,
}

/// Corpo de `PUT /licitacoes/empresa/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[serde(rename = "numeroControlePNCP")]
    pub numero_controle_pncp: String,
    pub empresa_cnpj: String,
    pub status: Status,
}
