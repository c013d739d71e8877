use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::graph::Status;

/// Identifies one analysis job: the PNCP control number of the bidding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(numero_controle_pncp: impl Into<String>) -> Self {
        Self(numero_controle_pncp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form for use as a URL path segment.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The company (CNPJ) that owns a tracked bidding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    pub fn new(cnpj: impl Into<String>) -> Self {
        Self(cnpj.into())
    }

    pub fn cnpj(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uma licitação acompanhada por uma empresa (`LicitacaoEmpresa` no backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiddingRecord {
    #[serde(rename = "numeroControlePNCP")]
    pub numero_controle_pncp: JobKey,
    pub cnpj_empresa: Tenant,
    pub status: Status,
    pub data_atualizacao: DateTime<Utc>,
}

impl BiddingRecord {
    pub fn new(
        numero_controle_pncp: impl Into<String>,
        cnpj: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            numero_controle_pncp: JobKey::new(numero_controle_pncp),
            cnpj_empresa: Tenant::new(cnpj),
            status,
            data_atualizacao: Utc::now(),
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.numero_controle_pncp
    }

    pub fn tenant(&self) -> &Tenant {
        &self.cnpj_empresa
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_from_backend_format() {
        let json = r#"{
            "numeroControlePNCP": "12345678000190-1-000123/2025",
            "cnpjEmpresa": "12345678000190",
            "status": "analisado",
            "dataAtualizacao": "2025-03-01T12:00:00Z"
        }"#;
        let record: BiddingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key().as_str(), "12345678000190-1-000123/2025");
        assert_eq!(record.tenant().cnpj(), "12345678000190");
        assert_eq!(record.status, Status::Analisado);
    }

    #[test]
    fn job_key_encodes_path_separators() {
        let key = JobKey::new("12345678000190-1-000123/2025");
        assert_eq!(key.encoded(), "12345678000190-1-000123%2F2025");
        assert_eq!(key.to_string(), "12345678000190-1-000123/2025");
    }
}
