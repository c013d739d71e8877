use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::ApiError;
use super::types::{AnalysisPayload, AnalysisRequest, StatusReport, StatusUpdateRequest};
use super::{AnalysisApi, RecordStore, StatusQueryApi};
use crate::status::{JobKey, Status, Tenant};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// reqwest-backed client for the Alicit REST backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    status_timeout: Duration,
}

impl ApiClient {
    /// Build a client for `base_url`.
    ///
    /// Only the connect phase is bounded; the analysis call may run for minutes.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            status_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &body);
            if matches!(err, ApiError::SessionExpired) {
                warn!("token rejeitado pelo servidor");
            }
            return Err(err);
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl AnalysisApi for ApiClient {
    async fn start_analysis(
        &self,
        key: &JobKey,
        tenant: &Tenant,
    ) -> Result<AnalysisPayload, ApiError> {
        let body = AnalysisRequest {
            numero_controle_pncp: key.as_str().to_string(),
            empresa_cnpj: tenant.cnpj().to_string(),
        };
        self.json(self.client.post(self.url("/edital/analysis")).json(&body))
            .await
    }
}

impl StatusQueryApi for ApiClient {
    async fn query_status(&self, key: &JobKey) -> Result<StatusReport, ApiError> {
        let url = self.url(&format!("/edital/status/{}", key.encoded()));
        self.json(self.client.get(url).timeout(self.status_timeout))
            .await
    }
}

impl RecordStore for ApiClient {
    async fn update_status(
        &self,
        key: &JobKey,
        tenant: &Tenant,
        status: Status,
    ) -> Result<(), ApiError> {
        let body = StatusUpdateRequest {
            numero_controle_pncp: key.as_str().to_string(),
            empresa_cnpj: tenant.cnpj().to_string(),
            status,
        };
        self.execute(self.client.put(self.url("/licitacoes/empresa/status")).json(&body))
            .await?;
        Ok(())
    }
}
