pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

pub use client::{ApiClient, DEFAULT_API_URL};
pub use error::ApiError;
pub use types::{AnalysisPayload, AnalysisRequest, PollState, StatusReport, StatusUpdateRequest};

use crate::status::{JobKey, Status, Tenant};

/// Launches the server-side analysis of one bidding.
///
/// May legitimately take minutes; callers do not impose a timeout.
pub trait AnalysisApi: Send + Sync {
    fn start_analysis(
        &self,
        key: &JobKey,
        tenant: &Tenant,
    ) -> impl Future<Output = Result<AnalysisPayload, ApiError>> + Send;
}

/// Reads the queue/processing state of an analysis.
pub trait StatusQueryApi: Send + Sync {
    fn query_status(
        &self,
        key: &JobKey,
    ) -> impl Future<Output = Result<StatusReport, ApiError>> + Send;
}

/// Authoritative store of bidding statuses.
pub trait RecordStore: Send + Sync {
    fn update_status(
        &self,
        key: &JobKey,
        tenant: &Tenant,
        status: Status,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
