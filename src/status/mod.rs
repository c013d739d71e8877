mod graph;
mod record;

pub use graph::{Action, Status, StatusGraph, UnknownStatus};
pub use record::{BiddingRecord, JobKey, Tenant};
