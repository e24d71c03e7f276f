//! Flow status and outcome vocabulary (`spec.md §4.10`, C10)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal or in-flight state of a flow run, per `spec.md §4.10`'s
/// "each flow returns a status in `{completed, pending, failed}`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Completed,
    Pending,
    Failed,
}

/// What a flow run produced: its terminal status, the sub-ledger
/// transaction record ids it wrote (if any), and the failure reason
/// when applicable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub status: FlowStatus,
    pub record_ids: Vec<Uuid>,
    pub external_ref: Option<String>,
    pub error_code: Option<&'static str>,
    pub reason: Option<String>,
}

impl FlowOutcome {
    pub(crate) fn completed(record_ids: Vec<Uuid>, external_ref: Option<String>) -> Self {
        Self { status: FlowStatus::Completed, record_ids, external_ref, error_code: None, reason: None }
    }

    pub(crate) fn pending(external_ref: Option<String>) -> Self {
        Self { status: FlowStatus::Pending, record_ids: Vec::new(), external_ref, error_code: None, reason: None }
    }

    pub(crate) fn failed(error_code: &'static str, reason: String) -> Self {
        Self { status: FlowStatus::Failed, record_ids: Vec::new(), external_ref: None, error_code: Some(error_code), reason: Some(reason) }
    }
}
