//! The pipeline's state machine and its user-visible result (`spec.md §4.11`, §7)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// States of the payment-execution pipeline, per `spec.md §4.11`.
/// Modeled as a plain enum with `match`-driven transitions in
/// [`crate::executor::PaymentExecutor::execute`] rather than a generic
/// state-machine abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Received,
    Verifying,
    Rejected,
    Screening,
    Denied,
    Dispatching,
    Submitted,
    Confirmed,
    Recorded,
    Failed,
}

/// The three outcomes `spec.md §7` says every response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
    Accepted,
    Denied,
    Failed,
}

/// What `PaymentExecutor::execute` returns: a machine-readable status,
/// an `error_code`/`reason` pair, and the `audit_id` of the final audit
/// entry so the caller can later prove what the system decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorResult {
    pub status: ExecutorStatus,
    pub final_state: PaymentState,
    pub error_code: Option<&'static str>,
    /// Which compliance rule produced a `denied` verdict, if any.
    pub rule_id: Option<String>,
    pub reason: Option<String>,
    pub audit_id: Option<String>,
    pub ledger_entry_id: Option<Uuid>,
    pub settlement_id: Option<Uuid>,
    pub tx_hash: Option<String>,
}

impl ExecutorResult {
    pub(crate) fn rejected(error_code: &'static str, reason: String, audit_id: Option<String>) -> Self {
        Self {
            status: ExecutorStatus::Failed,
            final_state: PaymentState::Rejected,
            error_code: Some(error_code),
            rule_id: None,
            reason: Some(reason),
            audit_id,
            ledger_entry_id: None,
            settlement_id: None,
            tx_hash: None,
        }
    }

    pub(crate) fn denied(rule_id: String, reason: Option<String>, audit_id: String) -> Self {
        Self {
            status: ExecutorStatus::Denied,
            final_state: PaymentState::Denied,
            error_code: Some("compliance_denied"),
            rule_id: Some(rule_id),
            reason,
            audit_id: Some(audit_id),
            ledger_entry_id: None,
            settlement_id: None,
            tx_hash: None,
        }
    }

    pub(crate) fn accepted(
        final_state: PaymentState,
        ledger_entry_id: Uuid,
        settlement_id: Uuid,
        tx_hash: Option<String>,
        audit_id: Option<String>,
    ) -> Self {
        Self {
            status: ExecutorStatus::Accepted,
            final_state,
            error_code: None,
            rule_id: None,
            reason: None,
            audit_id,
            ledger_entry_id: Some(ledger_entry_id),
            settlement_id: Some(settlement_id),
            tx_hash,
        }
    }

    pub(crate) fn failed(
        error_code: &'static str,
        reason: String,
        ledger_entry_id: Option<Uuid>,
        settlement_id: Option<Uuid>,
        audit_id: Option<String>,
    ) -> Self {
        Self {
            status: ExecutorStatus::Failed,
            final_state: PaymentState::Failed,
            error_code: Some(error_code),
            rule_id: None,
            reason: Some(reason),
            audit_id,
            ledger_entry_id,
            settlement_id,
            tx_hash: None,
        }
    }
}
