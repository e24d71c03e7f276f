//! Compliance engine result types (`spec.md §4.2`, C2)

use serde::{Deserialize, Serialize};

/// The well-known rule id assigned when every configured provider failed.
pub const RULE_EVALUATION_ERROR_FAILCLOSED: &str = "evaluation_error_failclosed";

/// `preflight(mandate) -> PreflightResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub rule_id: String,
    pub provider: String,
    /// The audit trail entry this decision was recorded under.
    pub audit_id: String,
}
