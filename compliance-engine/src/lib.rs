//! The compliance engine (C2): fail-closed preflight screening against a
//! primary→fallback chain of external compliance providers.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod engine;
pub mod error;
pub mod types;

pub use engine::ComplianceEngine;
pub use error::{Error, Result};
pub use types::{PreflightResult, RULE_EVALUATION_ERROR_FAILCLOSED};
