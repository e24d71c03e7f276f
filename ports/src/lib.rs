//! Shared vocabulary for the agent payment rail: money, the mandate
//! chain, canonical encoding, and the abstract ports through which
//! every external collaborator is reached.
//!
//! Every other crate in this workspace depends on `ports` and nothing
//! in `ports` depends back on them — it is the bottom of the stack.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]
#![doc(html_no_source)]

pub mod canonical;
pub mod error;
pub mod mandate;
pub mod money;
pub mod traits;

pub use error::PortError;
pub use mandate::{Cart, Discount, DiscountType, Intent, LineItem, MandateChain, Payment, Proof, ProofAlgorithm};
pub use money::{Currency, Money};
pub use traits::{
    AnchorPort, AnchorReceipt, AppendReceipt, AuditStorePort, ChainExecutorPort, ChainTx,
    ComplianceDecision, ComplianceProviderPort, DispatchReceipt, GasEstimate, KycCheck, KycPort,
    KycSession, KycStatus, LedgerEntryFilter, LedgerStorePort, Page, Paging, PortResult, RampPort,
    RampSession, RampStatus, SanctionsPort, SanctionsResult, SigningPort, Snapshot, TreasuryPort,
    TreasuryTransfer, WalletHandle,
};
