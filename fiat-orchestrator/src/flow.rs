//! The saga shape every flow in this crate shares: an ordered sequence
//! of steps, each pushing a compensation onto a stack as it succeeds,
//! so a later failure can unwind everything already committed.
//!
//! Grounded in `sardis_core/fiat_orchestrator.py`'s flow runner, which
//! models each fiat operation as a list of steps plus an explicit
//! compensation stack rather than a single try/except block.

use std::future::Future;
use std::pin::Pin;

type Compensation = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Accumulates compensating actions as a flow's steps succeed. If the
/// flow later fails, [`CompensationStack::unwind`] runs them in reverse
/// order — last-committed, first-undone.
#[derive(Default)]
pub struct CompensationStack {
    actions: Vec<Compensation>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    /// Record a compensation to run if a later step fails. `fut` should
    /// already be fully formed (it is only polled on unwind, never
    /// before), so callers build it with the exact arguments the
    /// succeeded step used.
    pub fn push(&mut self, fut: impl Future<Output = ()> + Send + 'static) {
        self.actions.push(Box::pin(fut));
    }

    /// Run every recorded compensation, most recent first. Each
    /// compensation is expected to log its own failures; this never
    /// short-circuits, since leaving a later compensation un-run would
    /// strand state a caller cannot observe.
    pub async fn unwind(self) {
        for action in self.actions.into_iter().rev() {
            action.await;
        }
    }
}
