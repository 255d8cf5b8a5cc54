//! FaultService: the committed fault set and its incremental diff.
//!
//! Outside a transaction a reported fault is committed and broadcast on the
//! spot. Inside a transaction reports are accumulated, and
//! [`FaultService::end_transaction`] diffs the accumulation against the
//! committed faults of the invalidated statements only. Faults elsewhere are
//! neither re-examined nor broadcast.

use std::collections::HashSet;

use serde::Serialize;
use strata_core::StatementId;

use crate::fault::{Fault, FaultSource};
use crate::frame::{FaultFrame, FaultFrameContext};

/// A change to the committed fault set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "fault", rename_all = "snake_case")]
pub enum FaultEvent {
    Reported(Fault),
    Rectified(Fault),
}

impl FaultEvent {
    pub fn fault(&self) -> &Fault {
        match self {
            FaultEvent::Reported(f) | FaultEvent::Rectified(f) => f,
        }
    }
}

/// Holds the committed fault frame and the context of an open transaction.
#[derive(Debug, Default)]
pub struct FaultService {
    committed: FaultFrame,
    context: Option<FaultFrameContext>,
}

impl FaultService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_transaction(&self) -> bool {
        self.context.is_some()
    }

    /// Opens a transaction, or widens the open one.
    ///
    /// `invalidated` must already include the descendants of every touched
    /// statement.
    pub fn begin_transaction<I>(&mut self, invalidated: I)
    where
        I: IntoIterator<Item = StatementId>,
    {
        self.context
            .get_or_insert_with(FaultFrameContext::default)
            .invalidated
            .extend(invalidated);
    }

    /// Invalidates the statements of every committed fault matching `pred`.
    ///
    /// Does nothing outside a transaction.
    pub fn invalidate_where<F>(&mut self, pred: F)
    where
        F: Fn(&Fault) -> bool,
    {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        for fault in self.committed.iter().filter(|f| pred(f)) {
            context.invalidated.insert(fault.source.statement());
        }
    }

    /// Reports a fault. Returns the events to broadcast immediately, which
    /// is only ever non-empty outside a transaction.
    pub fn report(&mut self, fault: Fault) -> Vec<FaultEvent> {
        match self.context.as_mut() {
            Some(context) => {
                context.accumulated.insert(fault);
                Vec::new()
            }
            None => {
                if self.committed.insert(fault.clone()) {
                    vec![FaultEvent::Reported(fault)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Closes the transaction and commits its net effect.
    ///
    /// Returns `Rectified` events for committed faults of invalidated
    /// statements that were not re-reported, followed by `Reported` events
    /// for faults that were not committed before.
    pub fn end_transaction(&mut self) -> Vec<FaultEvent> {
        let Some(context) = self.context.take() else {
            return Vec::new();
        };

        let mut negative = self.committed.collect_within(&context.invalidated);
        let mut positive = FaultFrame::new();

        for fault in context.accumulated.iter() {
            if negative.remove(fault).is_some() || self.committed.contains(fault) {
                // Still true; refresh its location without broadcasting.
                self.committed.insert(fault.clone());
            } else {
                positive.insert(fault.clone());
            }
        }

        self.committed.subtract(&negative);
        self.committed.merge(&positive);

        tracing::debug!(
            invalidated = context.invalidated.len(),
            rectified = negative.len(),
            reported = positive.len(),
            committed = self.committed.len(),
            "fault frame committed"
        );

        negative
            .iter()
            .cloned()
            .map(FaultEvent::Rectified)
            .chain(positive.iter().cloned().map(FaultEvent::Reported))
            .collect()
    }

    /// Number of committed faults.
    pub fn count(&self) -> usize {
        self.committed.len()
    }

    /// Returns `true` if a fault with the same source and kind is committed.
    pub fn has(&self, fault: &Fault) -> bool {
        self.committed.contains(fault)
    }

    /// Returns the committed faults attached to `source`.
    pub fn check(&self, source: FaultSource) -> Vec<Fault> {
        self.committed.check(source).cloned().collect()
    }

    /// Returns every committed fault, ordered by document and line.
    pub fn each(&self) -> Vec<Fault> {
        let mut faults: Vec<Fault> = self.committed.iter().cloned().collect();
        faults.sort_by_key(|f| (f.document, f.line, f.source, f.kind));
        faults
    }

    /// Returns the statements with at least one committed fault.
    pub fn statements(&self) -> HashSet<StatementId> {
        self.committed
            .iter()
            .map(|f| f.source.statement())
            .collect()
    }
}
