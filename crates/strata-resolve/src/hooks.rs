//! Program hooks.
//!
//! Events are queued while the program is borrowed and dispatched by
//! [`Hooks::flush`] once every borrow is released, so listeners may call
//! back into the program.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use serde::Serialize;
use strata_core::{DocumentId, StatementId};
use strata_faults::{Fault, FaultEvent};

/// Something observable that happened to a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent {
    /// Statements of `document` are about to be replaced. `parents` are the
    /// statements whose subtrees the edit touches.
    Invalidate {
        document: DocumentId,
        parents: Vec<StatementId>,
    },
    /// An edit transaction finished and its fault diff was broadcast.
    EditComplete { document: DocumentId },
    FaultReported { fault: Fault },
    FaultRectified { fault: Fault },
}

impl From<FaultEvent> for HookEvent {
    fn from(event: FaultEvent) -> Self {
        match event {
            FaultEvent::Reported(fault) => HookEvent::FaultReported { fault },
            FaultEvent::Rectified(fault) => HookEvent::FaultRectified { fault },
        }
    }
}

type Listener = Box<dyn FnMut(&HookEvent)>;

#[derive(Default)]
pub struct Hooks {
    queue: RefCell<VecDeque<HookEvent>>,
    listeners: RefCell<Vec<Listener>>,
    flushing: Cell<bool>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, event: HookEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    pub fn listen(&self, listener: Listener) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Dispatches every queued event to every listener, in order.
    ///
    /// Listeners registered during dispatch receive events from the next
    /// flush on. Events queued during dispatch are delivered by this flush,
    /// and a flush requested by a listener is a no-op.
    pub fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let mut listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            tracing::trace!(?event, "hook dispatched");
            for listener in listeners.iter_mut() {
                listener(&event);
            }
        }
        let mut current = self.listeners.borrow_mut();
        listeners.append(&mut current);
        *current = listeners;
        self.flushing.set(false);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn flush_delivers_in_order_and_drains() {
        let hooks = Hooks::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        hooks.listen(Box::new(move |e| sink.borrow_mut().push(e.clone())));

        hooks.enqueue(HookEvent::Invalidate {
            document: DocumentId(0),
            parents: vec![StatementId(1)],
        });
        hooks.enqueue(HookEvent::EditComplete {
            document: DocumentId(0),
        });
        assert_eq!(hooks.pending(), 2);
        hooks.flush();

        assert_eq!(hooks.pending(), 0);
        assert_eq!(seen.borrow().len(), 2);
        assert!(matches!(seen.borrow()[1], HookEvent::EditComplete { .. }));

        hooks.flush();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn listeners_survive_dispatch() {
        let hooks = Rc::new(Hooks::new());
        let count = Rc::new(RefCell::new(0));
        let inner = Rc::clone(&hooks);
        let c = Rc::clone(&count);
        hooks.listen(Box::new(move |_| {
            *c.borrow_mut() += 1;
            let c2 = Rc::clone(&c);
            inner.listen(Box::new(move |_| *c2.borrow_mut() += 100));
        }));

        hooks.enqueue(HookEvent::EditComplete {
            document: DocumentId(0),
        });
        hooks.flush();
        assert_eq!(*count.borrow(), 1);

        hooks.enqueue(HookEvent::EditComplete {
            document: DocumentId(0),
        });
        hooks.flush();
        assert_eq!(*count.borrow(), 102);
    }

    #[test]
    fn nested_flushes_do_not_drop_events() {
        let hooks = Rc::new(Hooks::new());
        let seen = Rc::new(RefCell::new(0));
        let inner = Rc::clone(&hooks);
        let s = Rc::clone(&seen);
        hooks.listen(Box::new(move |e| {
            *s.borrow_mut() += 1;
            if matches!(e, HookEvent::Invalidate { .. }) {
                inner.enqueue(HookEvent::EditComplete {
                    document: DocumentId(0),
                });
                inner.flush();
            }
        }));

        hooks.enqueue(HookEvent::Invalidate {
            document: DocumentId(0),
            parents: Vec::new(),
        });
        hooks.flush();
        assert_eq!(*seen.borrow(), 2);
        assert_eq!(hooks.pending(), 0);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(HookEvent::EditComplete {
            document: DocumentId(3),
        })
        .unwrap();
        assert_eq!(json["event"], "edit_complete");
    }
}
