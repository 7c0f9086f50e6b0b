#![forbid(unsafe_code)]

//! Subjects: publishers that imperative code can push into.
//!
//! - [`PassthroughSubject`]: forwards only values sent after a subscriber
//!   attached.
//! - [`CurrentValueSubject`]: retains the latest value and replays it to
//!   each new subscriber before anything else.
//!
//! Both are cheap handles onto shared state; clones send to and subscribe
//! on the same subject.
//!
//! # State machine
//!
//! A subject is `Open` until [`send_completion`] is called, then
//! `Terminated` forever. While open, `send` broadcasts to every live
//! subscriber in subscription order. Once terminated, `send` is a silent
//! no-op and new subscribers receive the stored completion immediately.
//!
//! Subscribers are held as `Weak` references to their delivery path, so a
//! subject never keeps a sink alive; dead entries are pruned lazily during
//! broadcast.
//!
//! [`send_completion`]: PassthroughSubject::send_completion

pub mod current_value;
pub mod passthrough;

pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::completion::Completion;
use crate::logging::{debug, trace};
use crate::sink::{Downstream, WeakDownstream};
use crate::subscription::{Cancellable, Subscription};

struct Entry<T, E> {
    id: u64,
    downstream: WeakDownstream<T, E>,
}

/// Subscriber set shared by both subject flavours.
pub(crate) struct Registry<T, E> {
    entries: Vec<Entry<T, E>>,
    next_id: u64,
    completion: Option<Completion<E>>,
}

impl<T, E> Default for Registry<T, E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            completion: None,
        }
    }
}

impl<T, E> Registry<T, E> {
    fn attach(&mut self, downstream: &Downstream<T, E>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            downstream: downstream.downgrade(),
        });
        id
    }

    fn detach(&mut self, id: u64) {
        self.entries.retain(|entry| entry.id != id);
    }
}

impl<T, E: Clone> Registry<T, E> {
    pub(crate) fn completion(&self) -> Option<Completion<E>> {
        self.completion.clone()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.completion.is_some()
    }

    /// Live subscribers in subscription order. Prunes dead entries.
    pub(crate) fn live(&mut self) -> Vec<Downstream<T, E>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|entry| match entry.downstream.upgrade() {
            Some(downstream) if downstream.is_active() => {
                live.push(downstream);
                true
            }
            _ => false,
        });
        live
    }

    /// Record the terminal event. Returns the subscribers to notify, or
    /// `None` if the subject was already terminated.
    pub(crate) fn terminate(&mut self, completion: Completion<E>) -> Option<Vec<Downstream<T, E>>> {
        if self.completion.is_some() {
            return None;
        }
        let live = self.live();
        self.entries.clear();
        self.completion = Some(completion);
        Some(live)
    }

    pub(crate) fn subscriber_count(&mut self) -> usize {
        self.live().len()
    }
}

/// Attach `downstream` to `registry`, or complete it on the spot if the
/// subject is already terminated.
pub(crate) fn attach<T: 'static, E: Clone + 'static>(
    registry: &Rc<RefCell<Registry<T, E>>>,
    downstream: Downstream<T, E>,
) -> Result<Subscription, (Downstream<T, E>, Completion<E>)> {
    let mut state = registry.borrow_mut();
    if let Some(completion) = state.completion() {
        drop(state);
        return Err((downstream, completion));
    }
    let id = state.attach(&downstream);
    trace!(subscriber = id, "subject subscriber attached");
    Ok(Subscription::from_cancellable(SubjectSubscription {
        registry: Rc::downgrade(registry),
        id,
        downstream,
    }))
}

/// Broadcast a value to a snapshot of the live subscribers. The registry
/// is not borrowed while sinks run, so they may send or subscribe.
pub(crate) fn broadcast<T: Clone, E: Clone>(registry: &RefCell<Registry<T, E>>, value: T) {
    let targets = registry.borrow_mut().live();
    for downstream in targets {
        downstream.send(value.clone());
    }
}

pub(crate) fn finish<T, E: Clone>(registry: &RefCell<Registry<T, E>>, completion: Completion<E>) {
    let Some(targets) = registry.borrow_mut().terminate(completion.clone()) else {
        return;
    };
    debug!(
        subscribers = targets.len(),
        failed = completion.is_failed(),
        "subject terminated"
    );
    for downstream in targets {
        downstream.complete(completion.clone());
    }
}

struct SubjectSubscription<T, E> {
    registry: Weak<RefCell<Registry<T, E>>>,
    id: u64,
    downstream: Downstream<T, E>,
}

impl<T, E> Cancellable for SubjectSubscription<T, E> {
    fn cancel(self: Box<Self>) {
        self.downstream.cancel();
        if let Some(registry) = self.registry.upgrade() {
            // A failed borrow means a broadcast is snapshotting; the dead
            // entry is pruned there instead.
            if let Ok(mut state) = registry.try_borrow_mut() {
                state.detach(self.id);
            }
        }
        trace!(subscriber = self.id, "subject subscriber detached");
    }

    fn is_active(&self) -> bool {
        self.downstream.is_active()
    }
}
