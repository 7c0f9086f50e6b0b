#![forbid(unsafe_code)]

//! Terminal consumers and the per-subscription delivery path.
//!
//! # Design
//!
//! Every subscription owns exactly one [`Downstream`]: a reference-counted
//! cell holding the boxed [`Sink`] plus a small event queue. All events for
//! that subscription go through [`Downstream::send`] or
//! [`Downstream::complete`], which gives one place to enforce the delivery
//! contract.
//!
//! # Invariants
//!
//! 1. At most one completion reaches the sink, and nothing after it.
//! 2. Nothing reaches the sink once [`Downstream::cancel`] has returned.
//! 3. Callbacks never nest: an event raised while the sink is running a
//!    callback is queued and delivered after that callback returns.
//! 4. The sink (and everything its closures captured) is dropped as soon as
//!    the subscription completes or is cancelled.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::completion::Completion;
use crate::subscription::Cancellable;

/// Consumer of a publisher's values and its single completion.
pub trait Sink<T, E> {
    /// Called once per produced value, in production order.
    fn receive(&mut self, value: T);

    /// Called at most once, after the last value.
    fn receive_completion(&mut self, completion: Completion<E>);

    /// Whether this sink still accepts values. An operator stage that has
    /// already terminated its own downstream returns `false`, and the
    /// delivery path feeding it stops as if cancelled.
    fn is_wanted(&self) -> bool {
        true
    }
}

impl<T, E, S: Sink<T, E> + ?Sized> Sink<T, E> for Box<S> {
    fn receive(&mut self, value: T) {
        (**self).receive(value);
    }

    fn receive_completion(&mut self, completion: Completion<E>) {
        (**self).receive_completion(completion);
    }

    fn is_wanted(&self) -> bool {
        (**self).is_wanted()
    }
}

/// A [`Sink`] built from a value closure and a completion closure.
pub struct ClosureSink<FV, FC> {
    on_value: FV,
    on_completion: Option<FC>,
}

impl<FV, FC> ClosureSink<FV, FC> {
    pub fn new(on_value: FV, on_completion: FC) -> Self {
        Self {
            on_value,
            on_completion: Some(on_completion),
        }
    }
}

impl<FV, FC> fmt::Debug for ClosureSink<FV, FC> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureSink")
            .field("completed", &self.on_completion.is_none())
            .finish()
    }
}

impl<T, E, FV, FC> Sink<T, E> for ClosureSink<FV, FC>
where
    FV: FnMut(T),
    FC: FnOnce(Completion<E>),
{
    fn receive(&mut self, value: T) {
        (self.on_value)(value);
    }

    fn receive_completion(&mut self, completion: Completion<E>) {
        if let Some(on_completion) = self.on_completion.take() {
            on_completion(completion);
        }
    }
}

// ---------------------------------------------------------------------------
// Downstream
// ---------------------------------------------------------------------------

enum Event<T, E> {
    Value(T),
    Completion(Completion<E>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    /// A completion has been accepted; queued events may still drain.
    Terminated,
    Cancelled,
}

struct DownstreamInner<T, E> {
    sink: RefCell<Option<Box<dyn Sink<T, E>>>>,
    pending: RefCell<VecDeque<Event<T, E>>>,
    phase: Cell<Phase>,
    /// True while a sink callback is on the stack.
    delivering: Cell<bool>,
}

/// The single delivery path of one subscription.
///
/// Cloning creates another handle to the **same** path.
pub(crate) struct Downstream<T, E> {
    inner: Rc<DownstreamInner<T, E>>,
}

impl<T, E> Clone for Downstream<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Downstream<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downstream")
            .field("phase", &self.inner.phase.get())
            .field("delivering", &self.inner.delivering.get())
            .finish()
    }
}

impl<T, E> Downstream<T, E> {
    pub(crate) fn new(sink: Box<dyn Sink<T, E>>) -> Self {
        Self {
            inner: Rc::new(DownstreamInner {
                sink: RefCell::new(Some(sink)),
                pending: RefCell::new(VecDeque::new()),
                phase: Cell::new(Phase::Active),
                delivering: Cell::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDownstream<T, E> {
        WeakDownstream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether further events will be accepted.
    pub(crate) fn is_active(&self) -> bool {
        if self.inner.phase.get() != Phase::Active {
            return false;
        }
        // While a callback runs the sink is borrowed; the drain loop
        // re-checks it as soon as the callback returns.
        self.inner
            .sink
            .try_borrow()
            .map_or(true, |slot| slot.as_ref().is_some_and(|sink| sink.is_wanted()))
    }

    pub(crate) fn send(&self, value: T) {
        self.push(Event::Value(value));
    }

    pub(crate) fn complete(&self, completion: Completion<E>) {
        self.push(Event::Completion(completion));
    }

    /// Detach the sink. Idempotent, and safe to call from inside one of the
    /// sink's own callbacks.
    pub(crate) fn cancel(&self) {
        if self.inner.phase.get() == Phase::Cancelled {
            return;
        }
        self.inner.phase.set(Phase::Cancelled);
        let dropped = std::mem::take(&mut *self.inner.pending.borrow_mut());
        drop(dropped);
        if !self.inner.delivering.get() {
            self.release_sink();
        }
    }

    fn push(&self, event: Event<T, E>) {
        if self.inner.phase.get() != Phase::Active {
            return;
        }
        if matches!(event, Event::Completion(_)) {
            self.inner.phase.set(Phase::Terminated);
        }
        self.inner.pending.borrow_mut().push_back(event);
        if self.inner.delivering.get() {
            // The callback currently on the stack drains it when it returns.
            return;
        }
        self.drain();
    }

    fn drain(&self) {
        self.inner.delivering.set(true);
        loop {
            if self.inner.phase.get() == Phase::Cancelled {
                break;
            }
            let Some(event) = self.inner.pending.borrow_mut().pop_front() else {
                break;
            };
            let mut slot = self.inner.sink.borrow_mut();
            let Some(sink) = slot.as_mut() else {
                break;
            };
            match event {
                Event::Value(value) => sink.receive(value),
                Event::Completion(completion) => sink.receive_completion(completion),
            }
            if !sink.is_wanted() && self.inner.phase.get() != Phase::Cancelled {
                self.inner.phase.set(Phase::Cancelled);
            }
        }
        self.inner.delivering.set(false);

        if self.inner.phase.get() != Phase::Active {
            let dropped = std::mem::take(&mut *self.inner.pending.borrow_mut());
            drop(dropped);
            self.release_sink();
        }
    }

    fn release_sink(&self) {
        // Take first, drop after the borrow ends: the sink's destructor may
        // cancel other subscriptions.
        let released = self.inner.sink.borrow_mut().take();
        drop(released);
    }
}

impl<T, E> Cancellable for Downstream<T, E> {
    fn cancel(self: Box<Self>) {
        Downstream::cancel(&self);
    }

    fn is_active(&self) -> bool {
        Downstream::is_active(self)
    }
}

/// Non-owning handle to a [`Downstream`], held by publishers.
pub(crate) struct WeakDownstream<T, E> {
    inner: Weak<DownstreamInner<T, E>>,
}

impl<T, E> Clone for WeakDownstream<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T, E> WeakDownstream<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Downstream<T, E>> {
        self.inner.upgrade().map(|inner| Downstream { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
