#![forbid(unsafe_code)]

//! `flat_map`: chain publishers.
//!
//! # Ordering policy
//!
//! Inner publishers are **serialized**. The inner publisher for outer value
//! `N + 1` is not created until the inner publisher for value `N` has
//! finished; outer values that arrive in the meantime wait in a FIFO
//! buffer. Downstream therefore sees the inner sequences back to back, in
//! outer order, never interleaved.
//!
//! An inner publisher that never completes holds back every later outer
//! value for as long as the subscription lives.
//!
//! # Failure
//!
//! A failure from the outer publisher or from the active inner publisher is
//! forwarded once, the buffer is discarded and both upstream subscriptions
//! are released.
//!
//! # Ownership
//!
//! The shared stage state is owned only by the returned [`Subscription`].
//! The sinks attached to the outer and inner publishers hold `Weak`
//! references back to it, so no reference cycle forms through the
//! subscriptions the state itself stores.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::completion::Completion;
use crate::logging::trace;
use crate::publisher::Publisher;
use crate::sink::{Downstream, Sink};
use crate::subscription::{Cancellable, Subscription, UpstreamLink};

/// Subscribes to the publisher produced for each upstream value and
/// forwards its events downstream.
pub struct FlatMap<P, F> {
    upstream: P,
    transform: Rc<F>,
}

impl<P, F> FlatMap<P, F> {
    pub(crate) fn new(upstream: P, transform: F) -> Self {
        Self {
            upstream,
            transform: Rc::new(transform),
        }
    }
}

impl<P: Clone, F> Clone for FlatMap<P, F> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<P: fmt::Debug, F> fmt::Debug for FlatMap<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMap")
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

impl<P, F, Q> Publisher for FlatMap<P, F>
where
    P: Publisher,
    F: Fn(P::Output) -> Q + 'static,
    Q: Publisher<Failure = P::Failure> + 'static,
{
    type Output = Q::Output;
    type Failure = P::Failure;

    fn subscribe_sink(&self, sink: Box<dyn Sink<Q::Output, P::Failure>>) -> Subscription {
        let state: Rc<FlatMapState<P::Output, F, Q>> = Rc::new(FlatMapState {
            transform: Rc::clone(&self.transform),
            downstream: Downstream::new(sink),
            outer: UpstreamLink::new(),
            inner: RefCell::new(None),
            active_inner: Cell::new(None),
            next_inner: Cell::new(0),
            buffered: RefCell::new(VecDeque::new()),
            outer_finished: Cell::new(false),
            pumping: Cell::new(false),
        });
        let outer = self.upstream.subscribe_sink(Box::new(OuterSink {
            state: Rc::downgrade(&state),
        }));
        state.outer.attach(outer);
        Subscription::from_cancellable(FlatMapSubscription { state })
    }
}

struct FlatMapState<T, F, Q: Publisher> {
    transform: Rc<F>,
    downstream: Downstream<Q::Output, Q::Failure>,
    outer: UpstreamLink,
    /// Subscription to the active inner publisher, once `subscribe_sink`
    /// has returned it.
    inner: RefCell<Option<Subscription>>,
    /// Id of the inner publisher currently allowed to deliver.
    active_inner: Cell<Option<u64>>,
    next_inner: Cell<u64>,
    /// Outer values waiting for the active inner publisher to finish.
    buffered: RefCell<VecDeque<T>>,
    outer_finished: Cell<bool>,
    /// Re-entrancy guard for `pump`.
    pumping: Cell<bool>,
}

impl<T, F, Q> FlatMapState<T, F, Q>
where
    T: 'static,
    F: Fn(T) -> Q + 'static,
    Q: Publisher + 'static,
{
    fn enqueue(self: &Rc<Self>, value: T) {
        if !self.downstream.is_active() {
            return;
        }
        self.buffered.borrow_mut().push_back(value);
        self.pump();
    }

    /// Start inner publishers until one stays active or the buffer is
    /// empty. Inner publishers that complete synchronously while being
    /// subscribed simply let the loop continue.
    fn pump(self: &Rc<Self>) {
        if self.pumping.get() {
            return;
        }
        self.pumping.set(true);
        loop {
            if !self.downstream.is_active() || self.active_inner.get().is_some() {
                break;
            }
            let Some(value) = self.buffered.borrow_mut().pop_front() else {
                break;
            };
            let id = self.next_inner.get();
            self.next_inner.set(id + 1);
            self.active_inner.set(Some(id));
            trace!(inner = id, "flat_map inner publisher started");

            let publisher = (self.transform)(value);
            let subscription = publisher.subscribe_sink(Box::new(InnerSink {
                state: Rc::downgrade(self),
                id,
            }));
            if self.active_inner.get() == Some(id) {
                let previous = self.inner.borrow_mut().replace(subscription);
                drop(previous);
            } else {
                drop(subscription);
            }
        }
        self.pumping.set(false);
        self.finish_if_drained();
    }

    fn finish_if_drained(&self) {
        if self.downstream.is_active()
            && self.outer_finished.get()
            && self.active_inner.get().is_none()
            && self.buffered.borrow().is_empty()
        {
            self.downstream.complete(Completion::Finished);
            self.release();
        }
    }

    fn outer_completed(self: &Rc<Self>, completion: Completion<Q::Failure>) {
        match completion {
            Completion::Finished => {
                self.outer_finished.set(true);
                if !self.pumping.get() {
                    self.finish_if_drained();
                }
            }
            Completion::Failed(error) => self.fail(error),
        }
    }

    fn inner_value(&self, id: u64, value: Q::Output) {
        if self.active_inner.get() == Some(id) {
            self.downstream.send(value);
        }
    }

    fn inner_completed(self: &Rc<Self>, id: u64, completion: Completion<Q::Failure>) {
        if self.active_inner.get() != Some(id) {
            return;
        }
        match completion {
            Completion::Finished => {
                self.active_inner.set(None);
                let finished = self.inner.borrow_mut().take();
                drop(finished);
                self.pump();
            }
            Completion::Failed(error) => self.fail(error),
        }
    }

    fn fail(&self, error: Q::Failure) {
        if !self.downstream.is_active() {
            return;
        }
        self.discard_buffer();
        self.active_inner.set(None);
        self.downstream.complete(Completion::Failed(error));
        self.release();
    }

    fn cancel(&self) {
        self.downstream.cancel();
        self.discard_buffer();
        self.active_inner.set(None);
        self.release();
    }

    fn discard_buffer(&self) {
        let dropped = std::mem::take(&mut *self.buffered.borrow_mut());
        drop(dropped);
    }

    fn release(&self) {
        let inner = self.inner.borrow_mut().take();
        drop(inner);
        self.outer.release();
    }
}

struct OuterSink<T, F, Q: Publisher> {
    state: Weak<FlatMapState<T, F, Q>>,
}

impl<T, F, Q> Sink<T, Q::Failure> for OuterSink<T, F, Q>
where
    T: 'static,
    F: Fn(T) -> Q + 'static,
    Q: Publisher + 'static,
{
    fn receive(&mut self, value: T) {
        if let Some(state) = self.state.upgrade() {
            state.enqueue(value);
        }
    }

    fn receive_completion(&mut self, completion: Completion<Q::Failure>) {
        if let Some(state) = self.state.upgrade() {
            state.outer_completed(completion);
        }
    }

    fn is_wanted(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.downstream.is_active())
    }
}

struct InnerSink<T, F, Q: Publisher> {
    state: Weak<FlatMapState<T, F, Q>>,
    id: u64,
}

impl<T, F, Q> Sink<Q::Output, Q::Failure> for InnerSink<T, F, Q>
where
    T: 'static,
    F: Fn(T) -> Q + 'static,
    Q: Publisher + 'static,
{
    fn receive(&mut self, value: Q::Output) {
        if let Some(state) = self.state.upgrade() {
            state.inner_value(self.id, value);
        }
    }

    fn receive_completion(&mut self, completion: Completion<Q::Failure>) {
        if let Some(state) = self.state.upgrade() {
            state.inner_completed(self.id, completion);
        }
    }
}

struct FlatMapSubscription<T, F, Q: Publisher> {
    state: Rc<FlatMapState<T, F, Q>>,
}

impl<T, F, Q> Cancellable for FlatMapSubscription<T, F, Q>
where
    T: 'static,
    F: Fn(T) -> Q + 'static,
    Q: Publisher + 'static,
{
    fn cancel(self: Box<Self>) {
        self.state.cancel();
    }

    fn is_active(&self) -> bool {
        self.state.downstream.is_active()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
