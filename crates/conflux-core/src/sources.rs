#![forbid(unsafe_code)]

//! Cold source publishers.
//!
//! Each source starts its work on `subscribe`, never at construction, so
//! subscribing twice runs the work twice.
//!
//! [`FuturePublisher`] adapts a callback-style asynchronous operation. The
//! operation receives a one-shot [`Promise`]; because the promise is
//! consumed on use and nothing here is `Send`, a subscription can only ever
//! be completed once, from the thread that owns it.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::completion::{Completion, Never};
use crate::publisher::Publisher;
use crate::sink::{Downstream, Sink};
use crate::subscription::{Cancellable, Subscription};

/// Emits one value, then finishes.
#[derive(Debug, Clone)]
pub struct Just<T> {
    value: T,
}

impl<T: Clone + 'static> Just<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + 'static> Publisher for Just<T> {
    type Output = T;
    type Failure = Never;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, Never>>) -> Subscription {
        let downstream = Downstream::new(sink);
        downstream.send(self.value.clone());
        downstream.complete(Completion::Finished);
        Subscription::from_cancellable(downstream)
    }
}

/// Fails immediately without emitting a value.
pub struct Fail<T, E> {
    error: E,
    _output: PhantomData<fn() -> T>,
}

impl<T: 'static, E: Clone + 'static> Fail<T, E> {
    pub fn new(error: E) -> Self {
        Self {
            error,
            _output: PhantomData,
        }
    }
}

impl<T, E: Clone> Clone for Fail<T, E> {
    fn clone(&self) -> Self {
        Self {
            error: self.error.clone(),
            _output: PhantomData,
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for Fail<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fail").field("error", &self.error).finish()
    }
}

impl<T: 'static, E: Clone + 'static> Publisher for Fail<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        let downstream = Downstream::new(sink);
        downstream.complete(Completion::Failed(self.error.clone()));
        Subscription::from_cancellable(downstream)
    }
}

/// Emits nothing. Finishes immediately unless built with [`Empty::never`].
pub struct Empty<T, E> {
    complete_immediately: bool,
    _types: PhantomData<fn() -> (T, E)>,
}

impl<T: 'static, E: 'static> Empty<T, E> {
    pub fn new() -> Self {
        Self {
            complete_immediately: true,
            _types: PhantomData,
        }
    }

    /// An empty publisher that never completes; it stays active until
    /// cancelled.
    pub fn never() -> Self {
        Self {
            complete_immediately: false,
            _types: PhantomData,
        }
    }
}

impl<T: 'static, E: 'static> Default for Empty<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Empty<T, E> {
    fn clone(&self) -> Self {
        Self {
            complete_immediately: self.complete_immediately,
            _types: PhantomData,
        }
    }
}

impl<T, E> fmt::Debug for Empty<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Empty")
            .field("complete_immediately", &self.complete_immediately)
            .finish()
    }
}

impl<T: 'static, E: 'static> Publisher for Empty<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        let downstream = Downstream::new(sink);
        if self.complete_immediately {
            downstream.complete(Completion::Finished);
        }
        Subscription::from_cancellable(downstream)
    }
}

/// Replays a fixed list of values, then finishes.
#[derive(Debug)]
pub struct Sequence<T> {
    values: Rc<[T]>,
}

impl<T: Clone + 'static> Sequence<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        values.into_iter().collect()
    }
}

impl<T> Clone for Sequence<T> {
    fn clone(&self) -> Self {
        Self {
            values: Rc::clone(&self.values),
        }
    }
}

impl<T: Clone + 'static> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T: Clone + 'static> Publisher for Sequence<T> {
    type Output = T;
    type Failure = Never;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, Never>>) -> Subscription {
        let downstream = Downstream::new(sink);
        for value in self.values.iter() {
            if !downstream.is_active() {
                break;
            }
            downstream.send(value.clone());
        }
        downstream.complete(Completion::Finished);
        Subscription::from_cancellable(downstream)
    }
}

// ---------------------------------------------------------------------------
// FuturePublisher
// ---------------------------------------------------------------------------

/// One-shot completion handle passed to a [`FuturePublisher`] operation.
pub struct Promise<T, E> {
    downstream: Downstream<T, E>,
}

impl<T, E> Promise<T, E> {
    /// Deliver the operation's result: a value followed by `Finished`, or a
    /// single `Failed`. Ignored if the subscription was cancelled.
    pub fn complete(self, result: Result<T, E>) {
        match result {
            Ok(value) => {
                self.downstream.send(value);
                self.downstream.complete(Completion::Finished);
            }
            Err(error) => self.downstream.complete(Completion::Failed(error)),
        }
    }

    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn reject(self, error: E) {
        self.complete(Err(error));
    }

    /// Whether delivering now would reach a sink.
    #[must_use]
    pub fn is_wanted(&self) -> bool {
        self.downstream.is_active()
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("wanted", &self.is_wanted())
            .finish()
    }
}

type StartFn<T, E> = dyn Fn(Promise<T, E>) -> Subscription;

/// Wraps an external asynchronous operation as a publisher.
///
/// `start` runs once per subscription. It returns the operation's own
/// cancel handle, which is released when the subscription is cancelled.
/// Cancelling does not interrupt an operation already in flight; it only
/// guarantees the eventual result is discarded.
pub struct FuturePublisher<T, E> {
    start: Rc<StartFn<T, E>>,
}

impl<T: 'static, E: 'static> FuturePublisher<T, E> {
    pub fn new(start: impl Fn(Promise<T, E>) -> Subscription + 'static) -> Self {
        Self {
            start: Rc::new(start),
        }
    }
}

impl<T, E> Clone for FuturePublisher<T, E> {
    fn clone(&self) -> Self {
        Self {
            start: Rc::clone(&self.start),
        }
    }
}

impl<T, E> fmt::Debug for FuturePublisher<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuturePublisher").finish_non_exhaustive()
    }
}

struct FutureSubscription<T, E> {
    downstream: Downstream<T, E>,
    operation: Subscription,
}

impl<T, E> Cancellable for FutureSubscription<T, E> {
    fn cancel(self: Box<Self>) {
        let FutureSubscription {
            downstream,
            mut operation,
        } = *self;
        downstream.cancel();
        operation.cancel();
    }

    fn is_active(&self) -> bool {
        self.downstream.is_active()
    }
}

impl<T: 'static, E: 'static> Publisher for FuturePublisher<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        let downstream = Downstream::new(sink);
        let operation = (self.start)(Promise {
            downstream: downstream.clone(),
        });
        Subscription::from_cancellable(FutureSubscription {
            downstream,
            operation,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
