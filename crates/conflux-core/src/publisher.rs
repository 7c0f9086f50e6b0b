#![forbid(unsafe_code)]

//! The publisher capability and its composition surface.
//!
//! [`Publisher`] is deliberately tiny and object safe: one method that
//! attaches a boxed [`Sink`] and hands back a [`Subscription`]. Everything
//! else (operators, closure sinks, type erasure) lives on [`PublisherExt`],
//! which every publisher gets for free.
//!
//! Operators wrap their upstream by value. Subjects are cheap handles, so
//! clone one to build a chain and keep the original for `send`.

use std::fmt;
use std::rc::Rc;

use crate::completion::{Completion, Never};
use crate::operators::decode::{Decode, Decoder};
use crate::operators::flat_map::FlatMap;
use crate::operators::map::Map;
use crate::operators::map_err::MapErr;
use crate::operators::set_failure_type::SetFailureType;
use crate::operators::try_map::TryMap;
use crate::sink::{ClosureSink, Sink};
use crate::subscription::Subscription;

/// A lazy producer of zero or more values followed by at most one
/// [`Completion`].
///
/// `subscribe_sink` never fails; failures travel as
/// [`Completion::Failed`]. Cold publishers start their work on every call.
pub trait Publisher {
    type Output: 'static;
    type Failure: 'static;

    /// Attach `sink`. Delivery may start before this returns.
    fn subscribe_sink(&self, sink: Box<dyn Sink<Self::Output, Self::Failure>>) -> Subscription;
}

impl<P: Publisher + ?Sized> Publisher for Rc<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe_sink(&self, sink: Box<dyn Sink<Self::Output, Self::Failure>>) -> Subscription {
        (**self).subscribe_sink(sink)
    }
}

/// Operators and sinks available on every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
    /// Attach any [`Sink`].
    fn subscribe<S>(&self, sink: S) -> Subscription
    where
        S: Sink<Self::Output, Self::Failure> + 'static,
    {
        self.subscribe_sink(Box::new(sink))
    }

    /// Attach a closure pair: `on_completion` runs at most once.
    fn sink<FC, FV>(&self, on_completion: FC, on_value: FV) -> Subscription
    where
        FC: FnOnce(Completion<Self::Failure>) + 'static,
        FV: FnMut(Self::Output) + 'static,
    {
        self.subscribe(ClosureSink::new(on_value, on_completion))
    }

    /// Attach a value closure to a publisher that cannot fail.
    fn sink_value<FV>(&self, on_value: FV) -> Subscription
    where
        Self: Publisher<Failure = Never>,
        FV: FnMut(Self::Output) + 'static,
    {
        self.subscribe(ClosureSink::new(on_value, |_: Completion<Never>| {}))
    }

    /// Transform every value. Failures pass through untouched.
    fn map<U, F>(self, transform: F) -> Map<Self, F>
    where
        F: Fn(Self::Output) -> U + 'static,
        U: 'static,
    {
        Map::new(self, transform)
    }

    /// Transform the failure. Values pass through untouched.
    fn map_err<E, F>(self, transform: F) -> MapErr<Self, F>
    where
        F: Fn(Self::Failure) -> E + 'static,
        E: 'static,
    {
        MapErr::new(self, transform)
    }

    /// Fallible transform. An `Err` becomes the chain's failure and
    /// releases the upstream.
    fn try_map<U, F>(self, transform: F) -> TryMap<Self, F>
    where
        F: Fn(Self::Output) -> Result<U, Self::Failure> + 'static,
        U: 'static,
    {
        TryMap::new(self, transform)
    }

    /// Subscribe to the publisher produced for each value and forward its
    /// events. Inner publishers run one at a time, in outer order.
    fn flat_map<Q, F>(self, transform: F) -> FlatMap<Self, F>
    where
        F: Fn(Self::Output) -> Q + 'static,
        Q: Publisher<Failure = Self::Failure> + 'static,
    {
        FlatMap::new(self, transform)
    }

    /// Relabel a publisher that cannot fail with a concrete failure type.
    fn set_failure_type<E>(self) -> SetFailureType<Self, E>
    where
        Self: Publisher<Failure = Never>,
        E: 'static,
    {
        SetFailureType::new(self)
    }

    /// Decode raw byte payloads with `decoder`.
    fn decode<D>(self, decoder: D) -> Decode<Self, D>
    where
        Self::Output: AsRef<[u8]>,
        D: Decoder + 'static,
        D::Output: 'static,
        Self::Failure: From<D::Error>,
    {
        Decode::new(self, decoder)
    }

    /// Erase the concrete operator type.
    fn boxed(self) -> AnyPublisher<Self::Output, Self::Failure>
    where
        Self: 'static,
    {
        AnyPublisher::new(self)
    }
}

impl<P: Publisher> PublisherExt for P {}

/// A cloneable, type-erased publisher.
pub struct AnyPublisher<T, E> {
    inner: Rc<dyn Publisher<Output = T, Failure = E>>,
}

impl<T: 'static, E: 'static> AnyPublisher<T, E> {
    pub fn new(publisher: impl Publisher<Output = T, Failure = E> + 'static) -> Self {
        Self {
            inner: Rc::new(publisher),
        }
    }
}

impl<T, E> Clone for AnyPublisher<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for AnyPublisher<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyPublisher").finish_non_exhaustive()
    }
}

impl<T: 'static, E: 'static> Publisher for AnyPublisher<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        self.inner.subscribe_sink(sink)
    }
}
