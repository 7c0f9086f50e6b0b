#![forbid(unsafe_code)]

//! `set_failure_type`: relabel a publisher that cannot fail.

use std::fmt;
use std::marker::PhantomData;

use crate::completion::{Completion, Never};
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::subscription::Subscription;

/// Gives a `Failure = Never` publisher a concrete failure type so it can
/// feed a chain that can fail. Purely a type-level bridge: it never
/// produces a failure and adds no per-value work.
pub struct SetFailureType<P, E> {
    upstream: P,
    _failure: PhantomData<fn() -> E>,
}

impl<P, E> SetFailureType<P, E> {
    pub(crate) fn new(upstream: P) -> Self {
        Self {
            upstream,
            _failure: PhantomData,
        }
    }
}

impl<P: Clone, E> Clone for SetFailureType<P, E> {
    fn clone(&self) -> Self {
        Self::new(self.upstream.clone())
    }
}

impl<P: fmt::Debug, E> fmt::Debug for SetFailureType<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetFailureType")
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl<P, E> Publisher for SetFailureType<P, E>
where
    P: Publisher<Failure = Never>,
    E: 'static,
{
    type Output = P::Output;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<P::Output, E>>) -> Subscription {
        self.upstream.subscribe_sink(Box::new(Relabel { downstream: sink }))
    }
}

struct Relabel<T, E> {
    downstream: Box<dyn Sink<T, E>>,
}

impl<T, E> Sink<T, Never> for Relabel<T, E> {
    fn receive(&mut self, value: T) {
        self.downstream.receive(value);
    }

    fn receive_completion(&mut self, completion: Completion<Never>) {
        self.downstream.receive_completion(completion.relabel());
    }

    fn is_wanted(&self) -> bool {
        self.downstream.is_wanted()
    }
}
