#![forbid(unsafe_code)]

//! `try_map`: fallible value transform.

use std::rc::Rc;

use crate::completion::Completion;
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::subscription::{Subscription, UpstreamLink, WeakUpstreamLink};

/// Applies a fallible transform. The first `Err` is forwarded as the
/// chain's failure and the upstream subscription is released, so nothing
/// further is produced on its behalf.
pub struct TryMap<P, F> {
    upstream: P,
    transform: Rc<F>,
}

impl<P, F> TryMap<P, F> {
    pub(crate) fn new(upstream: P, transform: F) -> Self {
        Self {
            upstream,
            transform: Rc::new(transform),
        }
    }
}

impl<P: Clone, F> Clone for TryMap<P, F> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<P, F, U> Publisher for TryMap<P, F>
where
    P: Publisher,
    F: Fn(P::Output) -> Result<U, P::Failure> + 'static,
    U: 'static,
{
    type Output = U;
    type Failure = P::Failure;

    fn subscribe_sink(&self, sink: Box<dyn Sink<U, P::Failure>>) -> Subscription {
        subscribe_fallible(&self.upstream, Rc::clone(&self.transform), sink)
    }
}

/// Subscribe `upstream` through a fallible transform. Shared with
/// [`Decode`](super::decode::Decode).
pub(crate) fn subscribe_fallible<P, F, U>(
    upstream: &P,
    transform: Rc<F>,
    sink: Box<dyn Sink<U, P::Failure>>,
) -> Subscription
where
    P: Publisher + ?Sized,
    F: Fn(P::Output) -> Result<U, P::Failure> + 'static,
    U: 'static,
{
    let link = UpstreamLink::new();
    let subscription = upstream.subscribe_sink(Box::new(TryMapSink {
        transform,
        downstream: sink,
        upstream: link.downgrade(),
        failed: false,
    }));
    link.attach(subscription);
    Subscription::from_cancellable(link)
}

struct TryMapSink<F, U, E> {
    transform: Rc<F>,
    downstream: Box<dyn Sink<U, E>>,
    upstream: WeakUpstreamLink,
    failed: bool,
}

impl<T, U, E, F> Sink<T, E> for TryMapSink<F, U, E>
where
    F: Fn(T) -> Result<U, E>,
{
    fn receive(&mut self, value: T) {
        if self.failed {
            return;
        }
        match (self.transform)(value) {
            Ok(mapped) => self.downstream.receive(mapped),
            Err(error) => {
                self.failed = true;
                self.downstream.receive_completion(Completion::Failed(error));
                self.upstream.release();
            }
        }
    }

    fn receive_completion(&mut self, completion: Completion<E>) {
        if !self.failed {
            self.downstream.receive_completion(completion);
        }
    }

    fn is_wanted(&self) -> bool {
        !self.failed && self.downstream.is_wanted()
    }
}
