#![forbid(unsafe_code)]

//! RAII cancellation handles.
//!
//! A [`Subscription`] is the only thing keeping a pipeline alive. Dropping it
//! is the same as calling [`Subscription::cancel`]; a subscription that goes
//! out of scope immediately stops delivery. Owners that need several
//! pipelines alive collect them in a [`SubscriptionBag`].
//!
//! # Invariants
//!
//! 1. `cancel()` is idempotent.
//! 2. `cancel()` may be called from inside a callback of the pipeline it
//!    cancels.
//! 3. Drop and explicit cancel behave identically.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::logging::trace;

/// Something that can be torn down exactly once.
///
/// Implement this for handles of external operations so they can be wrapped
/// in a [`Subscription`].
pub trait Cancellable {
    /// Tear down. Consumes the handle, so it runs at most once.
    fn cancel(self: Box<Self>);

    /// Whether the underlying work can still deliver anything.
    fn is_active(&self) -> bool {
        true
    }
}

struct CancelFn<F>(F);

impl<F: FnOnce()> Cancellable for CancelFn<F> {
    fn cancel(self: Box<Self>) {
        (self.0)();
    }
}

/// Handle to one subscriber's attachment to one publisher.
///
/// The pipeline stays alive exactly as long as this value does.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    handle: Option<Box<dyn Cancellable>>,
}

impl Subscription {
    /// Wrap a cancel closure. It runs on the first `cancel()` or on drop.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self::from_cancellable(CancelFn(cancel))
    }

    /// Wrap any [`Cancellable`].
    pub fn from_cancellable(handle: impl Cancellable + 'static) -> Self {
        Self {
            handle: Some(Box::new(handle)),
        }
    }

    /// A subscription with nothing left to cancel.
    pub fn empty() -> Self {
        Self { handle: None }
    }

    /// Stop delivery and release the pipeline. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!("subscription cancelled");
            handle.cancel();
        }
    }

    /// `false` once cancelled, or once the pipeline has completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.is_active())
    }

    /// Move this subscription into an owner's bag.
    pub fn store(self, bag: &mut SubscriptionBag) {
        bag.insert(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owner-side collection of subscriptions.
///
/// Everything stored is cancelled when the bag is dropped or
/// [`cancel_all`](Self::cancel_all) is called.
#[derive(Debug, Default)]
pub struct SubscriptionBag {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of stored subscriptions whose pipelines can still deliver.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    /// Cancel and forget everything stored.
    pub fn cancel_all(&mut self) {
        // Cancel in insertion order, outside the borrow of the vector.
        let drained = std::mem::take(&mut self.subscriptions);
        drop(drained);
    }
}

impl Extend<Subscription> for SubscriptionBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

// ---------------------------------------------------------------------------
// UpstreamLink
// ---------------------------------------------------------------------------

struct LinkState {
    subscription: RefCell<Option<Subscription>>,
    released: Cell<bool>,
}

/// Slot holding an operator stage's upstream subscription.
///
/// The strong handle lives in the [`Subscription`] returned to the caller;
/// the stage's sink holds a [`WeakUpstreamLink`] so it can release its own
/// upstream on failure without keeping the pipeline alive.
pub(crate) struct UpstreamLink {
    state: Rc<LinkState>,
}

impl UpstreamLink {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(LinkState {
                subscription: RefCell::new(None),
                released: Cell::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakUpstreamLink {
        WeakUpstreamLink {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Store the upstream subscription. If the stage already terminated
    /// while subscribing, the subscription is dropped on the spot.
    pub(crate) fn attach(&self, subscription: Subscription) {
        if self.state.released.get() {
            drop(subscription);
            return;
        }
        let previous = self.state.subscription.borrow_mut().replace(subscription);
        drop(previous);
    }

    pub(crate) fn release(&self) {
        release(&self.state);
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.state.released.get()
            && self
                .state
                .subscription
                .try_borrow()
                .map(|slot| slot.as_ref().is_some_and(Subscription::is_active))
                .unwrap_or(true)
    }
}

impl Cancellable for UpstreamLink {
    fn cancel(self: Box<Self>) {
        self.release();
    }

    fn is_active(&self) -> bool {
        UpstreamLink::is_active(self)
    }
}

/// Non-owning handle to an [`UpstreamLink`].
pub(crate) struct WeakUpstreamLink {
    state: Weak<LinkState>,
}

impl WeakUpstreamLink {
    pub(crate) fn release(&self) {
        if let Some(state) = self.state.upgrade() {
            release(&state);
        }
    }
}

fn release(state: &LinkState) {
    state.released.set(true);
    let taken = state.subscription.borrow_mut().take();
    drop(taken);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counting() -> (Subscription, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (Subscription::new(move || c.set(c.get() + 1)), count)
    }

    #[test]
    fn cancel_runs_once() {
        let (mut sub, count) = counting();
        assert!(sub.is_active());
        sub.cancel();
        sub.cancel();
        assert_eq!(count.get(), 1);
        assert!(!sub.is_active());
        drop(sub);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn drop_cancels() {
        let (sub, count) = counting();
        drop(sub);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn empty_is_inactive() {
        let mut sub = Subscription::empty();
        assert!(!sub.is_active());
        sub.cancel();
    }

    #[test]
    fn bag_cancels_on_drop() {
        let (a, count_a) = counting();
        let (b, count_b) = counting();
        let mut bag = SubscriptionBag::new();
        a.store(&mut bag);
        bag.insert(b);
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.active_count(), 2);
        drop(bag);
        assert_eq!(count_a.get(), 1);
        assert_eq!(count_b.get(), 1);
    }

    #[test]
    fn bag_cancel_all_empties() {
        let (a, count) = counting();
        let mut bag = SubscriptionBag::new();
        bag.extend([a]);
        bag.cancel_all();
        assert!(bag.is_empty());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn link_release_cancels_attached() {
        let (sub, count) = counting();
        let link = UpstreamLink::new();
        link.attach(sub);
        assert!(link.is_active());
        link.downgrade().release();
        assert_eq!(count.get(), 1);
        assert!(!link.is_active());
    }

    #[test]
    fn link_released_before_attach_drops_immediately() {
        let (sub, count) = counting();
        let link = UpstreamLink::new();
        link.release();
        link.attach(sub);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn weak_link_is_inert_after_owner_drop() {
        let (sub, count) = counting();
        let link = UpstreamLink::new();
        let weak = link.downgrade();
        link.attach(sub);
        drop(link);
        assert_eq!(count.get(), 1);
        weak.release();
        assert_eq!(count.get(), 1);
    }
}
