#![forbid(unsafe_code)]

//! Single-threaded reactive streams: publishers, subjects, operators and
//! RAII subscriptions.
//!
//! - [`Publisher`]: a lazy description of a value sequence terminated by a
//!   [`Completion`]. Every `subscribe` runs the work independently.
//! - [`Sink`]: the terminal consumer of values and completion.
//! - [`Subscription`]: RAII guard that cancels on drop. Keep it alive to
//!   keep the pipeline alive.
//! - [`PassthroughSubject`] / [`CurrentValueSubject`]: bridges from
//!   imperative code into a pipeline.
//! - Operators on [`PublisherExt`]: `map`, `map_err`, `try_map`,
//!   `flat_map`, `set_failure_type`, `decode`.
//!
//! # Architecture
//!
//! Shared state uses `Rc<RefCell<..>>`; nothing here is `Send`. Every
//! subscription has exactly one delivery path (an internal `Downstream`)
//! which owns the sink, enforces the sticky terminal state and serializes
//! re-entrant deliveries. Publishers only ever hold `Weak` references to
//! that path, so a sink lives exactly as long as its [`Subscription`].
//!
//! # Invariants
//!
//! 1. A sink never observes an event after its completion.
//! 2. A sink never observes an event after `cancel()` returns.
//! 3. Subscribers of a subject are notified in registration order.
//! 4. Dropping a [`Subscription`] is identical to cancelling it.
//! 5. The first failure anywhere in a chain terminates the chain; no value
//!    downstream of the failure point is delivered afterwards.
//!
//! # Example
//!
//! ```
//! use conflux_core::{PassthroughSubject, PublisherExt, Never};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let subject = PassthroughSubject::<i32, Never>::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink_seen = Rc::clone(&seen);
//! let subscription = subject
//!     .clone()
//!     .map(|v| v * 10)
//!     .sink_value(move |v| sink_seen.borrow_mut().push(v));
//!
//! subject.send(1);
//! subject.send(2);
//! drop(subscription);
//! subject.send(3);
//!
//! assert_eq!(*seen.borrow(), vec![10, 20]);
//! ```

pub mod completion;
mod logging;
pub mod operators;
pub mod publisher;
pub mod sink;
pub mod sources;
pub mod subject;
pub mod subscription;

pub use completion::{Completion, Never};
#[cfg(feature = "json")]
pub use operators::decode::JsonDecoder;
pub use operators::decode::{DecodeError, Decoder};
pub use publisher::{AnyPublisher, Publisher, PublisherExt};
pub use sink::{ClosureSink, Sink};
pub use sources::{Empty, Fail, FuturePublisher, Just, Promise, Sequence};
pub use subject::{CurrentValueSubject, PassthroughSubject};
pub use subscription::{Subscription, SubscriptionBag};
