//! Operator stages.
//!
//! Each stage is a [`Publisher`](crate::Publisher) wrapping exactly one
//! upstream publisher and one transform. Stages are built through
//! [`PublisherExt`](crate::PublisherExt) rather than constructed directly.
//!
//! Failure handling is uniform: the first failure anywhere short-circuits
//! every later stage and reaches the sink once.

pub mod decode;
pub mod flat_map;
pub mod map;
pub mod map_err;
pub mod set_failure_type;
pub mod try_map;
