#![forbid(unsafe_code)]

//! Runnable scenarios for `conflux-core`.
//!
//! The collaborators the core treats as external are made concrete here:
//! a mock credential and user service ([`api`]), a joke endpoint over a
//! canned transport ([`joke`]), a cooperative run loop standing in for
//! asynchronous completion ([`run_loop`]) and an owner type that holds its
//! own subscriptions without leaking ([`retain`]). [`scenarios`] strings
//! them together, and [`cli`] exposes them as the `conflux-demo` binary.

pub mod api;
pub mod cli;
pub mod error;
pub mod joke;
pub mod retain;
pub mod run_loop;
pub mod scenarios;

pub use cli::{run, run_from_env};
pub use error::{ApiError, DemoError, Result};
