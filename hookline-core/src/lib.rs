#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Lifecycle-event webhook dispatch.
//!
//! Records of configured model types produce lifecycle events. The
//! [`EventRouter`](processors::EventRouter) decides synchronously whether an
//! event should fire, serializes the record, and hands a task to the
//! configured scheduler. The [`Dispatcher`](processors::Dispatcher) then
//! looks up matching registrations, posts to every endpoint concurrently and
//! writes the outcomes back in one batch.

pub mod cipher;
pub mod config;
pub mod entities;
pub mod events;
pub mod extensions;
pub mod framework;
pub mod processors;
pub mod record;
pub mod store;
pub mod utils;
pub mod validation;

pub use hookline_sdk::objects::signal::{EventKind, KindSet, Signal};
