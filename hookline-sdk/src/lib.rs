//! Shared objects for Hookline.
//!
//! Everything here is plain data: settings shapes as they appear in a config
//! file, the lifecycle signal taxonomy, and the request/response bodies of
//! the management API. The optional `client` feature adds a typed HTTP
//! client for that API.

pub mod config;
pub mod objects;

#[cfg(feature = "client")]
pub mod client;
