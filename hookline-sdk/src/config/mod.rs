//! Settings as they appear in a configuration file.
//!
//! These are the unvalidated shapes. `hookline-core` resolves extension
//! names against its registry and turns a [`RawSettings`] into the runtime
//! settings object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::objects::signal::EventKind;

/// Hook value that selects the built-in handler.
pub const USE_DEFAULT: &str = "default";
/// Hook value that explicitly forbids hooks.
pub const DENY: &str = "deny";

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Column size for stored responses and tokens.
pub const MAX_COL_SIZE: usize = 8_000;
/// Default cap on concurrently running background dispatches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;
/// Default number of dispatches queued for the background pool.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hook configuration for one model type.
///
/// A plain string is either [`USE_DEFAULT`] or [`DENY`]. A table maps event
/// kinds to [`USE_DEFAULT`], [`DENY`], or the name of a registered custom
/// hook handler; kinds left out of the table never fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawHook {
    Marker(String),
    PerKind(BTreeMap<EventKind, String>),
}

/// The `[webhooks]` section of a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    /// Model type reference to hook configuration. Types missing here cannot
    /// have webhooks.
    pub hooks: BTreeMap<String, RawHook>,
    /// Per-call timeout in seconds.
    pub timeout: u64,
    /// Base64 encoded 16, 24 or 32 byte key for tokens at rest.
    pub cipher_key: Option<String>,
    /// Mask stored tokens on the management surface.
    pub hide_token: bool,
    pub serializer: String,
    pub client_params: String,
    pub filter: String,
    pub error_handler: String,
    /// `"background"` or `"sync"`, or any registered scheduler name.
    pub task_handler: String,
    pub max_in_flight: usize,
    pub queue_capacity: usize,
    pub max_response_length: usize,
    /// Known model types beyond the ones named in `hooks`.
    pub models: Vec<String>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            hooks: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            cipher_key: None,
            hide_token: false,
            serializer: USE_DEFAULT.to_string(),
            client_params: USE_DEFAULT.to_string(),
            filter: USE_DEFAULT.to_string(),
            error_handler: USE_DEFAULT.to_string(),
            task_handler: "background".to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_response_length: MAX_COL_SIZE,
            models: Vec::new(),
        }
    }
}
