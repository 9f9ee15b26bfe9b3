//! API and domain objects shared between the server and its clients.

pub mod event;
pub mod signal;
pub mod webhook;

pub use event::{LifecycleEventRequest, M2mAction, RecordAction, RouteResponse};
pub use signal::{EventKind, KindSet, Signal, UnknownSignal};
pub use webhook::{FieldErrors, RegistrationRequest, RegistrationResponse};
