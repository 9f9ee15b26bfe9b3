pub mod webhook;

pub use webhook::{NewRegistration, Registration, mask_token};
