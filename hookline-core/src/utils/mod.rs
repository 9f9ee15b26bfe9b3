pub mod headers;
pub mod truncate;
