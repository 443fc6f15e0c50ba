//! Shared helpers: logging setup and serde adapters

pub mod logging;
pub mod serde_duration;

pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
