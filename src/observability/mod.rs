//! Observability facilities
//!
//! Structured logging setup for the library's binaries and for consumers
//! that want the same defaults.

pub mod logging;

pub use logging::{init_from_env, init_logging, LogFormat};
