//! Structured logging for netcommit.
//!
//! Library code only emits `tracing` events. The binary installs a
//! subscriber through [`LoggingBuilder`]; `RUST_LOG` overrides the level
//! chosen from configuration or `-v` flags.

pub mod logging;

pub use logging::{LogFormat, LoggingBuilder};
