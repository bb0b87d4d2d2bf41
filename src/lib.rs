//! # Netcommit - Staged configuration changes for Arista EOS
//!
//! Netcommit drives a network device through a small transactional
//! lifecycle on top of a non-transactional command channel: stage a
//! candidate configuration, review the device-computed diff, commit it as a
//! full replace or an incremental merge, and roll back to the snapshot taken
//! before the last merge.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                             │
//! │                    (clap-based command parsing)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             EosDriver                               │
//! │        stage_replace / stage_merge / diff / commit / discard /      │
//! │                     rollback + inventory getters                    │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │ Candidate Store │   │   Session Manager   │   │  Snapshot (flash    │
//! │ (lines + mode)  │   │ (device sessions)   │   │   rollback slot)    │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                CommandChannel (eAPI JSON-RPC over HTTPS)            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netcommit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     let channel = EapiChannel::from_config(&config.device)?;
//!     let mut driver = EosDriver::new(channel, config.session);
//!     driver.open().await?;
//!
//!     driver.stage_merge(["interface Ethernet1", "description uplink"]).await?;
//!     println!("{}", driver.diff().await?);
//!     driver.commit().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::{Config, DeviceConfig, SessionConfig};
    pub use crate::connection::{
        Command, CommandChannel, CommandOutput, ConnectionError, ConnectionResult, EapiChannel,
        OutputFormat,
    };
    pub use crate::error::{Error, ErrorContext, Result};
    pub use crate::network::{
        Candidate, CandidateOrigin, ConfigMode, ConfigSource, EosDriver, Session, SessionState,
        Snapshot,
    };
}

/// Error types and result aliases.
pub mod error;

/// Configuration file loading and environment overrides.
pub mod config;

/// Command channels to network devices.
pub mod connection;

/// EOS configuration lifecycle and inventory getters.
pub mod network;

/// Logging subscriber setup.
pub mod telemetry;

pub use error::{Error, Result};

/// Version of the netcommit library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
