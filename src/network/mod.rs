//! Arista EOS configuration management.
//!
//! The lifecycle lives in [`EosDriver`]:
//!
//! ```text
//! stage_replace / stage_merge ──▶ diff ──▶ commit ──▶ write memory
//!            │                               │
//!            └────────── discard ◀───────────┘ (failure)
//!
//! rollback: snapshot slot ──▶ running-config ──▶ write memory ──▶ resync
//! ```
//!
//! A merge candidate is test-applied in a named device session that stays
//! pending until commit or discard. A replace candidate is syntax-checked
//! in a throwaway session and loaded to a file on flash; commit replaces the
//! running configuration from that file. Every merge commit first copies
//! the running configuration to a single snapshot slot that rollback
//! restores.
//!
//! # Example
//!
//! ```rust,ignore
//! use netcommit::prelude::*;
//!
//! let channel = EapiChannel::from_config(&config.device)?;
//! let mut driver = EosDriver::new(channel, config.session.clone());
//! driver.open().await?;
//!
//! driver.stage_merge(["interface Ethernet1", "description uplink"]).await?;
//! println!("{}", driver.diff().await?);
//! driver.commit().await?;
//! ```

pub mod candidate;
pub mod driver;
pub mod facts;
pub mod parsers;
pub mod session;

pub use candidate::{Candidate, CandidateOrigin, CandidateStore, ConfigMode, ConfigSource};
pub use driver::{EosDriver, Snapshot};
pub use facts::{
    BgpPeer, BgpVrf, Facts, ForwardingModel, Interface, InterfaceCounters, LinkStatus,
    LldpNeighbor, Switchport,
};
pub use session::{
    Directive, Session, SessionCommandBuilder, SessionManager, SessionNamer, SessionPurpose,
    SessionState,
};
