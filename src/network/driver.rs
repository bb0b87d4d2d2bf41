//! EOS configuration lifecycle driver.
//!
//! [`EosDriver`] owns one [`CommandChannel`] and walks a candidate through
//! stage, diff, commit, discard and rollback. All lifecycle operations take
//! `&mut self`; share a driver between tasks behind a mutex.

use super::candidate::{Candidate, CandidateStore, ConfigMode, ConfigSource};
use super::facts::{self, BgpVrf, Facts, Interface, LldpNeighbor};
use super::session::{
    abort_named, Directive, Session, SessionCommandBuilder, SessionManager, SessionPurpose,
};
use crate::config::SessionConfig;
use crate::connection::{Command, CommandChannel, ConnectionError, OutputFormat};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// The single device-resident rollback target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    slot: String,
    available: bool,
    taken_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            available: false,
            taken_at: None,
        }
    }

    /// Flash location of the snapshot.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// True when the slot holds a snapshot that rollback can restore.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// When this process last wrote the snapshot. `None` for a snapshot
    /// found on the device at open time.
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    fn record(&mut self) {
        self.available = true;
        self.taken_at = Some(Utc::now());
    }
}

/// Configuration lifecycle driver for one Arista EOS device.
pub struct EosDriver<C: CommandChannel> {
    channel: C,
    settings: SessionConfig,
    candidates: CandidateStore,
    sessions: SessionManager,
    snapshot: Snapshot,
}

impl<C: CommandChannel> EosDriver<C> {
    /// Create a driver over `channel`.
    pub fn new(channel: C, settings: SessionConfig) -> Self {
        Self {
            candidates: CandidateStore::new(),
            sessions: SessionManager::new(settings.prefix.clone()),
            snapshot: Snapshot::new(settings.snapshot_slot.clone()),
            channel,
            settings,
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The held candidate, staged or synced.
    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidates.current()
    }

    /// The tracked session, whatever its state.
    pub fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    /// The rollback snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Prepare the driver for use.
    ///
    /// Aborts leftover sessions carrying our prefix (when enabled) and checks
    /// whether the snapshot slot already holds a snapshot. Returns the names
    /// of the aborted sessions.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn open(&mut self) -> Result<Vec<String>> {
        let aborted = if self.settings.cleanup_on_open {
            self.sessions.cleanup_stale_sessions(&self.channel).await?
        } else {
            Vec::new()
        };

        let probe = format!("dir {}", self.snapshot.slot);
        match self.channel.run_text(&probe).await {
            Ok(_) => {
                self.snapshot.available = true;
                debug!(slot = %self.snapshot.slot, "found existing snapshot");
            }
            Err(e) if e.is_rejection() => {
                self.snapshot.available = false;
                debug!(slot = %self.snapshot.slot, "no snapshot on device");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(aborted)
    }

    /// Abort any outstanding session and close the channel.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn close(&mut self) -> Result<()> {
        self.sessions.abort(&self.channel).await?;
        self.channel.close().await?;
        Ok(())
    }

    /// Stage a full replacement configuration.
    ///
    /// The candidate is syntax-checked in a throwaway session and loaded to
    /// the device candidate file. The running configuration is untouched.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn stage_replace(&mut self, source: impl Into<ConfigSource>) -> Result<()> {
        self.stage(source.into(), ConfigMode::Replace).await?;
        Ok(())
    }

    /// Stage lines to merge into the running configuration.
    ///
    /// The lines are test-applied inside a new session that stays pending
    /// until commit or discard. Returns the session name.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn stage_merge(&mut self, source: impl Into<ConfigSource>) -> Result<String> {
        self.stage(source.into(), ConfigMode::Merge)
            .await?
            .ok_or_else(|| Error::precondition("merge staging produced no session"))
    }

    async fn stage(&mut self, source: ConfigSource, mode: ConfigMode) -> Result<Option<String>> {
        match mode {
            ConfigMode::Replace => self.candidates.stage_replace(&source)?,
            ConfigMode::Merge => self.candidates.stage_merge(&source)?,
        };

        let result = match self.candidates.current_mut() {
            Some(candidate) => {
                self.sessions
                    .open_test_session(&self.channel, candidate, &self.settings.candidate_file)
                    .await
            }
            None => Err(Error::precondition("no candidate staged")),
        };

        if let Err(e) = &result {
            warn!(%mode, error = %e, "staging failed, candidate dropped");
            self.candidates.clear();
        }
        result
    }

    /// Show what a commit would change, as computed by the device.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn diff(&mut self) -> Result<String> {
        let candidate = self
            .candidates
            .current()
            .ok_or_else(|| Error::precondition("no candidate staged, nothing to diff"))?;

        match candidate.mode() {
            ConfigMode::Merge => {
                let session = candidate.session().ok_or_else(|| {
                    Error::precondition("merge candidate has no tested session")
                })?;
                let command = format!("show session-config named {} diffs", session);
                Ok(self.channel.run_text(&command).await?)
            }
            ConfigMode::Replace => {
                let name = self.sessions.namer().next(SessionPurpose::Diff);
                let commands = SessionCommandBuilder::new(&name)?
                    .prologue(Directive::ConfigureReplace(
                        self.settings.candidate_file.clone(),
                    ))
                    .epilogue(Directive::ShowSessionDiffs)
                    .epilogue(Directive::Abort)
                    .build();

                let outputs = match self.channel.run_commands(&commands, OutputFormat::Text).await {
                    Ok(outputs) => outputs,
                    Err(e) => {
                        abort_named(&self.channel, &name).await;
                        return Err(e.into());
                    }
                };

                outputs
                    .get(2)
                    .map(|o| o.output().to_string())
                    .ok_or_else(|| Error::parse("show session-config diffs", "no output returned"))
            }
        }
    }

    /// Make the staged candidate live and save it to startup-config.
    ///
    /// A merge commit first copies the running configuration to the
    /// snapshot slot. A failure after the running configuration changed is
    /// not undone here; use [`rollback`](Self::rollback).
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn commit(&mut self) -> Result<()> {
        let candidate = self
            .candidates
            .staged()
            .ok_or_else(|| Error::precondition("no staged candidate to commit"))?;
        if candidate.is_empty() {
            return Err(Error::precondition("staged candidate is empty"));
        }
        let mode = candidate.mode();
        let lines = candidate.lines().to_vec();
        let session = candidate.session().map(String::from);

        match mode {
            ConfigMode::Replace => {
                let command = Command::from(format!(
                    "configure replace {}",
                    self.settings.candidate_file
                ));
                let result = self
                    .channel
                    .run_commands(&[command], OutputFormat::Json)
                    .await;
                if let Err(e) = result {
                    self.candidates.clear();
                    return Err(replace_error(e));
                }
                info!(file = %self.settings.candidate_file, "replace committed");
            }
            ConfigMode::Merge => {
                let session = session
                    .filter(|name| self.sessions.outstanding().is_some_and(|s| s.name() == name))
                    .ok_or_else(|| Error::precondition("merge candidate has no tested session"))?;
                self.commit_merge(&session, &lines).await?;
            }
        }

        self.candidates.clear();
        self.persist().await
    }

    async fn commit_merge(&mut self, session: &str, lines: &[String]) -> Result<()> {
        let snapshot = Command::from(format!("copy running-config {}", self.snapshot.slot));
        if let Err(e) = self.channel.run_commands(&[snapshot], OutputFormat::Json).await {
            self.fail_merge(session).await;
            return Err(Error::CommitSequence {
                session: session.to_string(),
                snapshot_taken: false,
                message: e.device_message(),
            });
        }
        self.snapshot.record();
        debug!(slot = %self.snapshot.slot, "snapshot taken");

        let commands = SessionCommandBuilder::new(session)?
            .body(lines)
            .epilogue(Directive::Commit)
            .build();
        if let Err(e) = self.channel.run_commands(&commands, OutputFormat::Json).await {
            self.fail_merge(session).await;
            return Err(Error::CommitSequence {
                session: session.to_string(),
                snapshot_taken: true,
                message: e.device_message(),
            });
        }

        self.sessions.mark_committed();
        info!(session, "merge committed");
        Ok(())
    }

    /// Drop the candidate and the session after a failed merge commit.
    async fn fail_merge(&mut self, session: &str) {
        warn!(session, "merge commit failed, dropping candidate");
        self.candidates.clear();
        if let Err(e) = self.sessions.abort(&self.channel).await {
            warn!(session, error = %e, "failed to abort session after commit failure");
        }
    }

    /// Throw away the staged candidate.
    ///
    /// Aborts the pending merge session, if any, then reloads the store
    /// from the running configuration. Returns the aborted session name.
    ///
    /// The staged candidate is dropped even when the abort fails, so a
    /// later commit cannot push discarded content.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn discard(&mut self) -> Result<Option<String>> {
        let aborted = self.sessions.abort(&self.channel).await;
        self.candidates.clear();
        let synced = self.resync().await;

        let aborted = match aborted {
            Ok(aborted) => aborted,
            Err(e) => {
                warn!(error = %e, "failed to abort session, candidate dropped");
                return Err(e);
            }
        };
        if let Some(name) = &aborted {
            info!(session = %name, "session discarded");
        }
        synced?;
        Ok(aborted)
    }

    /// Restore the snapshot taken at the last merge commit.
    #[instrument(skip_all, fields(device = %self.channel.identifier()))]
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.snapshot.available {
            return Err(Error::precondition(format!(
                "no snapshot in {}, nothing to roll back to",
                self.snapshot.slot
            )));
        }

        if let Some(name) = self.sessions.abort(&self.channel).await? {
            debug!(session = %name, "aborted pending session before rollback");
        }

        let command = Command::from(format!("configure replace {}", self.snapshot.slot));
        self.channel
            .run_commands(&[command], OutputFormat::Json)
            .await
            .map_err(|e| {
                if e.is_rejection() {
                    Error::Rollback(e.device_message())
                } else {
                    Error::Connection(e)
                }
            })?;
        info!(slot = %self.snapshot.slot, "snapshot restored");

        let persisted = self.persist().await;
        self.resync().await?;
        persisted
    }

    /// Save the running configuration to startup-config.
    async fn persist(&self) -> Result<()> {
        let command = Command::from("write memory");
        match self.channel.run_commands(&[command], OutputFormat::Json).await {
            Ok(_) => {
                debug!("running configuration saved");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "running configuration not persisted");
                Err(Error::Persist(e.device_message()))
            }
        }
    }

    /// Reload the store from the running configuration and write it to the
    /// candidate file, so that a later diff compares against reality.
    async fn resync(&mut self) -> Result<()> {
        let running = self.channel.run_text("show running-config").await?;
        let candidate = self.candidates.sync(&running);

        let load = Command::with_input(
            format!("copy terminal: {}", self.settings.candidate_file),
            candidate.to_text(),
        );
        self.channel.run_commands(&[load], OutputFormat::Json).await?;
        debug!(lines = candidate.lines().len(), "candidate synced from running-config");
        Ok(())
    }

    /// Device identity.
    pub async fn get_facts(&self) -> Result<Facts> {
        facts::get_facts(&self.channel).await
    }

    /// Interface state keyed by interface name.
    pub async fn get_interfaces(&self) -> Result<IndexMap<String, Interface>> {
        facts::get_interfaces(&self.channel).await
    }

    /// BGP neighbors keyed by VRF.
    pub async fn get_bgp_neighbors(&self) -> Result<IndexMap<String, BgpVrf>> {
        facts::get_bgp_neighbors(&self.channel).await
    }

    /// LLDP neighbors keyed by local port.
    pub async fn get_lldp_neighbors(&self) -> Result<IndexMap<String, Vec<LldpNeighbor>>> {
        facts::get_lldp_neighbors(&self.channel).await
    }
}

fn replace_error(error: ConnectionError) -> Error {
    if error.is_rejection() {
        Error::ReplaceCommit(error.device_message())
    } else {
        Error::Connection(error)
    }
}
