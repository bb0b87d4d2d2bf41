//! Device-side configuration sessions.
//!
//! A configuration session is a named sandbox on the device. Commands sent
//! inside it do not touch the running configuration until the session is
//! committed; aborting it throws the changes away. The [`Session`] type here
//! is only a local mirror of that device state.
//!
//! Command batches that enter a session are assembled by
//! [`SessionCommandBuilder`] from three typed parts: a prologue of
//! directives, the candidate body and an epilogue of directives.

use super::candidate::{Candidate, ConfigMode};
use crate::connection::{Command, CommandChannel, ConnectionError, OutputFormat};
use crate::error::{Error, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Lifecycle state of a session as seen from this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Entered on the device, test-apply not yet confirmed
    Open,
    /// Candidate applied inside the session without errors
    Tested,
    /// Session thrown away
    Aborted,
    /// Session changes made live
    Committed,
}

impl SessionState {
    /// True while the session still exists on the device.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, SessionState::Open | SessionState::Tested)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Open => "open",
            SessionState::Tested => "tested",
            SessionState::Aborted => "aborted",
            SessionState::Committed => "committed",
        };
        f.write_str(s)
    }
}

/// Why a session was created. Part of the session name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPurpose {
    /// Holds a merge candidate until commit
    Commit,
    /// Syntax check of a replace candidate, always aborted
    Test,
    /// Device-side comparison of the replace candidate, always aborted
    Diff,
}

impl SessionPurpose {
    fn tag(&self) -> &'static str {
        match self {
            SessionPurpose::Commit => "commit",
            SessionPurpose::Test => "test",
            SessionPurpose::Diff => "diff",
        }
    }
}

/// Check that `name` only uses characters the device accepts.
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::InvalidSessionName(name.to_string()));
    }
    Ok(())
}

/// Generates unique session names.
///
/// Names combine the configured prefix, the purpose, a timestamp with
/// second granularity and a process-wide monotonic counter, so two names
/// generated within the same second still differ.
#[derive(Debug, Clone)]
pub struct SessionNamer {
    prefix: String,
}

impl SessionNamer {
    /// Create a namer using `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix every generated name starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate the next name.
    pub fn next(&self, purpose: SessionPurpose) -> String {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
        format!(
            "{}{}_{}_{}",
            self.prefix,
            purpose.tag(),
            Local::now().format("%Y%m%d-%H%M%S"),
            counter
        )
    }

    /// True if `name` was generated with this namer's prefix.
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}

/// Local mirror of a device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    name: String,
    state: SessionState,
    created_at: DateTime<Utc>,
}

impl Session {
    fn open(name: String) -> Self {
        Self {
            name,
            state: SessionState::Open,
            created_at: Utc::now(),
        }
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// When the session was opened.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Control statement wrapped around a candidate body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `configure session <name>`
    EnterSession(String),
    /// `rollback clean-config`: start the session from an empty config
    RollbackCleanConfig,
    /// `configure replace <url>`
    ConfigureReplace(String),
    /// `show session-config diffs` from inside the session
    ShowSessionDiffs,
    /// `end`: leave the session pending
    End,
    /// `abort`: discard the session
    Abort,
    /// `commit`: make the session live
    Commit,
}

impl Directive {
    /// The CLI command for this directive.
    pub fn to_command(&self) -> Command {
        match self {
            Directive::EnterSession(name) => Command::from(format!("configure session {}", name)),
            Directive::RollbackCleanConfig => Command::from("rollback clean-config"),
            Directive::ConfigureReplace(url) => Command::from(format!("configure replace {}", url)),
            Directive::ShowSessionDiffs => Command::from("show session-config diffs"),
            Directive::End => Command::from("end"),
            Directive::Abort => Command::from("abort"),
            Directive::Commit => Command::from("commit"),
        }
    }
}

/// Assembles a command batch that runs inside one session.
///
/// The prologue always starts by entering the session. Body lines equal to
/// `end` are dropped: an `end` in the middle of a batch would leave the
/// session and run the remaining lines in exec mode.
#[derive(Debug, Clone)]
pub struct SessionCommandBuilder {
    prologue: Vec<Directive>,
    body: Vec<String>,
    epilogue: Vec<Directive>,
}

impl SessionCommandBuilder {
    /// Start a batch for session `name`.
    pub fn new(name: &str) -> Result<Self> {
        validate_session_name(name)?;
        Ok(Self {
            prologue: vec![Directive::EnterSession(name.to_string())],
            body: Vec::new(),
            epilogue: Vec::new(),
        })
    }

    /// Append a directive after entering the session.
    pub fn prologue(mut self, directive: Directive) -> Self {
        self.prologue.push(directive);
        self
    }

    /// Set the candidate body.
    pub fn body<S: AsRef<str>>(mut self, lines: &[S]) -> Self {
        self.body = lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| line.trim() != "end")
            .map(String::from)
            .collect();
        self
    }

    /// Append a directive after the body.
    pub fn epilogue(mut self, directive: Directive) -> Self {
        self.epilogue.push(directive);
        self
    }

    /// Produce the ordered command batch.
    pub fn build(self) -> Vec<Command> {
        self.prologue
            .iter()
            .map(Directive::to_command)
            .chain(self.body.into_iter().map(Command::from))
            .chain(self.epilogue.iter().map(Directive::to_command))
            .collect()
    }
}

/// Opens, tests and aborts sessions for one device.
///
/// Keeps at most one outstanding session. Opening a new one aborts the
/// previous session first.
#[derive(Debug)]
pub struct SessionManager {
    namer: SessionNamer,
    current: Option<Session>,
}

impl SessionManager {
    /// Create a manager naming sessions with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            namer: SessionNamer::new(prefix),
            current: None,
        }
    }

    /// The session naming scheme.
    pub fn namer(&self) -> &SessionNamer {
        &self.namer
    }

    /// The tracked session, whatever its state.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The tracked session if it still exists on the device.
    pub fn outstanding(&self) -> Option<&Session> {
        self.current.as_ref().filter(|s| s.state.is_outstanding())
    }

    /// Mark the outstanding session committed.
    pub(crate) fn mark_committed(&mut self) {
        if let Some(session) = self.current.as_mut() {
            session.state = SessionState::Committed;
        }
    }

    /// Test-apply `candidate` on the device without making it live.
    ///
    /// Merge candidates are applied inside a fresh named session that is
    /// left pending; its name is returned and attached to the candidate.
    /// Replace candidates are syntax-checked in a throwaway session and then
    /// written to `candidate_file`; nothing is returned.
    ///
    /// On a device rejection the session is aborted and
    /// [`Error::Staging`] is returned.
    pub async fn open_test_session<C>(
        &mut self,
        channel: &C,
        candidate: &mut Candidate,
        candidate_file: &str,
    ) -> Result<Option<String>>
    where
        C: CommandChannel + ?Sized,
    {
        self.abort(channel).await?;

        match candidate.mode() {
            ConfigMode::Merge => {
                let name = self.namer.next(SessionPurpose::Commit);
                let commands = SessionCommandBuilder::new(&name)?
                    .body(candidate.lines())
                    .epilogue(Directive::End)
                    .build();

                self.current = Some(Session::open(name.clone()));
                debug!(session = %name, lines = candidate.lines().len(), "test-applying merge candidate");

                if let Err(e) = channel.run_commands(&commands, OutputFormat::Json).await {
                    warn!(session = %name, error = %e, "merge candidate rejected, aborting session");
                    if let Err(abort_err) = self.abort(channel).await {
                        warn!(session = %name, error = %abort_err, "failed to abort rejected session");
                    }
                    return Err(staging_error(ConfigMode::Merge, e));
                }

                if let Some(session) = self.current.as_mut() {
                    session.state = SessionState::Tested;
                }
                candidate.attach_session(name.clone())?;
                info!(session = %name, "merge candidate tested");
                Ok(Some(name))
            }
            ConfigMode::Replace => {
                let name = self.namer.next(SessionPurpose::Test);
                let commands = SessionCommandBuilder::new(&name)?
                    .prologue(Directive::RollbackCleanConfig)
                    .body(candidate.lines())
                    .epilogue(Directive::Abort)
                    .build();

                debug!(session = %name, lines = candidate.lines().len(), "validating replace candidate");

                if let Err(e) = channel.run_commands(&commands, OutputFormat::Json).await {
                    warn!(session = %name, error = %e, "replace candidate rejected");
                    abort_named(channel, &name).await;
                    return Err(staging_error(ConfigMode::Replace, e));
                }

                let load = Command::with_input(
                    format!("copy terminal: {}", candidate_file),
                    candidate.to_text(),
                );
                channel
                    .run_commands(&[load], OutputFormat::Json)
                    .await
                    .map_err(|e| staging_error(ConfigMode::Replace, e))?;

                info!(file = %candidate_file, "replace candidate loaded");
                Ok(None)
            }
        }
    }

    /// Abort the outstanding session, if any.
    ///
    /// Returns the name of the aborted session.
    pub async fn abort<C>(&mut self, channel: &C) -> Result<Option<String>>
    where
        C: CommandChannel + ?Sized,
    {
        let Some(session) = self.current.as_mut().filter(|s| s.state.is_outstanding()) else {
            return Ok(None);
        };

        let commands = SessionCommandBuilder::new(&session.name)?
            .epilogue(Directive::Abort)
            .build();
        channel.run_commands(&commands, OutputFormat::Json).await?;

        session.state = SessionState::Aborted;
        debug!(session = %session.name, "session aborted");
        Ok(Some(session.name.clone()))
    }

    /// Abort pending sessions on the device that carry our prefix.
    ///
    /// A session left behind by a crashed process is invisible to the
    /// local mirror, so the device is asked directly. Returns the names of
    /// the aborted sessions.
    pub async fn cleanup_stale_sessions<C>(&mut self, channel: &C) -> Result<Vec<String>>
    where
        C: CommandChannel + ?Sized,
    {
        let command = "show configuration sessions";
        let value = channel.run_json(command).await?;
        let sessions = value
            .get("sessions")
            .and_then(|s| s.as_object())
            .ok_or_else(|| Error::parse(command, "missing 'sessions' object"))?;

        let mut aborted = Vec::new();
        for (name, details) in sessions {
            let state = details.get("state").and_then(|s| s.as_str()).unwrap_or("");
            if !self.namer.owns(name) || state == "completed" {
                continue;
            }
            if self.outstanding().is_some_and(|s| s.name() == name) {
                continue;
            }

            let commands = SessionCommandBuilder::new(name)?
                .epilogue(Directive::Abort)
                .build();
            match channel.run_commands(&commands, OutputFormat::Json).await {
                Ok(_) => {
                    info!(session = %name, state, "aborted stale session");
                    aborted.push(name.clone());
                }
                Err(e) => warn!(session = %name, error = %e, "failed to abort stale session"),
            }
        }

        Ok(aborted)
    }
}

/// Best-effort abort of a throwaway session.
pub(crate) async fn abort_named<C>(channel: &C, name: &str)
where
    C: CommandChannel + ?Sized,
{
    let commands = vec![
        Directive::EnterSession(name.to_string()).to_command(),
        Directive::Abort.to_command(),
    ];
    if let Err(e) = channel.run_commands(&commands, OutputFormat::Json).await {
        warn!(session = %name, error = %e, "failed to abort session");
    }
}

fn staging_error(mode: ConfigMode, error: ConnectionError) -> Error {
    if error.is_rejection() {
        Error::staging(mode, error.device_message())
    } else {
        Error::Connection(error)
    }
}
