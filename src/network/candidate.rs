//! Candidate configuration store.
//!
//! A candidate is the configuration the operator wants to apply. It is held
//! as an ordered list of non-empty CLI lines together with the mode it was
//! staged in and, for merges, the device session it was tested in.

use crate::error::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a candidate is applied on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    /// Substitute the entire running configuration
    Replace,
    /// Apply the lines on top of the running configuration
    Merge,
}

impl fmt::Display for ConfigMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigMode::Replace => write!(f, "replace"),
            ConfigMode::Merge => write!(f, "merge"),
        }
    }
}

/// Where a candidate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    /// Loaded by the operator through a staging call
    Staged,
    /// Read back from the running configuration after discard or rollback
    Synced,
}

/// Source of candidate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from a local file
    File(PathBuf),
    /// Inline configuration text
    Inline(String),
}

impl ConfigSource {
    /// Read the raw text of this source.
    pub fn read(&self) -> Result<String> {
        match self {
            ConfigSource::Inline(text) => Ok(text.clone()),
            ConfigSource::File(path) => {
                if !path.exists() {
                    return Err(Error::FileNotFound(path.clone()));
                }
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read candidate {}", path.display()))
            }
        }
    }
}

impl From<&str> for ConfigSource {
    fn from(text: &str) -> Self {
        ConfigSource::Inline(text.to_string())
    }
}

impl From<String> for ConfigSource {
    fn from(text: String) -> Self {
        ConfigSource::Inline(text)
    }
}

impl From<&[&str]> for ConfigSource {
    fn from(lines: &[&str]) -> Self {
        ConfigSource::Inline(lines.join("\n"))
    }
}

impl<const N: usize> From<[&str; N]> for ConfigSource {
    fn from(lines: [&str; N]) -> Self {
        ConfigSource::Inline(lines.join("\n"))
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

/// Split configuration text into lines, dropping blank ones.
///
/// The device treats an empty command as an error, so blank lines never
/// leave this process. Indentation is preserved.
pub fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect()
}

/// A staged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    lines: Vec<String>,
    mode: ConfigMode,
    origin: CandidateOrigin,
    session: Option<String>,
}

impl Candidate {
    /// Build a staged candidate from raw text.
    pub fn staged(text: &str, mode: ConfigMode) -> Self {
        Self {
            lines: clean_lines(text),
            mode,
            origin: CandidateOrigin::Staged,
            session: None,
        }
    }

    /// Build a replace-mode mirror of the running configuration.
    pub fn synced(running: &str) -> Self {
        Self {
            lines: clean_lines(running),
            mode: ConfigMode::Replace,
            origin: CandidateOrigin::Synced,
            session: None,
        }
    }

    /// Candidate lines in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Mode the candidate was staged in.
    pub fn mode(&self) -> ConfigMode {
        self.mode
    }

    /// Where the candidate came from.
    pub fn origin(&self) -> CandidateOrigin {
        self.origin
    }

    /// Session the merge candidate was tested in.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// True when there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Candidate text as it is loaded to the device, one line per row.
    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Record the session a merge candidate was tested in.
    ///
    /// Replace candidates never carry a session.
    pub(crate) fn attach_session(&mut self, name: impl Into<String>) -> Result<()> {
        if self.mode != ConfigMode::Merge {
            return Err(Error::precondition(
                "only merge candidates are tested in a named session",
            ));
        }
        self.session = Some(name.into());
        Ok(())
    }
}

/// Holds at most one candidate per driver.
#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    current: Option<Candidate>,
}

impl CandidateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `source`, strip blank lines and hold it as a replace candidate.
    ///
    /// Overwrites any earlier candidate.
    pub fn stage_replace(&mut self, source: &ConfigSource) -> Result<&Candidate> {
        self.stage(source, ConfigMode::Replace)
    }

    /// Read `source`, strip blank lines and hold it as a merge candidate.
    ///
    /// The session is attached later, once the candidate has been tested.
    pub fn stage_merge(&mut self, source: &ConfigSource) -> Result<&Candidate> {
        self.stage(source, ConfigMode::Merge)
    }

    fn stage(&mut self, source: &ConfigSource, mode: ConfigMode) -> Result<&Candidate> {
        let text = source.read()?;
        Ok(&*self.current.insert(Candidate::staged(&text, mode)))
    }

    /// Replace the store content with a mirror of the running config.
    pub fn sync(&mut self, running: &str) -> &Candidate {
        &*self.current.insert(Candidate::synced(running))
    }

    /// The held candidate, if any.
    pub fn current(&self) -> Option<&Candidate> {
        self.current.as_ref()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut Candidate> {
        self.current.as_mut()
    }

    /// The held candidate if it was staged by the operator.
    pub fn staged(&self) -> Option<&Candidate> {
        self.current
            .as_ref()
            .filter(|c| c.origin == CandidateOrigin::Staged)
    }

    /// Drop the held candidate.
    pub fn clear(&mut self) -> Option<Candidate> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_clean_lines_strips_blank_lines() {
        let text = "hostname leaf1\n\n   \ninterface Ethernet1\n   description uplink\r\n";
        assert_eq!(
            clean_lines(text),
            vec![
                "hostname leaf1".to_string(),
                "interface Ethernet1".to_string(),
                "   description uplink".to_string(),
            ]
        );
    }

    #[test]
    fn test_stage_merge_overwrites_previous() {
        let mut store = CandidateStore::new();
        store
            .stage_replace(&ConfigSource::from("hostname a"))
            .unwrap();
        let candidate = store
            .stage_merge(&ConfigSource::from(["interface Ethernet1", "", "description test"]))
            .unwrap();

        assert_eq!(candidate.mode(), ConfigMode::Merge);
        assert_eq!(candidate.lines().len(), 2);
        assert_eq!(candidate.session(), None);
        assert_eq!(candidate.origin(), CandidateOrigin::Staged);
    }

    #[test]
    fn test_stage_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname spine1\n\nntp server 192.0.2.1").unwrap();

        let mut store = CandidateStore::new();
        let candidate = store
            .stage_replace(&ConfigSource::File(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(candidate.lines(), ["hostname spine1", "ntp server 192.0.2.1"]);
        assert_eq!(candidate.to_text(), "hostname spine1\nntp server 192.0.2.1\n");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let mut store = CandidateStore::new();
        let err = store
            .stage_merge(&ConfigSource::File(PathBuf::from("/nonexistent/candidate.cfg")))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
        assert!(store.current().is_none());
    }

    #[test]
    fn test_replace_candidate_cannot_carry_session() {
        let mut candidate = Candidate::staged("hostname a", ConfigMode::Replace);
        assert!(candidate.attach_session("netcommit_x").is_err());

        let mut merge = Candidate::staged("hostname a", ConfigMode::Merge);
        merge.attach_session("netcommit_x").unwrap();
        assert_eq!(merge.session(), Some("netcommit_x"));
    }

    #[test]
    fn test_synced_candidate_is_not_staged() {
        let mut store = CandidateStore::new();
        store.sync("hostname leaf1\n");
        assert!(store.current().is_some());
        assert!(store.staged().is_none());
        assert_eq!(store.current().unwrap().mode(), ConfigMode::Replace);
    }
}
