//! Workspace configuration structures
//!
//! The committer identity and the workspace parent directory are process-wide
//! defaults injected at construction rather than hidden globals, so tests and
//! deployments can vary them. Configuration loads from `gitifield.toml` when
//! one exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Identity recorded on commits: committer at initialization time, and the
/// author when an update rewrites authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: default_committer_name(),
            email: default_committer_email(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Top-level workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Parent directory for workspace folders. Defaults to the system temp
    /// directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Committer identity applied on every (re-)initialization.
    #[serde(default)]
    pub committer: Identity,

    /// Deadline for each git invocation, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            committer: Identity::default(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load config, returning defaults if the file doesn't exist.
    pub fn load_or_default(path: &std::path::Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// The per-invocation subprocess deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// Serde default functions
fn default_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_committer_name() -> String {
    "Gitifield".to_string()
}

fn default_committer_email() -> String {
    "gitifield@localhost".to_string()
}

fn default_command_timeout_secs() -> u64 {
    30
}
