// repo.rs — Synchronous pass-through over git primitives.
//
// One GitRepo per working directory. Every method is a blocking subprocess
// call; the workspace layer decides per call site whether a failure is
// propagated or treated as best-effort bookkeeping.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GitError, Result};

/// Fixed textual pattern for history rewrites: three-letter weekday and
/// month, space-padded day, HH:MM:SS, four-digit year, literal UTC offset.
pub const COMMIT_DATE_FORMAT: &str = "%a %b %e %T %Y +0000";

/// How long a single git invocation may run before it is killed.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry from the repository history, newest first in [`GitRepo::log`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Opaque version id (the commit hash).
    pub id: String,

    /// Author date of the commit. History rewrites change this, so it is
    /// what callers supplying their own dates observe back.
    pub date: DateTime<FixedOffset>,
}

/// Adapter over the `git` binary, bound to one working directory.
pub struct GitRepo {
    work_dir: PathBuf,
    timeout: Duration,
}

impl GitRepo {
    /// Bind an adapter to a working directory. Spawns nothing; call
    /// [`GitRepo::init`] to create the repository itself.
    pub fn open(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Replace the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The directory this adapter operates on.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run a git command in the working directory under the deadline.
    ///
    /// Output pipes are drained on separate threads so a chatty command
    /// cannot deadlock against a full pipe buffer while we poll for exit.
    fn git_cmd(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(command = %args.join(" "), dir = %self.work_dir.display(), "git");

        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout_pipe));
        let stderr_reader = thread::spawn(move || drain(stderr_pipe));

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    command: args.join(" "),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            thread::sleep(Duration::from_millis(10));
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Create the repository in the working directory. Re-running on an
    /// existing repository is harmless.
    pub fn init(&self) -> Result<()> {
        self.git_cmd(&["init"]).map(|_| ())
    }

    /// Set the repository-local committer/author identity.
    pub fn set_identity(&self, name: &str, email: &str) -> Result<()> {
        self.git_cmd(&["config", "user.name", name])?;
        self.git_cmd(&["config", "user.email", email])?;
        Ok(())
    }

    /// Stage everything, deletions included.
    pub fn stage_all(&self) -> Result<()> {
        self.git_cmd(&["add", "--all"]).map(|_| ())
    }

    /// Commit all tracked changes. Fails when there is nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git_cmd(&["commit", "-a", "-m", message]).map(|_| ())
    }

    /// Rewrite the most recent commit's date without touching its message.
    pub fn amend_date(&self, date: DateTime<Utc>) -> Result<()> {
        let formatted = date.format(COMMIT_DATE_FORMAT).to_string();
        self.git_cmd(&["commit", "--amend", "--no-edit", "--date", &formatted])
            .map(|_| ())
    }

    /// Rewrite the most recent commit's author without touching its message.
    pub fn amend_author(&self, name: &str, email: &str) -> Result<()> {
        let author = format!("{} <{}>", name, email);
        self.git_cmd(&["commit", "--amend", "--no-edit", "--author", &author])
            .map(|_| ())
    }

    /// Discard uncommitted working-tree changes.
    pub fn reset_working_tree(&self) -> Result<()> {
        self.git_cmd(&["reset", "--hard", "--quiet"]).map(|_| ())
    }

    /// Switch the working tree to the given version id.
    pub fn checkout(&self, id: &str) -> Result<()> {
        self.git_cmd(&["checkout", id]).map(|_| ())
    }

    /// Restore a single file's content as of the given version id, leaving
    /// the branch pointer where it is.
    pub fn checkout_file(&self, id: &str, file: &str) -> Result<()> {
        self.git_cmd(&["checkout", id, "--", file]).map(|_| ())
    }

    /// Apply a patch file against the working tree.
    pub fn apply_patch(&self, patch: &Path) -> Result<()> {
        let patch = patch.to_string_lossy();
        self.git_cmd(&["apply", patch.as_ref()]).map(|_| ())
    }

    /// All versions, newest first. A repository with no commits yet lists
    /// as empty rather than failing.
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        let output = match self.git_cmd(&["log", "--pretty=format:%H%x09%aI"]) {
            Ok(output) => output,
            Err(GitError::CommandFailed { stderr, .. })
                if stderr.contains("does not have any commits yet") =>
            {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        output
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (id, date) = line
                    .split_once('\t')
                    .ok_or_else(|| GitError::LogParse(line.to_string()))?;
                let date = DateTime::parse_from_rfc3339(date)
                    .map_err(|_| GitError::LogParse(line.to_string()))?;
                Ok(LogEntry {
                    id: id.to_string(),
                    date,
                })
            })
            .collect()
    }
}

/// Read a pipe to the end. Runs on its own thread per pipe.
fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn test_repo(dir: &Path) -> GitRepo {
        let repo = GitRepo::open(dir);
        repo.init().unwrap();
        repo.set_identity("Test User", "test@example.com").unwrap();
        repo
    }

    #[test]
    fn init_creates_metadata_dir() {
        let dir = tempdir().unwrap();
        test_repo(dir.path());

        assert!(dir.path().join(".git").exists());
    }

    #[test]
    fn log_on_empty_repo_is_empty() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        assert!(repo.log().unwrap().is_empty());
    }

    #[test]
    fn commit_and_log() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        fs::write(dir.path().join("content"), "hello").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("update").unwrap();

        let log = repo.log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id.len(), 40);
    }

    #[test]
    fn log_is_newest_first() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        fs::write(dir.path().join("content"), "one").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("first").unwrap();
        fs::write(dir.path().join("content"), "two").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("second").unwrap();

        let log = repo.log().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].date >= log[1].date);
    }

    #[test]
    fn amend_date_rewrites_recorded_date() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        fs::write(dir.path().join("content"), "dated").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("update").unwrap();

        let date = Utc.with_ymd_and_hms(2019, 3, 9, 12, 34, 56).unwrap();
        repo.amend_date(date).unwrap();

        let log = repo.log().unwrap();
        assert_eq!(log[0].date.with_timezone(&Utc), date);
    }

    #[test]
    fn checkout_file_restores_single_file() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        fs::write(dir.path().join("content"), "old").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("first").unwrap();
        let old_id = repo.log().unwrap()[0].id.clone();

        fs::write(dir.path().join("content"), "new").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("second").unwrap();

        repo.checkout_file(&old_id, "content").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("content")).unwrap(), "old");
        // The branch pointer did not move.
        assert_eq!(repo.log().unwrap().len(), 2);
    }

    #[test]
    fn checkout_unknown_id_fails() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        fs::write(dir.path().join("content"), "x").unwrap();
        repo.stage_all().unwrap();
        repo.commit_all("update").unwrap();

        let result = repo.checkout("0000000000000000000000000000000000000000");
        assert!(matches!(result, Err(GitError::CommandFailed { .. })));
    }

    #[test]
    fn apply_rejects_malformed_patch() {
        let dir = tempdir().unwrap();
        let repo = test_repo(dir.path());

        let patch = dir.path().join("bad.patch");
        fs::write(&patch, "this is not a patch").unwrap();

        assert!(matches!(
            repo.apply_patch(&patch),
            Err(GitError::CommandFailed { .. })
        ));
    }
}
