// workspace.rs — Lifecycle and operations for one versioned content field.
//
// A Workspace owns one directory under the configured root and tracks a
// single file named `content` in a git repository there. Commit bookkeeping
// after a successful content write is best-effort: those backend failures
// are logged and discarded so a write that already landed never looks
// failed to the caller. Failures in operations whose entire purpose is the
// failing step (checkout, patch apply) stay observable.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;

use gitifield_git::{GitError, GitRepo, LogEntry};

use crate::bundle::Bundle;
use crate::config::{Identity, WorkspaceConfig};
use crate::error::WorkspaceError;

/// Name of the single tracked file holding the versioned payload.
const CONTENT_FILE: &str = "content";

/// Workspace subdirectory where patch copies are staged during apply.
const PATCH_STAGING_DIR: &str = "patch";

/// Fixed message for content update commits.
const UPDATE_MESSAGE: &str = "update";

/// Backend initialization state. Repository creation is lazy; every
/// operation goes through [`Workspace::ensure_initialized`] first.
enum RepoState {
    Uninitialized,
    Initialized(GitRepo),
}

/// A per-field, directory-backed container holding one tracked content file
/// and its full change history.
pub struct Workspace {
    name: String,
    path: PathBuf,
    config: WorkspaceConfig,
    state: RepoState,
}

impl Workspace {
    /// Create a workspace with default configuration. Non-empty `data` is
    /// treated as an archive produced by [`Workspace::serialize`] and is
    /// unpacked to seed the directory; repository initialization itself
    /// stays lazy.
    pub fn new(data: &[u8], folder_name: Option<&str>) -> Result<Self, WorkspaceError> {
        Self::with_config(data, folder_name, WorkspaceConfig::default())
    }

    /// Create a workspace with explicit configuration.
    ///
    /// `folder_name` becomes the directory name under the configured root
    /// when non-empty; otherwise a unique name is generated so distinct
    /// workspaces never collide on disk.
    pub fn with_config(
        data: &[u8],
        folder_name: Option<&str>,
        config: WorkspaceConfig,
    ) -> Result<Self, WorkspaceError> {
        let name = match folder_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => generated_name(),
        };
        let path = config.root.join(&name);
        let workspace = Self {
            name,
            path,
            config,
            state: RepoState::Uninitialized,
        };

        if !data.is_empty() {
            Bundle::new(&workspace.path).unpack(data)?;
        }

        Ok(workspace)
    }

    /// The workspace's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute directory this workspace lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `content` as the new current version.
    ///
    /// The tracked file is flushed to durable storage before the commit is
    /// attempted, so callers never observe a partial write. The commit
    /// itself is best-effort.
    pub fn update(&mut self, content: &str) -> Result<(), WorkspaceError> {
        self.update_as(content, None, None)
    }

    /// Record `content`, optionally rewriting the commit's date and author.
    ///
    /// The author rewrite is applied only when a date is also supplied; an
    /// author alone is a no-op.
    pub fn update_as(
        &mut self,
        content: &str,
        date: Option<DateTime<Utc>>,
        author: Option<&Identity>,
    ) -> Result<(), WorkspaceError> {
        self.ensure_initialized()?;
        write_durably(&self.path.join(CONTENT_FILE), content)?;

        let repo = self.repo_ref();
        let committed = repo
            .stage_all()
            .and_then(|_| repo.commit_all(UPDATE_MESSAGE))
            .and_then(|_| match date {
                Some(date) => repo.amend_date(date),
                None => Ok(()),
            })
            .and_then(|_| match (date, author) {
                (Some(_), Some(author)) => repo.amend_author(&author.name, &author.email),
                _ => Ok(()),
            });

        if let Err(err) = committed {
            // The content write already landed; history bookkeeping must not
            // block the caller.
            tracing::warn!(error = %err, workspace = %self.name, "update commit failed");
        }

        Ok(())
    }

    /// Switch the working tree to `id` and return the tracked file's content
    /// at that version.
    pub fn checkout(&mut self, id: &str) -> Result<String, WorkspaceError> {
        self.ensure_initialized()?;
        self.repo_ref()
            .checkout(id)
            .map_err(|err| version_error(id, err))?;
        self.read_content()
    }

    /// Restore the tracked file's content as of `id` into the current
    /// working tree and commit that restoration as a new version. The branch
    /// pointer does not move.
    pub fn revert(&mut self, id: &str) -> Result<(), WorkspaceError> {
        self.ensure_initialized()?;
        let repo = self.repo_ref();
        repo.reset_working_tree()?;
        repo.checkout_file(id, CONTENT_FILE)
            .map_err(|err| version_error(id, err))?;

        let message = format!("Revert to commit {}", id);
        if let Err(err) = repo.stage_all().and_then(|_| repo.commit_all(&message)) {
            // Restored content can equal the current content, leaving
            // nothing to commit.
            tracing::debug!(error = %err, workspace = %self.name, "revert commit skipped");
        }

        Ok(())
    }

    /// All versions, newest first. Freshly computed on every call.
    pub fn logs(&mut self) -> Result<Vec<LogEntry>, WorkspaceError> {
        self.ensure_initialized()?;
        Ok(self.repo_ref().log()?)
    }

    /// The most recent version id, or `None` when history is empty.
    pub fn id(&mut self) -> Result<Option<String>, WorkspaceError> {
        Ok(self.logs()?.into_iter().next().map(|entry| entry.id))
    }

    /// The current tracked file's content, verbatim.
    pub fn content(&mut self) -> Result<String, WorkspaceError> {
        self.ensure_initialized()?;
        self.read_content()
    }

    /// Apply an external patch file and fold the result back into the
    /// versioned content.
    ///
    /// The patch lands in a transient target file named `target_file_name`
    /// inside the workspace; on success that file's patched content becomes
    /// the new tracked content via [`Workspace::update`]. Returns `false`
    /// when the backend rejects the patch. Staging artifacts are removed on
    /// every exit path, before the fold-back commit, so they never enter
    /// history.
    pub fn apply_patch(
        &mut self,
        target_file_name: &str,
        patch_path: impl AsRef<Path>,
    ) -> Result<bool, WorkspaceError> {
        let patch_path = patch_path.as_ref();
        if !patch_path.exists() {
            return Err(WorkspaceError::PatchFileMissing {
                path: patch_path.to_path_buf(),
            });
        }

        self.ensure_initialized()?;
        let staging = PatchStaging::set_up(&self.path, target_file_name, patch_path)?;

        if let Err(err) = self.repo_ref().apply_patch(staging.patch_copy()) {
            tracing::warn!(
                error = %err,
                patch = %patch_path.display(),
                workspace = %self.name,
                "patch apply failed"
            );
            return Ok(false);
        }

        let target = staging.target().to_path_buf();
        let patched = fs::read_to_string(&target)
            .map_err(|source| WorkspaceError::Io { path: target, source })?;
        staging.clean_up()?;
        self.update(&patched)?;

        Ok(true)
    }

    /// Drop the backend state and remove the workspace directory. Safe to
    /// call when the directory is already gone; a later operation on this
    /// instance re-creates everything from scratch.
    pub fn clean(&mut self) -> Result<(), WorkspaceError> {
        self.state = RepoState::Uninitialized;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Pack the whole workspace directory, history included, into one
    /// archive byte stream. Feeding the bytes back into construction
    /// reconstitutes the workspace.
    pub fn serialize(&mut self) -> Result<Vec<u8>, WorkspaceError> {
        self.ensure_initialized()?;
        self.repo_ref().reset_working_tree()?;
        Ok(Bundle::new(&self.path).pack_up()?)
    }

    /// Create the directory, the tracked file, and the repository when they
    /// do not exist yet. Calling this twice never creates a second initial
    /// commit.
    fn ensure_initialized(&mut self) -> Result<(), WorkspaceError> {
        if matches!(self.state, RepoState::Initialized(_)) {
            return Ok(());
        }

        fs::create_dir_all(&self.path).map_err(|source| WorkspaceError::Io {
            path: self.path.clone(),
            source,
        })?;

        let content_path = self.path.join(CONTENT_FILE);
        if !content_path.exists() {
            fs::write(&content_path, b"").map_err(|source| WorkspaceError::Io {
                path: content_path.clone(),
                source,
            })?;
        }

        let is_new_repository = !self.path.join(".git").exists();
        let repo = GitRepo::open(&self.path).with_timeout(self.config.command_timeout());
        repo.init()?;
        repo.set_identity(&self.config.committer.name, &self.config.committer.email)?;

        if is_new_repository {
            if let Err(err) = repo
                .stage_all()
                .and_then(|_| repo.commit_all("initial commit"))
            {
                // Nothing to commit yet; the first update will.
                tracing::debug!(error = %err, workspace = %self.name, "initial commit skipped");
            }
        }

        if let Err(err) = repo.reset_working_tree() {
            // A commit-less repository has no HEAD to reset to.
            tracing::debug!(error = %err, workspace = %self.name, "post-init reset skipped");
        }

        self.state = RepoState::Initialized(repo);
        Ok(())
    }

    /// The initialized backend. Valid only after `ensure_initialized`.
    fn repo_ref(&self) -> &GitRepo {
        match &self.state {
            RepoState::Initialized(repo) => repo,
            RepoState::Uninitialized => unreachable!("backend accessed before initialization"),
        }
    }

    fn read_content(&self) -> Result<String, WorkspaceError> {
        let path = self.path.join(CONTENT_FILE);
        fs::read_to_string(&path).map_err(|source| WorkspaceError::Io { path, source })
    }
}

/// Transient staging area for one patch application: a copy of the patch
/// under `patch/` and the target file the patch lands in. Both are removed
/// on every exit path; Drop covers early returns.
struct PatchStaging {
    patch_copy: PathBuf,
    target: PathBuf,
    staging_dir: PathBuf,
    armed: bool,
}

impl PatchStaging {
    fn set_up(
        workspace: &Path,
        target_file_name: &str,
        patch_path: &Path,
    ) -> Result<Self, WorkspaceError> {
        let staging_dir = workspace.join(PATCH_STAGING_DIR);
        fs::create_dir_all(&staging_dir).map_err(|source| WorkspaceError::Io {
            path: staging_dir.clone(),
            source,
        })?;

        let patch_copy = match patch_path.file_name() {
            Some(name) => staging_dir.join(name),
            None => staging_dir.join("incoming.patch"),
        };
        fs::copy(patch_path, &patch_copy).map_err(|source| WorkspaceError::Io {
            path: patch_copy.clone(),
            source,
        })?;

        let target = workspace.join(target_file_name);
        if !target.exists() {
            fs::write(&target, b"").map_err(|source| WorkspaceError::Io {
                path: target.clone(),
                source,
            })?;
        }

        Ok(Self {
            patch_copy,
            target,
            staging_dir,
            armed: true,
        })
    }

    fn patch_copy(&self) -> &Path {
        &self.patch_copy
    }

    fn target(&self) -> &Path {
        &self.target
    }

    /// Remove the staging artifacts, surfacing failures. Disarms Drop.
    fn clean_up(mut self) -> Result<(), WorkspaceError> {
        self.armed = false;
        remove_if_present(&self.target)?;
        remove_if_present(&self.patch_copy)?;
        let _ = fs::remove_dir(&self.staging_dir);
        Ok(())
    }
}

impl Drop for PatchStaging {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.target);
            let _ = fs::remove_file(&self.patch_copy);
            let _ = fs::remove_dir(&self.staging_dir);
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), WorkspaceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Overwrite the tracked file and flush it to durable storage before
/// returning.
fn write_durably(path: &Path, content: &str) -> Result<(), WorkspaceError> {
    let mut file = File::create(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(content.as_bytes())
        .map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    file.sync_data().map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Unique per-process folder name: high-resolution timestamp plus a
/// zero-padded random ten-digit suffix.
fn generated_name() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%9f");
    let suffix: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
    format!("gitifield-{}-{:010}", stamp, suffix)
}

/// An id the backend rejects is a missing version; anything else stays a
/// backend error.
fn version_error(id: &str, err: GitError) -> WorkspaceError {
    match err {
        GitError::CommandFailed { .. } => WorkspaceError::VersionNotFound { id: id.to_string() },
        other => WorkspaceError::Git(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::process::Command;
    use tempfile::tempdir;

    fn test_config(root: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            root: root.to_path_buf(),
            committer: Identity::new("Test User", "test@example.com"),
            command_timeout_secs: 30,
        }
    }

    fn test_workspace(root: &Path, name: &str) -> Workspace {
        Workspace::with_config(&[], Some(name), test_config(root)).unwrap()
    }

    fn author_of_head(path: &Path) -> String {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%an"])
            .current_dir(path)
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[test]
    fn generated_names_are_unique() {
        let a = generated_name();
        let b = generated_name();
        assert!(a.starts_with("gitifield-"));
        assert_ne!(a, b);
    }

    #[test]
    fn construction_does_not_touch_disk() {
        let root = tempdir().unwrap();
        let ws = test_workspace(root.path(), "lazy");
        assert!(!ws.path().exists());
    }

    #[test]
    fn fresh_workspace_has_single_initial_entry() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "fresh");

        assert_eq!(ws.content().unwrap(), "");
        assert_eq!(ws.logs().unwrap().len(), 1);
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "idem");

        ws.content().unwrap();
        ws.content().unwrap();
        assert_eq!(ws.logs().unwrap().len(), 1);
    }

    #[test]
    fn update_then_checkout_returns_exact_content() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "co");

        ws.update("A").unwrap();
        let id_of_a = ws.id().unwrap().unwrap();
        ws.update("B").unwrap();
        assert_eq!(ws.content().unwrap(), "B");

        assert_eq!(ws.checkout(&id_of_a).unwrap(), "A");
    }

    #[test]
    fn checkout_unknown_version_errors() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "co-missing");
        ws.update("A").unwrap();

        let result = ws.checkout("0000000000000000000000000000000000000000");
        assert!(matches!(result, Err(WorkspaceError::VersionNotFound { .. })));
    }

    #[test]
    fn revert_restores_content_and_adds_entry() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "revert");

        ws.update("A").unwrap();
        let id_of_a = ws.id().unwrap().unwrap();
        ws.update("B").unwrap();
        let before = ws.logs().unwrap().len();

        ws.revert(&id_of_a).unwrap();

        assert_eq!(ws.content().unwrap(), "A");
        assert_eq!(ws.logs().unwrap().len(), before + 1);
    }

    #[test]
    fn revert_to_identical_content_swallows_commit_failure() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "revert-same");

        ws.update("A").unwrap();
        let id = ws.id().unwrap().unwrap();
        let before = ws.logs().unwrap().len();

        // Restoring the current content stages nothing; the operation still
        // succeeds.
        ws.revert(&id).unwrap();
        assert_eq!(ws.logs().unwrap().len(), before);
    }

    #[test]
    fn update_with_date_records_exact_date() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "dated");

        let date = Utc.with_ymd_and_hms(2019, 3, 9, 12, 34, 56).unwrap();
        ws.update_as("dated content", Some(date), None).unwrap();

        let logs = ws.logs().unwrap();
        assert_eq!(logs[0].date.with_timezone(&Utc), date);
    }

    #[test]
    fn author_rewrite_requires_date() {
        let root = tempdir().unwrap();
        let author = Identity::new("Jo Writer", "jo@example.com");

        // Author alone: no rewrite happens.
        let mut ws = test_workspace(root.path(), "author-alone");
        ws.update_as("X", None, Some(&author)).unwrap();
        assert_eq!(author_of_head(ws.path()), "Test User");

        // Author together with a date: the rewrite lands.
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let mut ws = test_workspace(root.path(), "author-dated");
        ws.update_as("X", Some(date), Some(&author)).unwrap();
        assert_eq!(author_of_head(ws.path()), "Jo Writer");
    }

    #[test]
    fn apply_patch_missing_file_fails_fast() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "patch-missing");

        let result = ws.apply_patch("page.liquid", root.path().join("absent.patch"));
        assert!(matches!(
            result,
            Err(WorkspaceError::PatchFileMissing { .. })
        ));
        // Nothing was staged, not even the workspace directory.
        assert!(!ws.path().exists());
    }

    #[test]
    fn apply_patch_folds_result_into_history() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "patch-ok");
        ws.content().unwrap();
        let before = ws.logs().unwrap().len();

        let patch_path = root.path().join("add-lines.patch");
        fs::write(
            &patch_path,
            "--- a/page.liquid\n+++ b/page.liquid\n@@ -0,0 +1,2 @@\n+Hello\n+World\n",
        )
        .unwrap();

        assert!(ws.apply_patch("page.liquid", &patch_path).unwrap());
        assert_eq!(ws.content().unwrap(), "Hello\nWorld\n");
        assert_eq!(ws.logs().unwrap().len(), before + 1);

        // Staging artifacts are gone.
        assert!(!ws.path().join("page.liquid").exists());
        assert!(!ws.path().join(PATCH_STAGING_DIR).exists());
    }

    #[test]
    fn apply_patch_backend_failure_returns_false_and_cleans_up() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "patch-bad");

        let patch_path = root.path().join("garbage.patch");
        fs::write(&patch_path, "this is not a patch\n").unwrap();

        assert!(!ws.apply_patch("page.liquid", &patch_path).unwrap());
        assert!(!ws.path().join("page.liquid").exists());
        assert!(!ws.path().join(PATCH_STAGING_DIR).exists());
    }

    #[test]
    fn clean_removes_directory_and_later_ops_start_fresh() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "clean");

        ws.update("A").unwrap();
        assert!(ws.path().exists());

        ws.clean().unwrap();
        assert!(!ws.path().exists());
        // Safe to call again on an absent directory.
        ws.clean().unwrap();

        // The next operation rebuilds from scratch with fresh history.
        assert_eq!(ws.content().unwrap(), "");
        assert_eq!(ws.logs().unwrap().len(), 1);
    }

    #[test]
    fn logs_are_newest_first() {
        let root = tempdir().unwrap();
        let mut ws = test_workspace(root.path(), "order");

        ws.update("one").unwrap();
        ws.update("two").unwrap();

        let logs = ws.logs().unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(ws.id().unwrap().unwrap(), logs[0].id);
        assert!(logs[0].date >= logs[1].date);
    }
}
