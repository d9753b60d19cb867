// error.rs — Error types for the workspace subsystem.

use std::path::PathBuf;
use thiserror::Error;

use gitifield_git::GitError;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The patch file handed to `apply_patch` does not exist. Raised before
    /// any staging happens.
    #[error("patch file not found: {path}")]
    PatchFileMissing { path: PathBuf },

    /// The backend rejected the requested version id.
    #[error("version '{id}' not found in history")]
    VersionNotFound { id: String },

    /// A git invocation failed at a call site that propagates failures.
    #[error("git backend error: {0}")]
    Git(#[from] GitError),

    /// Packing or unpacking the workspace archive failed.
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
}

/// Errors from [`Bundle`](crate::Bundle) pack/unpack.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive itself is malformed or could not be written.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive entry would extract outside the workspace directory.
    #[error("archive entry escapes workspace: '{name}'")]
    UnsafeEntry { name: String },
}
