//! # gitifield-workspace
//!
//! Per-field, filesystem-backed content versioning for a single text blob.
//!
//! A [`Workspace`] owns one directory under the configured root, tracks one
//! file named `content` in a git repository there, and exposes update,
//! checkout, revert, patch-application, and history-listing operations. The
//! whole directory, git metadata included, packs into one portable archive
//! via [`Bundle`], and a workspace can be reconstituted from those bytes at
//! construction time.
//!
//! ## Key components
//!
//! - [`Workspace`] — lifecycle and operations over the tracked content file.
//!   Repository initialization is lazy: the first operation that needs the
//!   backend creates the directory, the content file, and the repository.
//! - [`Bundle`] — zip packer/unpacker turning the workspace directory into a
//!   byte stream and back; `unpack(pack_up())` reproduces the directory tree.
//! - [`WorkspaceConfig`] / [`Identity`] — injected configuration: parent
//!   directory, committer identity, subprocess deadline.
//!
//! One owner per workspace instance at a time: operations are blocking
//! filesystem and subprocess sequences with no internal locking. Distinct
//! workspaces are independent and may run in parallel.

pub mod bundle;
pub mod config;
pub mod error;
pub mod workspace;

pub use bundle::Bundle;
pub use config::{Identity, WorkspaceConfig};
pub use error::{BundleError, WorkspaceError};
pub use workspace::Workspace;

pub use gitifield_git::LogEntry;
