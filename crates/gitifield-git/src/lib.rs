//! # gitifield-git
//!
//! Thin synchronous adapter over the `git` binary for gitifield workspaces.
//!
//! A [`GitRepo`] is bound to one working directory and drives the primitives
//! the workspace layer needs: init, identity config, stage/commit, history
//! rewrite (amend date/author), working-tree reset, checkout (whole tree and
//! single file), patch application, and log listing.
//!
//! Every invocation runs under an explicit deadline; a hung git process is
//! killed and reported as [`GitError::Timeout`] instead of blocking the
//! caller forever.

pub mod error;
pub mod repo;

pub use error::GitError;
pub use repo::{GitRepo, LogEntry, COMMIT_DATE_FORMAT};
