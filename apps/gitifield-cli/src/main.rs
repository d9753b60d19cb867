//! # gitifield-cli
//!
//! Command-line surface over archive-persisted gitifield workspaces.
//!
//! The archive file is the persisted field value: each command unpacks it
//! into a scratch workspace, runs one operation, and (for mutations) packs
//! the result back:
//! - `gitifield update <archive> --from <file|->` — record a new version
//! - `gitifield show <archive>` — print the current content
//! - `gitifield log <archive> [--json]` — list versions, newest first
//! - `gitifield checkout <archive> <id>` — print content as of a version
//! - `gitifield revert <archive> <id>` — restore a version as a new entry
//! - `gitifield apply-patch <archive> <target> <patch>` — patch and record

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use gitifield_workspace::{Workspace, WorkspaceConfig};

/// Versioned single-field content store, persisted as one archive file.
#[derive(Parser)]
#[command(name = "gitifield", version, about)]
struct Cli {
    /// Path to a gitifield.toml (committer identity, workspace root).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new version of the content.
    Update {
        /// Archive file holding the field value.
        archive: PathBuf,
        /// File with the new content, or - for stdin.
        #[arg(long, default_value = "-")]
        from: PathBuf,
    },
    /// Print the current content.
    Show {
        archive: PathBuf,
    },
    /// List all versions, newest first.
    Log {
        archive: PathBuf,
        /// Emit machine-readable JSON instead of one line per version.
        #[arg(long)]
        json: bool,
    },
    /// Print the content as of a version id.
    Checkout {
        archive: PathBuf,
        id: String,
    },
    /// Restore the content as of a version id as a new version.
    Revert {
        archive: PathBuf,
        id: String,
    },
    /// Apply a patch file and record the result as a new version.
    ApplyPatch {
        archive: PathBuf,
        /// Transient target file name the patch applies to.
        target: String,
        /// Patch file to apply.
        patch: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WorkspaceConfig::load(path)
            .map_err(|err| anyhow::anyhow!("failed to load {}: {err}", path.display()))?,
        None => WorkspaceConfig::default(),
    };

    match cli.command {
        Commands::Update { archive, from } => {
            let content = read_content(&from)?;
            let mut ws = load_workspace(&archive, config)?;
            ws.update(&content)?;
            persist(&mut ws, &archive)
        }
        Commands::Show { archive } => {
            let mut ws = load_workspace(&archive, config)?;
            print!("{}", ws.content()?);
            ws.clean()?;
            Ok(())
        }
        Commands::Log { archive, json } => {
            let mut ws = load_workspace(&archive, config)?;
            let logs = ws.logs()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                for entry in &logs {
                    println!("{}  {}", entry.id, entry.date);
                }
            }
            ws.clean()?;
            Ok(())
        }
        Commands::Checkout { archive, id } => {
            let mut ws = load_workspace(&archive, config)?;
            let content = ws.checkout(&id)?;
            print!("{content}");
            ws.clean()?;
            Ok(())
        }
        Commands::Revert { archive, id } => {
            let mut ws = load_workspace(&archive, config)?;
            ws.revert(&id)?;
            persist(&mut ws, &archive)
        }
        Commands::ApplyPatch {
            archive,
            target,
            patch,
        } => {
            let mut ws = load_workspace(&archive, config)?;
            let applied = ws.apply_patch(&target, &patch)?;
            persist(&mut ws, &archive)?;
            anyhow::ensure!(applied, "patch did not apply cleanly");
            Ok(())
        }
    }
}

/// Seed a scratch workspace from the archive file; a missing archive means
/// an empty, brand-new field value.
fn load_workspace(archive: &Path, config: WorkspaceConfig) -> anyhow::Result<Workspace> {
    let data = match fs::read(archive) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            return Err(err).context(format!("reading archive {}", archive.display()));
        }
    };
    Ok(Workspace::with_config(&data, None, config)?)
}

/// Pack the workspace back into the archive file and release its directory.
fn persist(ws: &mut Workspace, archive: &Path) -> anyhow::Result<()> {
    let bytes = ws.serialize()?;
    fs::write(archive, bytes).context(format!("writing archive {}", archive.display()))?;
    ws.clean()?;
    Ok(())
}

fn read_content(from: &Path) -> anyhow::Result<String> {
    if from == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("reading content from stdin")?;
        Ok(content)
    } else {
        fs::read_to_string(from).context(format!("reading content from {}", from.display()))
    }
}
