// bundle.rs — Archive packer/unpacker for workspace directories.
//
// The whole directory tree travels, hidden git metadata included, so a
// reconstituted workspace sees its full prior history. The round-trip
// contract is unpack(pack_up()) == original tree.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::BundleError;

/// Packs one workspace directory into a self-contained zip byte stream and
/// materializes such a stream back into a directory.
pub struct Bundle {
    root: PathBuf,
}

impl Bundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serialize the directory tree into one archive.
    pub fn pack_up(&self) -> Result<Vec<u8>, BundleError> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| BundleError::Io {
                path: dir.clone(),
                source,
            })?;

            let mut children = 0usize;
            for entry in entries {
                let entry = entry.map_err(|source| BundleError::Io {
                    path: dir.clone(),
                    source,
                })?;
                children += 1;

                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }

                let name = self.entry_name(&path);
                zip.start_file(name, options)?;
                let mut file = File::open(&path).map_err(|source| BundleError::Io {
                    path: path.clone(),
                    source,
                })?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).map_err(|source| BundleError::Io {
                    path: path.clone(),
                    source,
                })?;
                zip.write_all(&buf).map_err(|source| BundleError::Io {
                    path: path.clone(),
                    source,
                })?;
            }

            // Empty directories still need an entry or they vanish from the
            // reconstituted tree.
            if children == 0 && dir != self.root {
                zip.add_directory(self.entry_name(&dir), options)?;
            }
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Materialize an archive produced by [`Bundle::pack_up`] into the
    /// directory, recreating the exact structure it captured.
    pub fn unpack(&self, bytes: &[u8]) -> Result<(), BundleError> {
        fs::create_dir_all(&self.root).map_err(|source| BundleError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let relative = entry.enclosed_name().ok_or_else(|| BundleError::UnsafeEntry {
                name: entry.name().to_string(),
            })?;
            let target = self.root.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|source| BundleError::Io {
                    path: target.clone(),
                    source,
                })?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| BundleError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            let mut file = File::create(&target).map_err(|source| BundleError::Io {
                path: target.clone(),
                source,
            })?;
            std::io::copy(&mut entry, &mut file).map_err(|source| BundleError::Io {
                path: target.clone(),
                source,
            })?;
        }

        Ok(())
    }

    /// Archive entry name for a path under the root: relative, forward
    /// slashes on every platform.
    fn entry_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
