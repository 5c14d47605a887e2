//! Crash-safe replacement of small state files.
//!
//! The new contents go to a temp file in the destination directory, which is
//! then renamed over the target. Where rename-over-existing fails the old file
//! is moved to `<name>.bak` first and restored if the second rename fails, so
//! a reader always finds either the old or the new contents.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// `fsync` the temp file before renaming it into place.
    pub sync_file: bool,
    /// Create missing parent directories.
    pub create_parents: bool,
    /// Unix mode for the persisted file; `None` keeps the umask default.
    pub mode: Option<u32>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync_file: true,
            create_parents: true,
            mode: Some(0o600),
        }
    }
}

/// Restore `path` from `path.bak` when a previous replacement was interrupted
/// between moving the old file aside and renaming the new one in.
///
/// Returns whether a backup was restored.
pub fn recover_bak_file(path: &Path) -> bool {
    let backup = path.with_extension("bak");
    if path.exists() || !backup.exists() {
        return false;
    }
    match fs::rename(&backup, path) {
        Ok(()) => {
            warn!(path = %path.display(), "Restored state file from interrupted write");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to restore .bak file: {e}");
            false
        }
    }
}

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with_options(path, bytes, WriteOptions::default())
}

pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: WriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if options.create_parents {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if options.sync_file {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = path.with_extension("bak");
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;
        if let Err(second) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(second.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            debug!(path = %backup.display(), "Failed to remove .bak after write: {e}");
        }
    }

    #[cfg(unix)]
    if let Some(mode) = options.mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }

    Ok(())
}
