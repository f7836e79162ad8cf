//! Single-writer lock for the database file.
//!
//! An advisory exclusive lock on `.codeatlas/codeatlas.lock` guards the
//! write path. The lock file holds the owner's process id so a blocked
//! writer can name the culprit. The operating system drops the lock when
//! the owner exits, so stale locks reclaim themselves; only a live owner
//! makes acquisition fail.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{AtlasError, Result};

/// RAII guard for the writer lock. Unlocks on drop.
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl WriterLock {
    /// Acquire the writer lock at `path`, writing our PID into the file.
    ///
    /// Fails with [`AtlasError::Lock`] when another live process holds it;
    /// the error names the lock file and the owning PID.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| AtlasError::file(path, format!("cannot open lock file: {e}")))?;

        if file.try_lock_exclusive().is_err() {
            let mut owner = String::new();
            let _ = file.read_to_string(&mut owner);
            let pid = owner.trim().to_string();
            return Err(AtlasError::Lock {
                pid: if pid.is_empty() { "unknown".to_string() } else { pid },
                lock_file: path.to_path_buf(),
            });
        }

        // We own the lock: stamp our PID over whatever a dead owner left.
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

impl std::fmt::Debug for WriterLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterLock").field("path", &self.path).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
