//! Atomic file replacement and cross-process locking.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

const LOCK_POLL: Duration = Duration::from_millis(25);

/// Writes a file by streaming into a uniquely named sibling temp file,
/// syncing it, and renaming it over `path`. Readers see either the old or
/// the new content, never a partial write.
///
/// The parent directory is created if needed. On error the temp file is
/// removed and `path` is left untouched.
pub fn write_atomic<E, F>(path: &Path, write: F) -> Result<(), E>
where
    E: From<io::Error>,
    F: FnOnce(&mut dyn Write) -> Result<(), E>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Dropping the temp file on an early return deletes it.
    let mut tmp = NamedTempFile::new_in(parent)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// An exclusive lock held by the existence of a file.
///
/// The file is created with `create_new`, so only one holder (in any
/// process) can own it. It is removed when the guard is dropped.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquires the lock at `path`, polling until `wait` elapses.
    ///
    /// Returns an error of kind [`ErrorKind::WouldBlock`] if another holder
    /// still owns the lock after `wait`.
    pub fn acquire(path: &Path, wait: Duration) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let deadline = Instant::now() + wait;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    debug!(path = %path.display(), "acquired lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            ErrorKind::WouldBlock,
                            format!("lock {} is held", path.display()),
                        ));
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}
