//! Kit file IO.
//!
//! Kits are small JSON documents, but they are also the only copy of a
//! recovery path, so writes are crash-safe (temp file, fsync, atomic rename,
//! directory fsync) and both kit and lock files are created with 0600.
//! Advisory locks keep a reader from observing a half-renamed kit when some
//! other process is writing next to it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[derive(Debug, Error)]
pub enum KitIoError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("failed to acquire kit file lock")]
    LockFailed,

    #[error("file locking is not supported on this platform")]
    UnsupportedPlatform,

    #[error("kit path has no parent directory")]
    NoParentDir,
}

/// Held advisory lock; released on drop.
#[derive(Debug)]
struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    fn shared(path: &Path) -> Result<Self, KitIoError> {
        Self::acquire(path, false)
    }

    fn exclusive(path: &Path) -> Result<Self, KitIoError> {
        Self::acquire(path, true)
    }

    fn acquire(target: &Path, exclusive: bool) -> Result<Self, KitIoError> {
        let lock_path = lock_path_for(target);
        ensure_parent_dir(&lock_path)?;

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        options.mode(0o600);
        let file = options.open(&lock_path)?;
        restrict_permissions(&lock_path)?;

        #[cfg(unix)]
        {
            let op = if exclusive {
                libc::LOCK_EX
            } else {
                libc::LOCK_SH
            };
            // flock is advisory: it only has to coordinate this tool's own
            // processes, which all come through here.
            if unsafe { libc::flock(file.as_raw_fd(), op) } != 0 {
                return Err(KitIoError::LockFailed);
            }
            Ok(Self { file })
        }

        #[cfg(not(unix))]
        {
            let _ = (file, exclusive);
            Err(KitIoError::UnsupportedPlatform)
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Read a kit (or any sibling artifact) under a shared lock.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, KitIoError> {
    let _lock = FileLock::shared(path)?;

    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Atomically replace `path` with `bytes` under an exclusive lock.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), KitIoError> {
    let _lock = FileLock::exclusive(path)?;

    let dir = path.parent().ok_or(KitIoError::NoParentDir)?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().sync_all()?;

    #[cfg(unix)]
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(0o600))?;

    tmp.persist(path).map_err(std::io::Error::from)?;
    restrict_permissions(path)?;

    // Rename durability needs the directory flushed too.
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;

    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), KitIoError> {
    let parent = path.parent().ok_or(KitIoError::NoParentDir)?;
    fs::create_dir_all(parent)?;
    Ok(())
}

fn restrict_permissions(path: &Path) -> Result<(), KitIoError> {
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kit.json");

        write_bytes_atomic(&path, b"{\"a\":1}").unwrap();
        assert_eq!(read_bytes(&path).unwrap(), b"{\"a\":1}");

        write_bytes_atomic(&path, b"{\"a\":2}").unwrap();
        assert_eq!(read_bytes(&path).unwrap(), b"{\"a\":2}");
    }

    #[test]
    #[cfg(unix)]
    fn kit_and_lock_files_are_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kit.json");
        write_bytes_atomic(&path, b"{}").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let lock_mode = fs::metadata(lock_path_for(&path))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(lock_mode, 0o600);
    }

    #[test]
    fn missing_file_reads_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_bytes(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(KitIoError::Io(_))));
    }
}
