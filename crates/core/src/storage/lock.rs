use anyhow::Context;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Locks older than this belong to a crashed run and may be taken over.
pub const STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// Best-effort guard against two pipeline runs writing the same snapshot. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// `<snapshot path>.lock`
    pub fn path_for(snapshot_path: &Path) -> PathBuf {
        let mut name = snapshot_path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// `Ok(None)` when another live run holds the lock.
    pub fn try_acquire(path: &Path) -> anyhow::Result<Option<RunLock>> {
        match create(path) {
            Ok(lock) => return Ok(Some(lock)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => {
                return Err(err).with_context(|| format!("create run lock {}", path.display()))
            }
        }

        let age = lock_age(path)?;
        if age < STALE_AFTER {
            return Ok(None);
        }

        tracing::warn!(path = %path.display(), age_secs = age.as_secs(), "taking over stale run lock");
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove stale run lock {}", path.display()))
            }
        }

        match create(path) {
            Ok(lock) => Ok(Some(lock)),
            // Another run won the takeover.
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err).with_context(|| format!("create run lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release run lock");
        }
    }
}

fn create(path: &Path) -> std::io::Result<RunLock> {
    create_with(path, write_owner)
}

/// A lock file whose owner line could not be written is removed again.
fn create_with<F>(path: &Path, write: F) -> std::io::Result<RunLock>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
{
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    if let Err(err) = write(&mut file) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(err);
    }
    Ok(RunLock {
        path: path.to_path_buf(),
    })
}

fn write_owner(file: &mut std::fs::File) -> std::io::Result<()> {
    writeln!(
        file,
        "pid={} started_at={}",
        std::process::id(),
        chrono::Utc::now().to_rfc3339()
    )?;
    file.sync_all()
}

fn lock_age(path: &Path) -> anyhow::Result<Duration> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("inspect run lock {}", path.display()))?;
    // A clock that moved backwards makes the lock look brand new.
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
