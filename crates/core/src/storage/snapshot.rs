use crate::domain::contract::PreviousSnapshot;
use crate::domain::snapshot::Snapshot;
use crate::storage::error::PersistenceError;
use anyhow::Context;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// The single JSON document consumers read, plus the previous-run view the pipeline falls
/// back on.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lenient read of the last published document. Missing or unreadable files yield an
    /// empty view; a run must never fail because of them.
    pub fn load_previous(&self) -> PreviousSnapshot {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no previous snapshot; starting fresh");
                return PreviousSnapshot::default();
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "previous snapshot unreadable; ignoring it");
                return PreviousSnapshot::default();
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(doc) => PreviousSnapshot::from_value(&doc),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "previous snapshot is not valid JSON; ignoring it");
                PreviousSnapshot::default()
            }
        }
    }

    /// Strict read for consumers; `None` when nothing has been published yet.
    pub fn load_snapshot(&self) -> anyhow::Result<Option<Snapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read snapshot {}", self.path.display()))
            }
        };
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("decode snapshot {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Replaces the document atomically. Readers see the old file or the new one, never a
    /// partial write.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(bad) = snapshot.numeric_leaves().into_iter().find(|x| !x.is_finite()) {
            return Err(PersistenceError::new(
                &self.path,
                "validate",
                format!("non-finite number in snapshot: {bad}"),
            ));
        }
        let mut body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PersistenceError::new(&self.path, "serialize", e))?;
        body.push(b'\n');
        write_atomic(&self.path, &body)
    }
}

/// Writes `bytes` to a temp file next to `path`, syncs it, then renames it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| PersistenceError::new(path, "create_dir", e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PersistenceError::new(path, "path", "path has no file name"))?;
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let res = write_and_sync(&tmp, bytes)
        .map_err(|e| PersistenceError::new(path, "write_temp", e))
        .and_then(|()| {
            std::fs::rename(&tmp, path).map_err(|e| PersistenceError::new(path, "rename", e))
        });

    if res.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    res
}

fn write_and_sync(tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()
}
