//! Snapshot persistence.
//!
//! A snapshot file is a small header followed by the core's opaque state blob:
//!
//! | Field     | Encoding                         |
//! |-----------|----------------------------------|
//! | magic     | `CSNP`                           |
//! | version   | `u16` little-endian              |
//! | model id  | `u16` LE length + UTF-8 bytes    |
//! | counter   | `u64` little-endian              |
//! | core blob | remainder of the file            |
//!
//! Saves go through a temporary file in the destination directory and are
//! atomically renamed into place, so a failed save never leaves a partial image.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::common::SnapshotError;
use crate::common::constants::{SNAPSHOT_COUNTER_BYTES, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::model::SimCore;

/// Decoded snapshot header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImage {
    /// Identifier of the core build that produced the blob.
    pub model_id: String,
    /// Simulation counter at save time.
    pub counter: u64,
    /// Opaque core state.
    pub blob: Vec<u8>,
}

impl SnapshotImage {
    /// Serialises the image.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Format`] if the model identifier is longer than
    /// `u16::MAX` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let id = self.model_id.as_bytes();
        let id_len = u16::try_from(id.len())
            .map_err(|_| SnapshotError::Format("model identifier too long".into()))?;
        let mut out =
            Vec::with_capacity(4 + 2 + 2 + id.len() + SNAPSHOT_COUNTER_BYTES + self.blob.len());
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&id_len.to_le_bytes());
        out.extend_from_slice(id);
        out.extend_from_slice(&self.counter.to_le_bytes());
        out.extend_from_slice(&self.blob);
        Ok(out)
    }

    /// Parses an image.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Format`] on bad magic, an unknown version, a
    /// non-UTF-8 model identifier or a truncated header.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(SNAPSHOT_MAGIC.len())? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::Format("bad magic".into()));
        }
        let version = r.u16()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Format(format!(
                "unsupported version {version}"
            )));
        }
        let id_len = usize::from(r.u16()?);
        let model_id = std::str::from_utf8(r.take(id_len)?)
            .map_err(|_| SnapshotError::Format("model identifier is not UTF-8".into()))?
            .to_owned();
        let counter = r.u64()?;
        let blob = r.rest().to_vec();
        Ok(Self {
            model_id,
            counter,
            blob,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| SnapshotError::Format("truncated snapshot".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        let mut buf = [0u8; SNAPSHOT_COUNTER_BYTES];
        buf.copy_from_slice(self.take(SNAPSHOT_COUNTER_BYTES)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Saves and restores core state to snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    default_path: PathBuf,
    last_path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Creates a store whose quick save/restore slot is `default_path`.
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
            last_path: None,
        }
    }

    /// File used when no path is given.
    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Changes the quick save/restore slot.
    pub fn set_default_path(&mut self, path: impl Into<PathBuf>) {
        self.default_path = path.into();
    }

    /// Path of the last successful save or restore.
    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    /// Writes `counter` and the core's state to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the temporary file cannot be created, written
    /// or renamed; the destination is left untouched.
    pub fn save<C: SimCore + ?Sized>(
        &mut self,
        path: &Path,
        counter: u64,
        core: &C,
    ) -> Result<(), SnapshotError> {
        let image = SnapshotImage {
            model_id: core.model_id().to_owned(),
            counter,
            blob: core.save_state(),
        };
        let bytes = image.encode()?;
        write_atomic(path, &bytes).inspect_err(|e| warn!("snapshot save failed: {e}"))?;
        info!(path = %path.display(), counter, bytes = bytes.len(), "snapshot saved");
        self.last_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Loads `path` into the core and returns the saved counter.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the file cannot be read and
    /// [`SnapshotError::Format`] if it is corrupt, belongs to another model, or the
    /// core rejects the blob. The core's previous state is kept in every error case.
    pub fn restore<C: SimCore + ?Sized>(
        &mut self,
        path: &Path,
        core: &mut C,
    ) -> Result<u64, SnapshotError> {
        let result = Self::restore_inner(path, core);
        match &result {
            Ok(counter) => {
                info!(path = %path.display(), counter, "snapshot restored");
                self.last_path = Some(path.to_path_buf());
            }
            Err(e) => warn!(path = %path.display(), "snapshot restore failed: {e}"),
        }
        result
    }

    fn restore_inner<C: SimCore + ?Sized>(path: &Path, core: &mut C) -> Result<u64, SnapshotError> {
        let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = SnapshotImage::decode(&bytes)?;
        if image.model_id != core.model_id() {
            return Err(SnapshotError::Format(format!(
                "snapshot is for model '{}', core is '{}'",
                image.model_id,
                core.model_id()
            )));
        }

        let backup = core.save_state();
        if let Err(e) = core.restore_state(&image.blob) {
            if let Err(reapply) = core.restore_state(&backup) {
                warn!("could not re-apply previous core state: {reapply}");
            }
            return Err(e);
        }
        Ok(image.counter)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |source: io::Error| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    let _ = tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
