//! Transfer requests for the host bus.
//!
//! A request is created when a caller asks for a load, is immutable once queued, and is
//! consumed entirely by the [`BusController`](super::BusController). File sources are
//! read when the request is built, so an unreadable file is reported to the caller
//! immediately instead of surfacing mid-transfer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::SourceError;

/// Width of one bus datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusWidth {
    /// 8-bit data lines; one byte per accepted edge.
    #[default]
    #[serde(alias = "8")]
    Byte,
    /// 16-bit data lines; two bytes per accepted edge, little-endian.
    #[serde(alias = "16")]
    Word,
}

impl BusWidth {
    /// Bytes moved per accepted edge.
    pub fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to core: the core receives the request's bytes.
    Download,
    /// Core to host: the request's length defines the window read back.
    Upload,
}

/// Where the bytes of a transfer come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    /// A file read in full when the request is queued.
    File(PathBuf),
    /// An in-memory buffer.
    Bytes(Vec<u8>),
}

impl TransferSource {
    fn load(self) -> Result<(Vec<u8>, String), SourceError> {
        match self {
            Self::File(path) => {
                let data = fs::read(&path).map_err(|source| SourceError::Unreadable {
                    path: path.clone(),
                    source,
                })?;
                Ok((data, path.display().to_string()))
            }
            Self::Bytes(data) => {
                let label = format!("<buffer {} bytes>", data.len());
                Ok((data, label))
            }
        }
    }
}

impl From<Vec<u8>> for TransferSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl From<&[u8]> for TransferSource {
    fn from(data: &[u8]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl From<PathBuf> for TransferSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for TransferSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

/// One queued bus transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    data: Vec<u8>,
    index: u8,
    base_address: u32,
    direction: Direction,
    label: String,
}

impl TransferRequest {
    /// Reads `source` and builds a request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unreadable`] if a file source cannot be read and
    /// [`SourceError::Empty`] if the source holds no bytes.
    pub fn new(
        source: TransferSource,
        index: u8,
        base_address: u32,
        direction: Direction,
    ) -> Result<Self, SourceError> {
        let (data, label) = source.load()?;
        if data.is_empty() {
            return Err(SourceError::Empty(label));
        }
        Ok(Self {
            data,
            index,
            base_address,
            direction,
            label,
        })
    }

    /// Payload bytes (download) or window template (upload).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes moved by this request.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; empty requests are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Destination index inside the core.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Address of the first byte.
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    /// Transfer direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Human-readable origin (file path or buffer size) for logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Bytes read back from the core by a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    /// Source index inside the core.
    pub index: u8,
    /// Address of the first byte.
    pub base_address: u32,
    /// Uploaded bytes.
    pub data: Vec<u8>,
}
