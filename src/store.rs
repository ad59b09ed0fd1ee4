//! File-backed byte stores.

use crate::error::{StoreIoError, StoreOp};
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// How a store is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreMode {
    Read,
    /// Write into an existing file without truncating it.
    Write,
}

/// A seekable byte store identified by a file path and an open mode.
///
/// The store doesn't hold an open handle: each chunk access opens its own,
/// so concurrent tasks never share a file position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStore {
    path: PathBuf,
    mode: StoreMode,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, mode: StoreMode) -> FileStore {
        FileStore {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Returns `true` if `path` names the same existing file as this store.
    pub fn is_same_file(&self, path: &Path) -> bool {
        match (self.path.canonicalize(), path.canonicalize()) {
            (Ok(ours), Ok(theirs)) => ours == theirs,
            _ => false,
        }
    }

    /// Opens a fresh handle for accessing the chunk at `coordinates`.
    pub fn open(&self, coordinates: &[Range<usize>]) -> Result<File, StoreIoError> {
        let mut options = OpenOptions::new();
        match self.mode {
            StoreMode::Read => options.read(true),
            StoreMode::Write => options.read(true).write(true),
        };
        options.open(&self.path).map_err(|err| {
            StoreIoError::new(StoreOp::Open, coordinates, 0, err).with_path(&self.path)
        })
    }

    /// Creates (or truncates) the file and sizes it to `len` bytes, writing
    /// `prefix` at the start.
    pub(crate) fn create(&self, prefix: &[u8], len: u64) -> io::Result<()> {
        use std::io::Write;
        let mut file = File::create(&self.path)?;
        file.write_all(prefix)?;
        file.set_len(len)?;
        file.sync_all()
    }
}

/// A scratch path next to `path`, for building a replacement file that is
/// then renamed over it.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
