//! Options for chunked loads and saves.

use crate::chunk::auto_chunk_shape;
use crate::error::ConfigurationError;
use crate::layout::Order;

/// Default upper bound on the size of automatically chosen chunks.
pub const DEFAULT_TARGET_CHUNK_BYTES: usize = 128 << 20;

/// Chunking and parallelism options.
///
/// ```
/// use ndarray_npy_chunked::ChunkOptions;
///
/// let options = ChunkOptions::default().with_chunks([64, 64]).with_workers(4);
/// assert_eq!(options.workers(), Some(4));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkOptions {
    chunks: Option<Vec<usize>>,
    workers: Option<usize>,
    target_chunk_bytes: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunks: None,
            workers: None,
            target_chunk_bytes: DEFAULT_TARGET_CHUNK_BYTES,
        }
    }
}

impl ChunkOptions {
    /// Return the explicit per-axis chunk extents, if set.
    #[must_use]
    pub fn chunks(&self) -> Option<&[usize]> {
        self.chunks.as_deref()
    }

    /// Set the per-axis chunk extents.
    pub fn set_chunks(&mut self, chunks: impl Into<Vec<usize>>) -> &mut Self {
        self.chunks = Some(chunks.into());
        self
    }

    /// Set the per-axis chunk extents.
    #[must_use]
    pub fn with_chunks(mut self, chunks: impl Into<Vec<usize>>) -> Self {
        self.chunks = Some(chunks.into());
        self
    }

    /// Return the number of worker threads, if set.
    ///
    /// `None` means the global `rayon` thread pool.
    #[must_use]
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    /// Set the number of worker threads.
    pub fn set_workers(&mut self, workers: usize) -> &mut Self {
        self.workers = Some(workers);
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Return the target chunk size in bytes used when no chunks are set.
    #[must_use]
    pub fn target_chunk_bytes(&self) -> usize {
        self.target_chunk_bytes
    }

    /// Set the target chunk size in bytes.
    #[must_use]
    pub fn with_target_chunk_bytes(mut self, target_chunk_bytes: usize) -> Self {
        self.target_chunk_bytes = target_chunk_bytes;
        self
    }

    /// The chunk shape to use for an array, either the explicit one or one
    /// chosen from the target chunk size.
    pub fn chunk_shape_for(
        &self,
        shape: &[usize],
        itemsize: usize,
        order: Order,
    ) -> Result<Vec<usize>, ConfigurationError> {
        match &self.chunks {
            Some(chunks) if chunks.len() != shape.len() => Err(ConfigurationError::RankMismatch {
                shape_rank: shape.len(),
                chunk_rank: chunks.len(),
            }),
            Some(chunks) => Ok(chunks.clone()),
            None => Ok(auto_chunk_shape(
                shape,
                itemsize,
                order,
                self.target_chunk_bytes,
            )),
        }
    }
}
