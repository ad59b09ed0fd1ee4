//! Mapping an array's flat byte region onto rectangular chunks.
//!
//! A [`ChunkGrid`] partitions each axis of an array into intervals of the
//! chunk extent (the last interval truncated) and, for every chunk, works out
//! which contiguous byte spans of the store hold its elements.

pub mod access;

use crate::error::ConfigurationError;
use crate::layout::{validate_shape, Order};
use std::ops::Range;

/// A contiguous run of bytes in a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteSpan {
    /// Absolute offset from the start of the store.
    pub offset: u64,
    pub len: u64,
}

impl ByteSpan {
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Where one chunk lives, both in the array and in the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkDescriptor {
    /// Position of the chunk in the canonical enumeration order, or `None`
    /// for a region that isn't exactly one chunk of the grid.
    pub index: Option<usize>,
    /// Per-axis `[start, end)` in element units.
    pub coordinate_range: Vec<Range<usize>>,
    /// Byte spans covering the chunk, in storage order.
    pub byte_spans: Vec<ByteSpan>,
}

impl ChunkDescriptor {
    /// Extent of the chunk along each axis.
    pub fn shape(&self) -> Vec<usize> {
        self.coordinate_range.iter().map(|r| r.len()).collect()
    }

    /// Number of elements in the chunk.
    pub fn len(&self) -> usize {
        self.coordinate_range.iter().map(|r| r.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of bytes covered by the spans.
    pub fn nbytes(&self) -> u64 {
        self.byte_spans.iter().map(|span| span.len).sum()
    }
}

/// A regular chunk grid over an array stored contiguously in one store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    grid_shape: Vec<usize>,
    order: Order,
    itemsize: usize,
    base_offset: u64,
}

impl ChunkGrid {
    /// Creates a grid, clamping chunk extents larger than the array to the
    /// full extent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the ranks differ, any extent is
    /// zero, `itemsize` is zero, or the byte extent of the array overflows.
    pub fn new(
        shape: &[usize],
        chunk_shape: &[usize],
        order: Order,
        itemsize: usize,
        base_offset: u64,
    ) -> Result<ChunkGrid, ConfigurationError> {
        validate_shape(shape)?;
        if chunk_shape.len() != shape.len() {
            return Err(ConfigurationError::RankMismatch {
                shape_rank: shape.len(),
                chunk_rank: chunk_shape.len(),
            });
        }
        if let Some(axis) = chunk_shape.iter().position(|&len| len == 0) {
            return Err(ConfigurationError::ZeroChunkExtent { axis });
        }
        if itemsize == 0 {
            return Err(ConfigurationError::ZeroItemSize);
        }
        shape
            .iter()
            .try_fold(itemsize as u64, |acc, &len| acc.checked_mul(len as u64))
            .and_then(|nbytes| base_offset.checked_add(nbytes))
            .ok_or(ConfigurationError::Overflow)?;

        let chunk_shape: Vec<usize> = chunk_shape
            .iter()
            .zip(shape)
            .map(|(&chunk, &len)| chunk.min(len))
            .collect();
        let grid_shape: Vec<usize> = shape
            .iter()
            .zip(&chunk_shape)
            .map(|(&len, &chunk)| (len - 1) / chunk + 1)
            .collect();
        grid_shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or(ConfigurationError::Overflow)?;
        Ok(ChunkGrid {
            shape: shape.to_vec(),
            chunk_shape,
            grid_shape,
            order,
            itemsize,
            base_offset,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The chunk shape after clamping to the array shape.
    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Number of chunks along each axis.
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn num_chunks(&self) -> usize {
        self.grid_shape.iter().product()
    }

    /// Grid coordinates of the chunk at `index` in enumeration order.
    ///
    /// Chunks are enumerated in the same order as elements are stored: for
    /// [`Order::C`] the last axis varies fastest, for [`Order::F`] the first.
    fn grid_indices(&self, mut index: usize) -> Vec<usize> {
        let mut indices = vec![0; self.grid_shape.len()];
        for axis in self.order.storage_axes(self.grid_shape.len()).into_iter().rev() {
            indices[axis] = index % self.grid_shape[axis];
            index /= self.grid_shape[axis];
        }
        indices
    }

    /// Enumeration index of the chunk covering exactly `region`, if any.
    fn chunk_index(&self, region: &[Range<usize>]) -> Option<usize> {
        let mut index = 0;
        for axis in self.order.storage_axes(self.shape.len()) {
            let chunk = self.chunk_shape[axis];
            let r = &region[axis];
            let full = chunk.min(self.shape[axis] - r.start);
            if r.start % chunk != 0 || r.end != r.start + full {
                return None;
            }
            index = index * self.grid_shape[axis] + r.start / chunk;
        }
        Some(index)
    }

    /// Returns the descriptor of the chunk at `index`, or `None` if out of
    /// range.
    pub fn descriptor(&self, index: usize) -> Option<ChunkDescriptor> {
        if index >= self.num_chunks() {
            return None;
        }
        let region: Vec<Range<usize>> = self
            .grid_indices(index)
            .iter()
            .zip(&self.chunk_shape)
            .zip(&self.shape)
            .map(|((&i, &chunk), &len)| {
                let start = i * chunk;
                start..start + chunk.min(len - start)
            })
            .collect();
        let byte_spans = self.byte_spans(&region);
        Some(ChunkDescriptor {
            index: Some(index),
            coordinate_range: region,
            byte_spans,
        })
    }

    /// Iterates over all chunk descriptors in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkDescriptor> + '_ {
        (0..self.num_chunks()).filter_map(move |index| self.descriptor(index))
    }

    /// Returns a descriptor for an arbitrary rectangular `region` of the
    /// array, which need not be aligned to the grid.
    ///
    /// The descriptor's `index` is set only when `region` is exactly one
    /// chunk of the grid.
    pub fn region_descriptor(
        &self,
        region: &[Range<usize>],
    ) -> Result<ChunkDescriptor, ConfigurationError> {
        check_region(&self.shape, region)?;
        Ok(ChunkDescriptor {
            index: self.chunk_index(region),
            coordinate_range: region.to_vec(),
            byte_spans: self.byte_spans(region),
        })
    }

    /// Decomposes `region` into contiguous byte spans.
    ///
    /// Walking the storage axes from fastest to slowest, the contiguous run
    /// covers every axis the region spans in full plus the first axis it
    /// covers only partially. One span is emitted per combination of the
    /// remaining (outer) coordinates, in storage order.
    fn byte_spans(&self, region: &[Range<usize>]) -> Vec<ByteSpan> {
        let ndim = self.shape.len();
        let axes = self.order.storage_axes(ndim);

        // Element strides in the store.
        let mut strides = vec![0u64; ndim];
        let mut acc = 1u64;
        for &axis in axes.iter().rev() {
            strides[axis] = acc;
            acc *= self.shape[axis] as u64;
        }

        let mut run = 1u64;
        let mut split = 0;
        for (pos, &axis) in axes.iter().enumerate().rev() {
            run *= region[axis].len() as u64;
            split = pos;
            if region[axis].len() != self.shape[axis] {
                break;
            }
        }
        let (outer, inner) = axes.split_at(split);
        let run_bytes = run * self.itemsize as u64;
        let inner_start: u64 = inner
            .iter()
            .map(|&axis| region[axis].start as u64 * strides[axis])
            .sum();

        let num_spans = outer.iter().map(|&axis| region[axis].len()).product();
        let mut spans = Vec::with_capacity(num_spans);
        let mut index: Vec<usize> = outer.iter().map(|&axis| region[axis].start).collect();
        loop {
            let element = inner_start
                + outer
                    .iter()
                    .zip(&index)
                    .map(|(&axis, &i)| i as u64 * strides[axis])
                    .sum::<u64>();
            spans.push(ByteSpan {
                offset: self.base_offset + element * self.itemsize as u64,
                len: run_bytes,
            });

            // Advance the outer coordinates, fastest (last) first.
            let mut pos = outer.len();
            loop {
                if pos == 0 {
                    return spans;
                }
                pos -= 1;
                index[pos] += 1;
                if index[pos] < region[outer[pos]].end {
                    break;
                }
                index[pos] = region[outer[pos]].start;
            }
        }
    }
}

/// Checks that `region` is a non-empty rectangular region inside `shape`.
pub(crate) fn check_region(
    shape: &[usize],
    region: &[Range<usize>],
) -> Result<(), ConfigurationError> {
    if region.len() != shape.len() {
        return Err(ConfigurationError::RankMismatch {
            shape_rank: shape.len(),
            chunk_rank: region.len(),
        });
    }
    for (axis, (r, &len)) in region.iter().zip(shape).enumerate() {
        if r.start >= r.end {
            return Err(ConfigurationError::ZeroChunkExtent { axis });
        }
        if r.end > len {
            return Err(ConfigurationError::ShapeMismatch {
                expected: shape.to_vec(),
                found: region.iter().map(|r| r.end).collect(),
            });
        }
    }
    Ok(())
}

/// Maps an array's flat byte region onto the ordered list of chunk
/// descriptors.
///
/// # Errors
///
/// See [`ChunkGrid::new`].
pub fn map(
    shape: &[usize],
    chunk_shape: &[usize],
    order: Order,
    itemsize: usize,
    base_offset: u64,
) -> Result<Vec<ChunkDescriptor>, ConfigurationError> {
    let grid = ChunkGrid::new(shape, chunk_shape, order, itemsize, base_offset)?;
    Ok(grid.iter().collect())
}

/// Picks a chunk shape whose chunks hold at most about `target_bytes` bytes.
///
/// Fast-varying axes are kept whole as long as possible, so chunks tend to
/// be few contiguous spans; the slowest axis that doesn't fit is split.
pub fn auto_chunk_shape(
    shape: &[usize],
    itemsize: usize,
    order: Order,
    target_bytes: usize,
) -> Vec<usize> {
    let mut chunk_shape = vec![1; shape.len()];
    let mut budget = (target_bytes / itemsize.max(1)).max(1);
    for axis in order.storage_axes(shape.len()).into_iter().rev() {
        let len = shape[axis].max(1);
        if len <= budget {
            chunk_shape[axis] = len;
            budget /= len;
        } else {
            chunk_shape[axis] = budget;
            budget = 1;
        }
    }
    chunk_shape
}
