//! This crate reads and writes [`ndarray`] arrays stored in [`.npy`] files
//! (and [`.npz`] archives, tarballs and text files) chunk by chunk, so arrays
//! larger than memory can be processed in pieces and in parallel.
//!
//! [`ndarray`]: https://github.com/rust-ndarray/ndarray
//! [`.npy`]: https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html
//! [`.npz`]: https://numpy.org/doc/stable/reference/generated/numpy.savez.html
//!
//! The pieces, from the bottom up:
//!
//! * [`layout`] validates an [`ArrayHeader`] (shape, [`DType`], data byte
//!   offset, [`Order`]) against the requested element type.
//! * [`chunk::map`] and [`ChunkGrid`] split the array into rectangular
//!   chunks and work out the byte spans holding each one.
//! * [`chunk::access`] reads or writes one chunk of a seekable store.
//! * [`LazyArray`] builds a graph of independent chunk tasks, run in
//!   parallel by [`LazyArray::compute`].
//!
//! # Example
//!
//! ```no_run
//! use ndarray::ArrayD;
//! use ndarray_npy_chunked::{lazy, npy, LazyArray};
//!
//! let header = npy::head("big.npy")?;
//! let array: LazyArray<f64> = LazyArray::load("big.npy", header, &[1024, 1024])?;
//! let scaled = array.map(|x| x * 2.0);
//! let written: ArrayD<f64> = lazy::save(scaled, "scaled.npy", &[1024, 1024])?.compute()?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! See [`format`] for loading and saving by path across all supported
//! formats.
//!
//! # Limitations
//!
//! * Only fixed-size numeric element types (and `bool`) are supported;
//!   structured and object dtypes are rejected.
//!
//! * Members of compressed `.npz` archives and compressed tarballs can't be
//!   addressed by byte offset, so they're read into memory before being
//!   chunked.

pub mod chunk;
pub mod dtype;
pub mod error;
pub mod format;
pub mod layout;
pub mod lazy;
pub mod npy;
#[cfg(feature = "npz")]
pub mod npz;
mod options;
pub mod store;
#[cfg(feature = "tar")]
pub mod tarball;
pub mod text;

pub use crate::chunk::{map, ByteSpan, ChunkDescriptor, ChunkGrid};
pub use crate::dtype::{DType, Endianness, Kind};
pub use crate::error::{
    ConfigurationError, Error, InvalidDataError, ParseTextError, StoreIoError, StoreOp,
};
pub use crate::format::{ArchiveKind, Format, Location, DEFAULT_MEMBER};
pub use crate::layout::{validate, validate_for, ArrayHeader, Extensions, Order};
pub use crate::lazy::{ChunkTask, IntoLazyArray, LazyArray};
pub use crate::npy::elements::Element;
#[cfg(feature = "npz")]
pub use crate::npz::{MemberLocation, NpzReader, NpzWriter};
pub use crate::options::{ChunkOptions, DEFAULT_TARGET_CHUNK_BYTES};
