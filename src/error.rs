//! Error types.

use crate::dtype::DType;
use crate::npy::header::{ReadHeaderError, WriteHeaderError};
use py_literal::Value as PyValue;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::PathBuf;

/// An invalid shape, chunk shape, element type, order or format.
///
/// These are always reported before the store is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// The array has rank 0.
    EmptyShape,
    /// An axis of the array has zero extent.
    ZeroExtent { axis: usize },
    /// The chunk shape has a different rank than the array shape.
    RankMismatch { shape_rank: usize, chunk_rank: usize },
    /// An axis of the chunk shape has zero extent.
    ZeroChunkExtent { axis: usize },
    /// The element size is zero.
    ZeroItemSize,
    /// The type descriptor is not a supported fixed-width numeric type.
    UnsupportedDescriptor(PyValue),
    /// The element type requested by the caller doesn't match the dtype.
    WrongElementType { requested: DType, found: DType },
    /// The number of elements or bytes overflows.
    Overflow,
    /// A layout order string other than `"C"` or `"F"`.
    UnknownOrder(String),
    /// A format name or file extension which isn't recognized.
    UnknownFormat(String),
    /// The block shape doesn't match the shape it's written into.
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// The operation is not supported for this format or array.
    Unsupported(String),
    /// A save would overwrite a file its own data is read from.
    SaveOverSource { path: PathBuf },
}

impl StdError for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigurationError::*;
        match self {
            EmptyShape => write!(f, "arrays must have at least one axis"),
            ZeroExtent { axis } => write!(f, "axis {} has zero extent", axis),
            RankMismatch {
                shape_rank,
                chunk_rank,
            } => write!(
                f,
                "chunk shape has rank {} but array shape has rank {}",
                chunk_rank, shape_rank
            ),
            ZeroChunkExtent { axis } => write!(f, "chunk shape has zero extent along axis {}", axis),
            ZeroItemSize => write!(f, "element size must be positive"),
            UnsupportedDescriptor(desc) => write!(f, "unsupported type descriptor: {}", desc),
            WrongElementType { requested, found } => write!(
                f,
                "requested element type {} does not match array dtype {}",
                requested, found
            ),
            Overflow => write!(f, "number of elements or bytes overflows"),
            UnknownOrder(order) => write!(f, "unknown layout order: {:?}", order),
            UnknownFormat(name) => write!(f, "unknown format: {}", name),
            ShapeMismatch { expected, found } => write!(
                f,
                "block has shape {:?} but shape {:?} was expected",
                found, expected
            ),
            Unsupported(msg) => write!(f, "unsupported operation: {}", msg),
            SaveOverSource { path } => write!(
                f,
                "cannot save to {}: the array being saved reads from it",
                path.display()
            ),
        }
    }
}

/// The store operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Open,
    Seek,
    Read,
    Write,
    Flush,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            StoreOp::Open => "open",
            StoreOp::Seek => "seek",
            StoreOp::Read => "read",
            StoreOp::Write => "write",
            StoreOp::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// A failure at the byte-store boundary while accessing one chunk.
#[derive(Debug)]
pub struct StoreIoError {
    pub op: StoreOp,
    /// Path of the store, if known.
    pub path: Option<PathBuf>,
    /// Coordinate range of the chunk being accessed.
    pub coordinates: Vec<Range<usize>>,
    /// Absolute byte offset of the failed access.
    pub byte_offset: u64,
    pub source: io::Error,
}

impl StoreIoError {
    pub(crate) fn new(
        op: StoreOp,
        coordinates: &[Range<usize>],
        byte_offset: u64,
        source: io::Error,
    ) -> StoreIoError {
        StoreIoError {
            op,
            path: None,
            coordinates: coordinates.to_vec(),
            byte_offset,
            source,
        }
    }

    pub(crate) fn with_path(mut self, path: impl Into<PathBuf>) -> StoreIoError {
        self.path = Some(path.into());
        self
    }
}

impl StdError for StoreIoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl fmt::Display for StoreIoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} failed", self.op)?;
        if let Some(path) = &self.path {
            write!(f, " on {}", path.display())?;
        }
        write!(
            f,
            " for chunk {:?} at byte offset {}: {}",
            self.coordinates, self.byte_offset, self.source
        )
    }
}

/// An error decoding element data.
#[derive(Debug)]
pub enum InvalidDataError {
    /// A `bool` element with a byte value other than `0x00` or `0x01`.
    Bool { bad_value: u8 },
    /// The number of bytes isn't a multiple of the element size.
    Length { len: usize, itemsize: usize },
}

impl StdError for InvalidDataError {}

impl fmt::Display for InvalidDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidDataError::Bool { bad_value } => {
                write!(f, "error parsing value {:#04x} as a bool", bad_value)
            }
            InvalidDataError::Length { len, itemsize } => write!(
                f,
                "{} bytes is not a whole number of {}-byte elements",
                len, itemsize
            ),
        }
    }
}

/// An error parsing a text array.
#[derive(Debug)]
pub struct ParseTextError {
    pub line: usize,
    pub token: String,
}

impl StdError for ParseTextError {}

impl fmt::Display for ParseTextError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: cannot parse {:?}", self.line, self.token)
    }
}

/// Any error produced by this crate.
#[derive(Debug)]
pub enum Error {
    Configuration(ConfigurationError),
    StoreIo(StoreIoError),
    ReadHeader(ReadHeaderError),
    WriteHeader(WriteHeaderError),
    InvalidData(InvalidDataError),
    /// I/O outside of chunk access (header files, text files).
    Io(io::Error),
    ParseText(ParseTextError),
    ThreadPool(rayon::ThreadPoolBuildError),
    #[cfg(feature = "npz")]
    Zip(zip::result::ZipError),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Configuration(err) => Some(err),
            Error::StoreIo(err) => Some(err),
            Error::ReadHeader(err) => Some(err),
            Error::WriteHeader(err) => Some(err),
            Error::InvalidData(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::ParseText(err) => Some(err),
            Error::ThreadPool(err) => Some(err),
            #[cfg(feature = "npz")]
            Error::Zip(err) => Some(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(err) => write!(f, "configuration error: {}", err),
            Error::StoreIo(err) => write!(f, "store I/O error: {}", err),
            Error::ReadHeader(err) => write!(f, "error reading header: {}", err),
            Error::WriteHeader(err) => write!(f, "error writing header: {}", err),
            Error::InvalidData(err) => write!(f, "invalid element data: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::ParseText(err) => write!(f, "error parsing text array: {}", err),
            Error::ThreadPool(err) => write!(f, "error building thread pool: {}", err),
            #[cfg(feature = "npz")]
            Error::Zip(err) => write!(f, "zip file error: {}", err),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Error {
        Error::Configuration(err)
    }
}

impl From<StoreIoError> for Error {
    fn from(err: StoreIoError) -> Error {
        Error::StoreIo(err)
    }
}

impl From<ReadHeaderError> for Error {
    fn from(err: ReadHeaderError) -> Error {
        Error::ReadHeader(err)
    }
}

impl From<WriteHeaderError> for Error {
    fn from(err: WriteHeaderError) -> Error {
        Error::WriteHeader(err)
    }
}

impl From<InvalidDataError> for Error {
    fn from(err: InvalidDataError) -> Error {
        Error::InvalidData(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseTextError> for Error {
    fn from(err: ParseTextError) -> Error {
        Error::ParseText(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Error {
        Error::ThreadPool(err)
    }
}

#[cfg(feature = "npz")]
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Error {
        Error::Zip(err)
    }
}
