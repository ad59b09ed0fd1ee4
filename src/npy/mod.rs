//! Reading `.npy` headers and eager `.npy` (de)serialization.
//!
//! The header reader is the "head" collaborator of the chunk engine: it
//! yields the shape, dtype, data byte offset and layout order of an `.npy`
//! file without touching the data.

pub mod elements;
pub mod header;

use self::elements::{decode_vec, encode_vec, Element};
use self::header::{Header, ReadHeaderError};
use crate::error::{ConfigurationError, Error};
use crate::layout::{self, ArrayHeader, Order};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Reads the header of the `.npy` file at `path`.
///
/// The returned [`ArrayHeader::byte_offset`] is the offset of the first data
/// byte from the start of the file.
pub fn head<P: AsRef<Path>>(path: P) -> Result<ArrayHeader, Error> {
    let file = File::open(path.as_ref())?;
    head_from_reader(BufReader::new(file), 0)
}

/// Reads an `.npy` header from `reader`, which is positioned `base_offset`
/// bytes from the start of the store (e.g. at the start of an archive
/// member).
pub fn head_from_reader<R: io::Read>(reader: R, base_offset: u64) -> Result<ArrayHeader, Error> {
    let (header, header_len) = Header::from_reader(reader)?;
    let byte_offset = base_offset
        .checked_add(header_len)
        .ok_or(ConfigurationError::Overflow)?;
    Ok(header
        .into_array_header(byte_offset)
        .map_err(ReadHeaderError::from)?)
}

/// The header for writing elements of type `A` with the given shape.
///
/// The data offset is filled in once the header has been written.
pub(crate) fn header_for<A: Element>(shape: &[usize], order: Order) -> ArrayHeader {
    ArrayHeader::new(shape, A::dtype(), 0, order)
}

/// Reads a complete `.npy` file from `reader` into memory.
pub fn read_npy<A, R>(mut reader: R) -> Result<ArrayD<A>, Error>
where
    A: Element,
    R: io::Read,
{
    let header = head_from_reader(&mut reader, 0)?;
    layout::validate_for::<A>(&header)?;
    let nbytes = header.nbytes().ok_or(ConfigurationError::Overflow)?;
    let mut buf = Vec::new();
    reader.take(nbytes).read_to_end(&mut buf)?;
    if (buf.len() as u64) < nbytes {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} data bytes, found {}", nbytes, buf.len()),
        )
        .into());
    }
    let data = decode_vec::<A>(&buf, &header.dtype)?;
    let shape = IxDyn(&header.shape).set_f(header.order.is_fortran());
    Ok(ArrayD::from_shape_vec(shape, data)
        .map_err(|_| ConfigurationError::Overflow)?)
}

/// Writes `array` as a complete `.npy` file in row-major order.
pub fn write_npy<A, S, D, W>(array: &ArrayBase<S, D>, mut writer: W) -> Result<(), Error>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
    W: io::Write,
{
    let header = header_for::<A>(array.shape(), Order::C);
    Header::from_array_header(&header).write(&mut writer)?;
    let bytes = match array.as_slice() {
        Some(slice) => encode_vec(slice, &header.dtype),
        None => encode_vec(&array.iter().copied().collect::<Vec<_>>(), &header.dtype),
    };
    writer.write_all(&bytes)?;
    Ok(())
}
