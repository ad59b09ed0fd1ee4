//! Reading and writing the bytes of one chunk.
//!
//! Chunks may be accessed concurrently and in any order, so every span is
//! preceded by an explicit seek to its absolute offset; nothing relies on
//! the position left behind by a previous access.

use super::ChunkDescriptor;
use crate::dtype::DType;
use crate::error::{ConfigurationError, Error, StoreIoError, StoreOp};
use crate::layout::Order;
use crate::npy::elements::{decode_vec, encode_vec, Element};
use ndarray::{ArrayBase, ArrayD, Data, IxDyn, ShapeBuilder};
use std::io::{Read, Seek, SeekFrom, Write};

/// Reads the chunk described by `desc` from `store`.
///
/// The returned array has the chunk's shape, with the memory layout given
/// by `order`.
///
/// # Errors
///
/// Returns [`Error::StoreIo`] on a failed seek or a short read, and
/// [`Error::InvalidData`] if the bytes aren't valid for `A`.
pub fn read_chunk<A, R>(
    desc: &ChunkDescriptor,
    dtype: &DType,
    order: Order,
    store: &mut R,
) -> Result<ArrayD<A>, Error>
where
    A: Element,
    R: Read + Seek,
{
    let mut bytes = vec![0u8; desc.nbytes() as usize];
    let mut filled = 0;
    for span in &desc.byte_spans {
        let io_err =
            |op, err| StoreIoError::new(op, &desc.coordinate_range, span.offset, err);
        store
            .seek(SeekFrom::Start(span.offset))
            .map_err(|err| io_err(StoreOp::Seek, err))?;
        let end = filled + span.len as usize;
        store
            .read_exact(&mut bytes[filled..end])
            .map_err(|err| io_err(StoreOp::Read, err))?;
        filled = end;
    }
    log::trace!(
        "read chunk {:?} ({} spans, {} bytes)",
        desc.coordinate_range,
        desc.byte_spans.len(),
        filled
    );
    let data = decode_vec::<A>(&bytes, dtype)?;
    let shape = IxDyn(&desc.shape()).set_f(order.is_fortran());
    Ok(ArrayD::from_shape_vec(shape, data).map_err(|_| ConfigurationError::ShapeMismatch {
        expected: desc.shape(),
        found: vec![desc.len()],
    })?)
}

/// Writes `block` into the chunk described by `desc`.
///
/// All bytes have been handed to `store` and flushed when this returns.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if `block`'s shape differs from the
/// chunk's, and [`Error::StoreIo`] on a failed seek, write or flush.
pub fn write_chunk<A, S, W>(
    desc: &ChunkDescriptor,
    dtype: &DType,
    order: Order,
    store: &mut W,
    block: &ArrayBase<S, IxDyn>,
) -> Result<(), Error>
where
    A: Element,
    S: Data<Elem = A>,
    W: Write + Seek,
{
    let shape = desc.shape();
    if block.shape() != &shape[..] {
        return Err(ConfigurationError::ShapeMismatch {
            expected: shape,
            found: block.shape().to_vec(),
        }
        .into());
    }
    // Elements in storage order.
    let elems: Vec<A> = match order {
        Order::C => block.iter().copied().collect(),
        Order::F => block.t().iter().copied().collect(),
    };
    let bytes = encode_vec(&elems, dtype);

    let mut written = 0;
    for span in &desc.byte_spans {
        let io_err =
            |op, err| StoreIoError::new(op, &desc.coordinate_range, span.offset, err);
        store
            .seek(SeekFrom::Start(span.offset))
            .map_err(|err| io_err(StoreOp::Seek, err))?;
        let end = written + span.len as usize;
        store
            .write_all(&bytes[written..end])
            .map_err(|err| io_err(StoreOp::Write, err))?;
        written = end;
    }
    store.flush().map_err(|err| {
        StoreIoError::new(
            StoreOp::Flush,
            &desc.coordinate_range,
            desc.byte_spans.first().map_or(0, |span| span.offset),
            err,
        )
    })?;
    log::trace!(
        "wrote chunk {:?} ({} spans, {} bytes)",
        desc.coordinate_range,
        desc.byte_spans.len(),
        written
    );
    Ok(())
}
