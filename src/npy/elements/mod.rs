//! Implementations of the [`Element`] trait.

use crate::dtype::{DType, Endianness};
use crate::error::InvalidDataError;
use std::fmt;
use std::str::FromStr;

/// A fixed-width array element that can be decoded from and encoded to the
/// raw bytes of an `.npy` data region.
///
/// Elements also parse from and format to text, so every element type can
/// go through any of the supported formats.
pub trait Element: Copy + Default + fmt::Display + FromStr + Send + Sync + 'static {
    /// The dtype of this element type with native byte order.
    fn dtype() -> DType;

    /// Returns `true` iff data stored as `dtype` can be decoded to `Self`.
    ///
    /// The default accepts either byte order.
    fn accepts(dtype: &DType) -> bool {
        Self::dtype().same_type(dtype)
    }

    /// Decodes `bytes` into `out`.
    ///
    /// `bytes.len()` must equal `out.len() * Self::dtype().itemsize()`.
    fn read_slice(
        bytes: &[u8],
        byte_order: Endianness,
        out: &mut [Self],
    ) -> Result<(), InvalidDataError>;

    /// Encodes `slice` into `out`.
    ///
    /// `out.len()` must equal `slice.len() * Self::dtype().itemsize()`.
    fn write_slice(slice: &[Self], byte_order: Endianness, out: &mut [u8]);
}

/// Decodes raw bytes stored as `dtype` into a vector of elements.
pub(crate) fn decode_vec<A: Element>(
    bytes: &[u8],
    dtype: &DType,
) -> Result<Vec<A>, InvalidDataError> {
    let itemsize = dtype.itemsize();
    if bytes.len() % itemsize != 0 {
        return Err(InvalidDataError::Length {
            len: bytes.len(),
            itemsize,
        });
    }
    let mut out = vec![A::default(); bytes.len() / itemsize];
    A::read_slice(bytes, dtype.byte_order(), &mut out)?;
    Ok(out)
}

/// Encodes elements as raw bytes in the byte order of `dtype`.
pub(crate) fn encode_vec<A: Element>(elems: &[A], dtype: &DType) -> Vec<u8> {
    let mut out = vec![0; elems.len() * dtype.itemsize()];
    A::write_slice(elems, dtype.byte_order(), &mut out);
    out
}

mod bool;
#[cfg(feature = "num-complex-0_4")]
mod complex;
mod primitive;
