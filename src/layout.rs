//! Array headers, layout order and header validation.

use crate::dtype::DType;
use crate::error::ConfigurationError;
use crate::npy::elements::Element;
use py_literal::Value as PyValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Memory layout order of the flat data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// Row-major: the last axis varies fastest.
    C,
    /// Column-major: the first axis varies fastest.
    F,
}

impl Order {
    pub fn from_fortran_order(fortran_order: bool) -> Order {
        if fortran_order {
            Order::F
        } else {
            Order::C
        }
    }

    pub fn is_fortran(self) -> bool {
        self == Order::F
    }

    /// Axes of an array with `ndim` axes, slowest-varying first.
    pub(crate) fn storage_axes(self, ndim: usize) -> Vec<usize> {
        match self {
            Order::C => (0..ndim).collect(),
            Order::F => (0..ndim).rev().collect(),
        }
    }
}

impl Default for Order {
    fn default() -> Order {
        Order::C
    }
}

impl FromStr for Order {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Order, ConfigurationError> {
        match s {
            "C" | "c" => Ok(Order::C),
            "F" | "f" => Ok(Order::F),
            other => Err(ConfigurationError::UnknownOrder(other.to_owned())),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Order::C => "C",
            Order::F => "F",
        })
    }
}

/// Format-specific header fields beyond the four the engine uses.
pub type Extensions = BTreeMap<String, PyValue>;

/// Everything needed to address the data of an array inside a store.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayHeader {
    pub shape: Vec<usize>,
    pub dtype: DType,
    /// Offset of the first data byte from the start of the store.
    pub byte_offset: u64,
    pub order: Order,
    pub extensions: Extensions,
}

impl ArrayHeader {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DType, byte_offset: u64, order: Order) -> Self {
        ArrayHeader {
            shape: shape.into(),
            dtype,
            byte_offset,
            order,
            extensions: Extensions::new(),
        }
    }

    /// Number of elements, or `None` on overflow.
    pub fn len(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Number of data bytes, or `None` on overflow.
    pub fn nbytes(&self) -> Option<u64> {
        let len = u64::try_from(self.len()?).ok()?;
        len.checked_mul(self.dtype.itemsize() as u64)
    }

    /// Offset one past the last data byte, or `None` on overflow.
    pub fn end_offset(&self) -> Option<u64> {
        self.byte_offset.checked_add(self.nbytes()?)
    }
}

/// Checks that the shape of an array is usable by the chunk engine.
pub fn validate_shape(shape: &[usize]) -> Result<(), ConfigurationError> {
    if shape.is_empty() {
        return Err(ConfigurationError::EmptyShape);
    }
    if let Some(axis) = shape.iter().position(|&len| len == 0) {
        return Err(ConfigurationError::ZeroExtent { axis });
    }
    Ok(())
}

/// Checks `header` before any chunk graph is built over it.
///
/// This never touches the store; whether the store actually holds
/// `header.nbytes()` bytes after `header.byte_offset` is only discovered
/// when a chunk is accessed.
pub fn validate(header: &ArrayHeader) -> Result<(), ConfigurationError> {
    validate_shape(&header.shape)?;
    if header.dtype.itemsize() == 0 {
        return Err(ConfigurationError::ZeroItemSize);
    }
    header.end_offset().ok_or(ConfigurationError::Overflow)?;
    Ok(())
}

/// Like [`validate`], and additionally checks that elements of type `A` can
/// be decoded from `header.dtype`.
pub fn validate_for<A: Element>(header: &ArrayHeader) -> Result<(), ConfigurationError> {
    validate(header)?;
    let requested = A::dtype();
    if A::accepts(&header.dtype) {
        Ok(())
    } else {
        Err(ConfigurationError::WrongElementType {
            requested,
            found: header.dtype,
        })
    }
}
