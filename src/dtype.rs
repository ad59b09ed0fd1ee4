//! Fixed-width element type descriptors.
//!
//! A [`DType`] is parsed from, and formatted to, the numpy type descriptor
//! strings stored in the `descr` field of an `.npy` header, e.g. `'<i8'`,
//! `'|b1'`, `'>f4'` or `'<c16'`.

use crate::error::ConfigurationError;
use py_literal::Value as PyValue;
use std::fmt;

/// The kind of a fixed-width element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    UInt,
    Float,
    Complex,
}

impl Kind {
    fn code(self) -> char {
        match self {
            Kind::Bool => 'b',
            Kind::Int => 'i',
            Kind::UInt => 'u',
            Kind::Float => 'f',
            Kind::Complex => 'c',
        }
    }

    fn from_code(code: char) -> Option<Kind> {
        match code {
            'b' => Some(Kind::Bool),
            'i' => Some(Kind::Int),
            'u' => Some(Kind::UInt),
            'f' => Some(Kind::Float),
            'c' => Some(Kind::Complex),
            _ => None,
        }
    }

    /// Returns `true` iff an element of this kind may have `itemsize` bytes.
    fn supports_itemsize(self, itemsize: usize) -> bool {
        match self {
            Kind::Bool => itemsize == 1,
            Kind::Int | Kind::UInt => matches!(itemsize, 1 | 2 | 4 | 8),
            Kind::Float => matches!(itemsize, 4 | 8),
            Kind::Complex => matches!(itemsize, 8 | 16),
        }
    }
}

/// Byte order of a multi-byte element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
    /// Single-byte elements (`|` in a descriptor).
    NotApplicable,
}

impl Endianness {
    /// The byte order of the target platform.
    pub fn native() -> Endianness {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    fn code(self) -> char {
        match self {
            Endianness::Little => '<',
            Endianness::Big => '>',
            Endianness::NotApplicable => '|',
        }
    }
}

/// A fixed-width element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DType {
    kind: Kind,
    byte_order: Endianness,
    itemsize: usize,
}

impl DType {
    /// Creates a dtype, normalizing the byte order of single-byte elements
    /// to [`Endianness::NotApplicable`].
    pub fn new(
        kind: Kind,
        byte_order: Endianness,
        itemsize: usize,
    ) -> Result<DType, ConfigurationError> {
        if itemsize == 0 {
            return Err(ConfigurationError::ZeroItemSize);
        }
        if !kind.supports_itemsize(itemsize) {
            return Err(ConfigurationError::UnsupportedDescriptor(PyValue::String(
                format!("{}{}{}", byte_order.code(), kind.code(), itemsize),
            )));
        }
        let byte_order = if itemsize == 1 {
            Endianness::NotApplicable
        } else if byte_order == Endianness::NotApplicable {
            Endianness::native()
        } else {
            byte_order
        };
        Ok(DType {
            kind,
            byte_order,
            itemsize,
        })
    }

    /// The dtype of a built-in element type with native byte order.
    pub(crate) fn native(kind: Kind, itemsize: usize) -> DType {
        let byte_order = if itemsize == 1 {
            Endianness::NotApplicable
        } else {
            Endianness::native()
        };
        DType {
            kind,
            byte_order,
            itemsize,
        }
    }

    /// Parses a numpy type descriptor string such as `"<f8"`.
    ///
    /// `=` (native) is accepted and resolved to the platform byte order.
    pub fn parse(descr: &str) -> Result<DType, ConfigurationError> {
        let unsupported = || ConfigurationError::UnsupportedDescriptor(PyValue::String(descr.into()));
        let mut chars = descr.chars();
        let (byte_order, kind_code) = match chars.next().ok_or_else(unsupported)? {
            '<' => (Endianness::Little, chars.next()),
            '>' => (Endianness::Big, chars.next()),
            '|' => (Endianness::NotApplicable, chars.next()),
            '=' => (Endianness::native(), chars.next()),
            c => (Endianness::NotApplicable, Some(c)),
        };
        let kind = kind_code.and_then(Kind::from_code).ok_or_else(unsupported)?;
        let itemsize: usize = chars.as_str().parse().map_err(|_| unsupported())?;
        DType::new(kind, byte_order, itemsize).map_err(|_| unsupported())
    }

    /// Parses the `descr` value of an `.npy` header.
    ///
    /// Only plain string descriptors are supported; structured dtypes
    /// (lists of fields) are rejected.
    pub fn from_descr(descr: &PyValue) -> Result<DType, ConfigurationError> {
        match descr {
            PyValue::String(s) => DType::parse(s),
            other => Err(ConfigurationError::UnsupportedDescriptor(other.clone())),
        }
    }

    /// The `descr` value to store in an `.npy` header.
    pub fn descr(&self) -> PyValue {
        PyValue::String(self.to_string())
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn byte_order(&self) -> Endianness {
        self.byte_order
    }

    /// Size of one element in bytes.
    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    /// Returns `true` iff `self` and `other` differ at most in byte order.
    pub fn same_type(&self, other: &DType) -> bool {
        self.kind == other.kind && self.itemsize == other.itemsize
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.byte_order.code(),
            self.kind.code(),
            self.itemsize
        )
    }
}
