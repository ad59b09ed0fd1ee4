//! Trait implementations for `bool`.

use super::Element;
use crate::dtype::{DType, Endianness, Kind};
use crate::error::InvalidDataError;

/// Returns `Ok(_)` iff each of the bytes is a valid bitwise representation for
/// `bool`, i.e. `0x00` or `0x01`.
fn check_valid_for_bool(bytes: &[u8]) -> Result<(), InvalidDataError> {
    for &byte in bytes {
        if byte > 1 {
            return Err(InvalidDataError::Bool { bad_value: byte });
        }
    }
    Ok(())
}

impl Element for bool {
    fn dtype() -> DType {
        DType::native(Kind::Bool, 1)
    }

    fn read_slice(
        bytes: &[u8],
        _byte_order: Endianness,
        out: &mut [Self],
    ) -> Result<(), InvalidDataError> {
        check_valid_for_bool(bytes)?;
        for (o, &b) in out.iter_mut().zip(bytes) {
            *o = b == 1;
        }
        Ok(())
    }

    fn write_slice(slice: &[Self], _byte_order: Endianness, out: &mut [u8]) {
        for (o, &v) in out.iter_mut().zip(slice) {
            *o = u8::from(v);
        }
    }
}
