//! Trait implementations for primitive element types.

use super::Element;
use crate::dtype::{DType, Endianness, Kind};
use crate::error::InvalidDataError;
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use std::mem;

macro_rules! impl_primitive_one_byte {
    ($elem:ty, $kind:expr) => {
        impl Element for $elem {
            fn dtype() -> DType {
                DType::native($kind, 1)
            }

            fn read_slice(
                bytes: &[u8],
                _byte_order: Endianness,
                out: &mut [Self],
            ) -> Result<(), InvalidDataError> {
                for (o, &b) in out.iter_mut().zip(bytes) {
                    *o = b as $elem;
                }
                Ok(())
            }

            fn write_slice(slice: &[Self], _byte_order: Endianness, out: &mut [u8]) {
                for (o, &v) in out.iter_mut().zip(slice) {
                    *o = v as u8;
                }
            }
        }
    };
}

macro_rules! impl_primitive_multi_byte {
    ($elem:ty, $kind:expr, $read_into:ident, $write_into:ident) => {
        impl Element for $elem {
            fn dtype() -> DType {
                DType::native($kind, mem::size_of::<$elem>())
            }

            fn read_slice(
                bytes: &[u8],
                byte_order: Endianness,
                out: &mut [Self],
            ) -> Result<(), InvalidDataError> {
                match byte_order {
                    Endianness::Little => LittleEndian::$read_into(bytes, out),
                    Endianness::Big => BigEndian::$read_into(bytes, out),
                    Endianness::NotApplicable => NativeEndian::$read_into(bytes, out),
                }
                Ok(())
            }

            fn write_slice(slice: &[Self], byte_order: Endianness, out: &mut [u8]) {
                match byte_order {
                    Endianness::Little => LittleEndian::$write_into(slice, out),
                    Endianness::Big => BigEndian::$write_into(slice, out),
                    Endianness::NotApplicable => NativeEndian::$write_into(slice, out),
                }
            }
        }
    };
}

impl_primitive_one_byte!(i8, Kind::Int);
impl_primitive_one_byte!(u8, Kind::UInt);

impl_primitive_multi_byte!(i16, Kind::Int, read_i16_into, write_i16_into);
impl_primitive_multi_byte!(i32, Kind::Int, read_i32_into, write_i32_into);
impl_primitive_multi_byte!(i64, Kind::Int, read_i64_into, write_i64_into);

impl_primitive_multi_byte!(u16, Kind::UInt, read_u16_into, write_u16_into);
impl_primitive_multi_byte!(u32, Kind::UInt, read_u32_into, write_u32_into);
impl_primitive_multi_byte!(u64, Kind::UInt, read_u64_into, write_u64_into);

impl_primitive_multi_byte!(f32, Kind::Float, read_f32_into, write_f32_into);
impl_primitive_multi_byte!(f64, Kind::Float, read_f64_into, write_f64_into);
