use super::Element;
use crate::dtype::{DType, Endianness, Kind};
use crate::error::InvalidDataError;
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use num_complex_0_4::Complex;
use std::mem;
use std::slice;

/// Checks that `Complex<T>` is laid out as two consecutive `T` values.
///
/// # Panics
///
/// Panics if `T` is zero-sized.
fn assert_complex_layout<T>() {
    assert!(mem::size_of::<T>() > 0);

    // These assertions should always pass, since `Complex` is `repr(C)` and
    // has only two fields, both of type `T`.
    assert_eq!(
        mem::size_of::<Complex<T>>(),
        mem::size_of::<T>().checked_mul(2).unwrap()
    );
    assert_eq!(mem::align_of::<Complex<T>>(), mem::align_of::<T>());
}

/// Casts the slice of complex numbers to a slice of the inner values.
///
/// The resulting slice alternates between the real and imaginary parts of
/// consecutive complex elements.
fn complex_slice_as_inner_slice<T>(slice: &[Complex<T>]) -> &[T] {
    assert_complex_layout::<T>();
    let inner_len = slice.len().checked_mul(2).unwrap();
    // This is sound because `Complex<T>` is `repr(C)` with two `T` fields (see
    // `assert_complex_layout`), and the fields of `Complex` are public.
    unsafe { slice::from_raw_parts(slice.as_ptr().cast(), inner_len) }
}

/// Mutable version of `complex_slice_as_inner_slice`.
fn complex_slice_as_inner_slice_mut<T>(slice: &mut [Complex<T>]) -> &mut [T] {
    assert_complex_layout::<T>();
    let inner_len = slice.len().checked_mul(2).unwrap();
    // Sound for the same reasons as `complex_slice_as_inner_slice`.
    unsafe { slice::from_raw_parts_mut(slice.as_mut_ptr().cast(), inner_len) }
}

macro_rules! impl_complex_multi_byte {
    ($elem:ty, $inner_read_into:ident, $inner_write_into:ident) => {
        impl Element for $elem {
            fn dtype() -> DType {
                DType::native(Kind::Complex, mem::size_of::<$elem>())
            }

            fn read_slice(
                bytes: &[u8],
                byte_order: Endianness,
                out: &mut [Self],
            ) -> Result<(), InvalidDataError> {
                let inner = complex_slice_as_inner_slice_mut(out);
                match byte_order {
                    Endianness::Little => LittleEndian::$inner_read_into(bytes, inner),
                    Endianness::Big => BigEndian::$inner_read_into(bytes, inner),
                    Endianness::NotApplicable => NativeEndian::$inner_read_into(bytes, inner),
                }
                Ok(())
            }

            fn write_slice(slice: &[Self], byte_order: Endianness, out: &mut [u8]) {
                let inner = complex_slice_as_inner_slice(slice);
                match byte_order {
                    Endianness::Little => LittleEndian::$inner_write_into(inner, out),
                    Endianness::Big => BigEndian::$inner_write_into(inner, out),
                    Endianness::NotApplicable => NativeEndian::$inner_write_into(inner, out),
                }
            }
        }
    };
}

impl_complex_multi_byte!(Complex<f32>, read_f32_into, write_f32_into);
impl_complex_multi_byte!(Complex<f64>, read_f64_into, write_f64_into);
