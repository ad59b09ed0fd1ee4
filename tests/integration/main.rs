//! Integration tests.

use memmap2::Mmap;
use ndarray::{ArrayBase, Data, Dimension};
use ndarray_npy_chunked::npy::write_npy;
use ndarray_npy_chunked::Element;
use std::fs::File;
use std::path::Path;

mod examples;
mod format;
#[cfg(feature = "npz")]
mod npz;
mod primitive;
#[cfg(feature = "tar")]
mod tarball;

/// Returns the bytes of the file at `path`, memory-mapped.
///
/// The file must not be modified while the map is alive.
pub fn mapped(path: &Path) -> Mmap {
    let file = File::open(path).unwrap();
    unsafe { Mmap::map(&file).unwrap() }
}

/// The bytes of `array` written eagerly as a complete `.npy` file.
pub fn npy_bytes<A, S, D>(array: &ArrayBase<S, D>) -> Vec<u8>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
{
    let mut buf = Vec::new();
    write_npy(array, &mut buf).unwrap();
    buf
}
