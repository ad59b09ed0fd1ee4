//! `.npz` archive tests.

use ndarray::prelude::*;
use ndarray_npy_chunked::{format, npz, ChunkOptions, NpzReader, NpzWriter};
use std::fs::File;
use tempfile::tempdir;

#[test]
fn stored_member_loads_lazily() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.npz");
    let a = Array::from_iter(0i32..30).into_shape((5, 6)).unwrap();
    let b = array![1.5f64, -2.5];
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("a.npy", &a).unwrap();
    npz.add_array("b.npy", &b).unwrap();
    npz.finish().unwrap();

    let mut reader = NpzReader::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(reader.names().unwrap(), vec!["a.npy", "b.npy"]);
    let location = reader.member_location("a").unwrap();
    assert!(location.stored);
    assert_eq!(location.name, "a.npy");

    let options = ChunkOptions::default().with_chunks([2, 4]);
    let lazy = npz::load::<i32, _>(&path, "a", &options).unwrap();
    assert_eq!(lazy.num_chunks(), 6);
    assert!(lazy.chunks()[0].byte_spans[0].offset > location.data_start);
    assert_eq!(lazy.compute().unwrap(), a.into_dyn());
}

#[cfg(feature = "compressed_npz")]
#[test]
fn compressed_member_loads_eagerly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.npz");
    let a = Array::from_shape_fn((4, 3), |(i, j)| (i * 3 + j) as u64);
    let mut npz = NpzWriter::new_compressed(File::create(&path).unwrap());
    npz.add_array("a", &a).unwrap();
    npz.finish().unwrap();

    let mut reader = NpzReader::new(File::open(&path).unwrap()).unwrap();
    assert!(!reader.member_location("a").unwrap().stored);

    let options = ChunkOptions::default().with_chunks([3, 3]).with_workers(2);
    let lazy = npz::load::<u64, _>(&path, "a", &options).unwrap();
    assert_eq!(lazy.num_chunks(), 2);
    assert_eq!(lazy.workers(), Some(2));
    assert_eq!(lazy.compute().unwrap(), a.into_dyn());
}

#[test]
fn save_appends_members() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.npz");
    npz::save(&path, "x", &array![[1u8, 2], [3, 4]]).unwrap();
    npz::save(&path, "y.npy", &array![true, false]).unwrap();

    let mut reader = NpzReader::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.names().unwrap(), vec!["x.npy", "y.npy"]);
    assert_eq!(
        reader.by_name::<bool>("y").unwrap(),
        array![true, false].into_dyn()
    );

    let header = npz::head(&path, "x").unwrap();
    assert_eq!(header.shape, vec![2, 2]);
}

#[test]
fn save_replaces_existing_member() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.npz");
    npz::save(&path, "keep", &array![7i32, 8, 9]).unwrap();
    npz::save(&path, "x", &array![1i32, 2, 3]).unwrap();
    npz::save(&path, "x.npy", &array![[4i32, 5], [6, 7]]).unwrap();

    let mut reader = NpzReader::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(reader.names().unwrap(), vec!["keep.npy", "x.npy"]);
    assert_eq!(
        reader.by_name::<i32>("x").unwrap(),
        array![[4i32, 5], [6, 7]].into_dyn()
    );
    assert_eq!(
        reader.by_name::<i32>("keep").unwrap(),
        array![7i32, 8, 9].into_dyn()
    );
    assert!(!dir.path().join("arrays.npz.partial").exists());

    let lazy = npz::load::<i32, _>(&path, "x", &ChunkOptions::default()).unwrap();
    assert_eq!(lazy.compute().unwrap(), array![[4i32, 5], [6, 7]].into_dyn());
}

#[test]
fn whole_archive_headers_and_members() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.npz");
    let a = Array::from_iter(0u16..6).into_shape((2, 3)).unwrap();
    npz::save(&path, format::DEFAULT_MEMBER, &a).unwrap();
    npz::save(&path, "b", &array![10u16, 20]).unwrap();

    let headers = npz::head_all(&path).unwrap();
    assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["arr_0", "b"]);
    assert_eq!(headers["arr_0"].shape, vec![2, 3]);

    let arrays = npz::load_all::<u16, _>(&path, &ChunkOptions::default()).unwrap();
    assert_eq!(arrays.len(), 2);
    assert_eq!(arrays["arr_0"].compute().unwrap(), a.into_dyn());
    assert_eq!(arrays["b"].compute().unwrap(), array![10u16, 20].into_dyn());
}
