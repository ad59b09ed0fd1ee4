//! Tarball tests.

use ndarray::prelude::*;
use ndarray_npy_chunked::tarball::{self, Compression};
use ndarray_npy_chunked::{lazy, npy, ChunkOptions, Error, LazyArray};
use std::fs::File;
use std::io::Read;
use tempfile::tempdir;

#[test]
fn uncompressed_member_loads_lazily() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.tar");
    let a = Array::from_iter(0i64..30).into_shape((5, 6)).unwrap();
    tarball::save(&path, "a", &a).unwrap();
    tarball::save(&path, "b.npy", &array![0.5f32, 1.5]).unwrap();
    assert_eq!(tarball::names(&path).unwrap(), vec!["a.npy", "b.npy"]);

    let header = tarball::head(&path, "a").unwrap();
    assert_eq!(header.shape, vec![5, 6]);
    // The data follows a 512-byte tar header and the `.npy` header.
    assert!(header.byte_offset > 512);
    let mut bytes = Vec::new();
    File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
    let start = header.byte_offset as usize;
    assert_eq!(&bytes[start..start + 8], &0i64.to_le_bytes());
    assert_eq!(&bytes[start + 8..start + 16], &1i64.to_le_bytes());

    let options = ChunkOptions::default().with_chunks([2, 4]);
    let lazy = tarball::load::<i64, _>(&path, "a", &options).unwrap();
    assert_eq!(lazy.num_chunks(), 6);
    assert_eq!(lazy.chunks()[0].byte_spans[0].offset, header.byte_offset);
    assert_eq!(lazy.compute().unwrap(), a.into_dyn());
}

#[test]
fn compressed_members_load_eagerly() {
    let dir = tempdir().unwrap();
    for (name, compression) in [
        ("arrays.tar.gz", Compression::Gzip),
        ("arrays.tbz2", Compression::Bzip2),
        ("arrays.tar.xz", Compression::Xz),
    ] {
        let path = dir.path().join(name);
        assert_eq!(Compression::from_path(&path), Some(compression));
        let a = Array::from_shape_fn((4, 3), |(i, j)| (i * 3 + j) as u32);
        tarball::save(&path, "a", &a).unwrap();
        tarball::save(&path, "b", &array![true, false, true]).unwrap();

        assert_eq!(tarball::head(&path, "a.npy").unwrap().shape, vec![4, 3]);
        let options = ChunkOptions::default().with_chunks([3, 3]).with_workers(2);
        let lazy = tarball::load::<u32, _>(&path, "a", &options).unwrap();
        assert_eq!(lazy.num_chunks(), 2);
        assert_eq!(lazy.workers(), Some(2));
        assert_eq!(lazy.compute().unwrap(), a.into_dyn());
        assert_eq!(
            tarball::load::<bool, _>(&path, "b", &options)
                .unwrap()
                .compute()
                .unwrap(),
            array![true, false, true].into_dyn()
        );
    }
}

#[test]
fn save_replaces_existing_member() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.tar");
    tarball::save(&path, "x", &array![1u16, 2, 3]).unwrap();
    tarball::save(&path, "y", &array![9u16]).unwrap();
    tarball::save(&path, "x.npy", &array![[4u16, 5], [6, 7]]).unwrap();

    assert_eq!(tarball::names(&path).unwrap(), vec!["y.npy", "x.npy"]);
    let headers = tarball::head_all(&path).unwrap();
    assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(headers["x"].shape, vec![2, 2]);

    let arrays = tarball::load_all::<u16, _>(&path, &ChunkOptions::default()).unwrap();
    assert_eq!(arrays["x"].compute().unwrap(), array![[4u16, 5], [6, 7]].into_dyn());
    assert_eq!(arrays["y"].compute().unwrap(), array![9u16].into_dyn());
    assert!(!dir.path().join("arrays.tar.partial").exists());
}

#[test]
fn lazy_array_saved_into_tarball() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src.npy");
    let path = dir.path().join("arrays.tar");
    let original = Array::from_iter(0i32..20).into_shape((4, 5)).unwrap();
    lazy::save(&original, &src, &[2, 5]).unwrap().compute().unwrap();

    let loaded = LazyArray::<i32>::load(&src, npy::head(&src).unwrap(), &[3, 3]).unwrap();
    let doubled = loaded.map(|x| x * 2).compute().unwrap();
    tarball::save(&path, "doubled", &doubled).unwrap();
    let reread = tarball::load::<i32, _>(&path, "doubled", &ChunkOptions::default()).unwrap();
    assert_eq!(reread.compute().unwrap(), original.mapv(|x| x * 2).into_dyn());
}

#[test]
fn missing_member() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("arrays.tar");
    tarball::save(&path, "x", &array![1u8]).unwrap();
    assert!(matches!(tarball::head(&path, "nope"), Err(Error::Io(_))));
    assert!(tarball::load::<u8, _>(&path, "nope", &ChunkOptions::default()).is_err());
    assert!(tarball::names(dir.path().join("arrays.zip")).is_err());
}
