//! Miscellaneous example cases.

use crate::{mapped, npy_bytes};
use ndarray::prelude::*;
use ndarray_npy_chunked::{
    lazy, npy, ArrayHeader, ByteSpan, ConfigurationError, DType, Error, LazyArray, Order,
    StoreOp,
};
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

#[test]
fn chunks_of_4x6_row_major() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = Array::from_iter(0i64..24).into_shape((4, 6)).unwrap();
    fs::write(&path, npy_bytes(&original)).unwrap();

    let header = npy::head(&path).unwrap();
    let base = header.byte_offset;
    let lazy = LazyArray::<i64>::load(&path, header, &[2, 3]).unwrap();
    let ranges: Vec<_> = lazy
        .chunks()
        .iter()
        .map(|c| c.coordinate_range.clone())
        .collect();
    assert_eq!(
        ranges,
        vec![
            vec![0..2, 0..3],
            vec![0..2, 3..6],
            vec![2..4, 0..3],
            vec![2..4, 3..6],
        ]
    );
    assert_eq!(
        lazy.chunks()[0].byte_spans,
        vec![
            ByteSpan { offset: base, len: 24 },
            ByteSpan { offset: base + 48, len: 24 },
        ]
    );

    let tasks = lazy.tasks();
    assert_eq!(tasks.len(), 4);
    assert_eq!(tasks[3].id(), 3);
    assert_eq!(tasks[3].run().unwrap(), array![[15i64, 16, 17], [21, 22, 23]].into_dyn());
    assert_eq!(lazy.compute().unwrap(), original.into_dyn());
}

#[test]
fn chunks_of_five_elements() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = array![1.0f64, 2.0, 3.0, 4.0, 5.0];
    fs::write(&path, npy_bytes(&original)).unwrap();

    let header = npy::head(&path).unwrap();
    let base = header.byte_offset;
    let lazy = LazyArray::<f64>::load(&path, header, &[2]).unwrap();
    let spans: Vec<_> = lazy
        .chunks()
        .iter()
        .map(|c| (c.coordinate_range.clone(), c.byte_spans.clone()))
        .collect();
    assert_eq!(
        spans,
        vec![
            (vec![0..2], vec![ByteSpan { offset: base, len: 16 }]),
            (vec![2..4], vec![ByteSpan { offset: base + 16, len: 16 }]),
            (vec![4..5], vec![ByteSpan { offset: base + 32, len: 8 }]),
        ]
    );
    assert_eq!(lazy.compute().unwrap(), original.into_dyn());
}

#[test]
fn saved_bytes_match_eager_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = Array::from_shape_fn((7, 5, 3), |(i, j, k)| (i * 100 + j * 10 + k) as u32);
    lazy::save(&original, &path, &[3, 2, 2])
        .unwrap()
        .compute()
        .unwrap();
    let written = mapped(&path);
    assert_eq!(&written[..], &npy_bytes(&original)[..]);
}

#[test]
fn saved_fortran_data_region() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = Array::from_shape_vec((3, 4).f(), (0i32..12).collect()).unwrap();
    lazy::save(&original, &path, &[2, 3])
        .unwrap()
        .compute()
        .unwrap();

    let header = npy::head(&path).unwrap();
    assert_eq!(header.order, Order::F);
    let written = mapped(&path);
    let data: Vec<i32> = written[header.byte_offset as usize..]
        .chunks(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(data, (0..12).collect::<Vec<_>>());
}

#[test]
fn raw_binary_with_explicit_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.bin");
    let mut file = File::create(&path).unwrap();
    file.write_all(b"0123456789").unwrap();
    for v in 0u16..12 {
        file.write_all(&v.to_be_bytes()).unwrap();
    }
    drop(file);

    let header = ArrayHeader::new(vec![3, 4], DType::parse(">u2").unwrap(), 10, Order::F);
    let lazy = LazyArray::<u16>::load(&path, header, &[2, 2]).unwrap();
    let expected = Array::from_shape_vec((3, 4).f(), (0u16..12).collect()).unwrap();
    assert_eq!(lazy.compute().unwrap(), expected.into_dyn());
}

#[test]
fn truncated_store_fails_at_compute() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = Array::from_iter(0i64..24).into_shape((4, 6)).unwrap();
    let bytes = npy_bytes(&original);
    fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

    let header = npy::head(&path).unwrap();
    let lazy = LazyArray::<i64>::load(&path, header.clone(), &[2, 3]).unwrap();
    match lazy.compute() {
        Err(Error::StoreIo(err)) => {
            assert_eq!(err.op, StoreOp::Read);
            assert_eq!(err.path.as_deref(), Some(path.as_path()));
            assert_eq!(err.coordinates, vec![2..4, 3..6]);
            assert_eq!(err.byte_offset, header.byte_offset + 8 * 21);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // Tasks not touching the missing bytes still succeed.
    assert!(lazy.tasks()[0].run().is_ok());
}

#[test]
fn missing_store_fails_at_compute() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.npy");
    let header = ArrayHeader::new(vec![4], DType::parse("<f4").unwrap(), 128, Order::C);
    let lazy = LazyArray::<f32>::load(&path, header, &[2]).unwrap();
    match lazy.compute() {
        Err(Error::StoreIo(err)) => assert_eq!(err.op, StoreOp::Open),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn configuration_errors_precede_io() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.npy");
    let header = ArrayHeader::new(vec![4, 6], DType::parse("<i8").unwrap(), 128, Order::C);

    assert!(matches!(
        LazyArray::<i64>::load(&missing, header.clone(), &[2]),
        Err(Error::Configuration(ConfigurationError::RankMismatch { .. }))
    ));
    assert!(matches!(
        LazyArray::<i64>::load(&missing, header.clone(), &[0, 2]),
        Err(Error::Configuration(ConfigurationError::ZeroChunkExtent { axis: 0 }))
    ));
    assert!(matches!(
        LazyArray::<f64>::load(&missing, header, &[2, 2]),
        Err(Error::Configuration(ConfigurationError::WrongElementType { .. }))
    ));

    let target = dir.path().join("out.npy");
    let original = Array::from_iter(0i64..24).into_shape((4, 6)).unwrap();
    assert!(matches!(
        lazy::save(&original, &target, &[2, 3, 1]),
        Err(Error::Configuration(ConfigurationError::RankMismatch { .. }))
    ));
    assert!(!target.exists());
}

#[test]
fn one_chunk_per_element() {
    let original = Array::from_iter(0u8..12).into_shape((3, 4)).unwrap();
    let lazy = LazyArray::from_array(&original, &[1, 1]).unwrap();
    assert_eq!(lazy.num_chunks(), 12);
    assert_eq!(lazy.compute_with(3).unwrap(), original.into_dyn());
}

#[test]
fn oversized_chunks_are_clamped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.npy");
    let original = Array::from_iter(0i32..15).into_shape((3, 5)).unwrap();
    let saved = lazy::save(&original, &path, &[10, 10]).unwrap();
    assert_eq!(saved.num_chunks(), 1);
    assert_eq!(saved.chunks()[0].coordinate_range, vec![0..3, 0..5]);
    saved.compute().unwrap();
    assert_eq!(&mapped(&path)[..], &npy_bytes(&original)[..]);
}

#[test]
fn removed_save_target_fails_at_compute() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.npy");
    let original = Array::from_iter(0u16..12).into_shape((3, 4)).unwrap();
    let saved = lazy::save(&original, &path, &[2, 4]).unwrap();
    fs::remove_file(&path).unwrap();

    match saved.compute() {
        Err(Error::StoreIo(err)) => {
            assert_eq!(err.op, StoreOp::Open);
            assert_eq!(err.path.as_deref(), Some(path.as_path()));
            assert!(saved
                .chunks()
                .iter()
                .any(|c| c.coordinate_range == err.coordinates));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    match saved.tasks()[1].run() {
        Err(Error::StoreIo(err)) => {
            assert_eq!(err.op, StoreOp::Open);
            assert_eq!(err.coordinates, vec![2..3, 0..4]);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!path.exists());
}
