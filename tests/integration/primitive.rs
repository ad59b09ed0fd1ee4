//! Tests for `Element` trait implementations for primitives.

use ndarray::prelude::*;
use ndarray_npy_chunked::{
    ArrayHeader, DType, Element, Endianness, Error, InvalidDataError, Kind, LazyArray, Order,
};
use py_literal::Value as PyValue;
use std::fs;
use tempfile::tempdir;

#[test]
fn i32_both_byte_orders() {
    let elems: &[i32] = &[34234324, -980780878, 2849874];
    for &order in &[Endianness::Little, Endianness::Big] {
        let mut buf = vec![0u8; elems.len() * 4];
        <i32>::write_slice(elems, order, &mut buf);
        let expected: Vec<u8> = match order {
            Endianness::Big => elems.iter().flat_map(|x| x.to_be_bytes()).collect(),
            _ => elems.iter().flat_map(|x| x.to_le_bytes()).collect(),
        };
        assert_eq!(buf, expected);
        let mut out = [0i32; 3];
        <i32>::read_slice(&buf, order, &mut out).unwrap();
        assert_eq!(&out[..], elems);
    }
}

#[test]
fn accepts_by_kind_and_size() {
    assert!(<f64>::accepts(&DType::parse(">f8").unwrap()));
    assert!(!<f64>::accepts(&DType::parse("<f4").unwrap()));
    assert!(!<u32>::accepts(&DType::parse("<i4").unwrap()));
    assert!(<bool>::accepts(&DType::parse("|b1").unwrap()));
    assert_eq!(
        DType::from_descr(&PyValue::String("<u8".into())).unwrap(),
        DType::new(Kind::UInt, Endianness::Little, 8).unwrap()
    );
    assert!(DType::from_descr(&PyValue::List(vec![])).is_err());
}

#[test]
fn lazy_big_endian_f64() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let values: Vec<f64> = (0..20).map(|i| f64::from(i) / 8.0 - 1.0).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|x| x.to_be_bytes()).collect();
    fs::write(&path, &bytes).unwrap();

    let header = ArrayHeader::new(vec![4, 5], DType::parse(">f8").unwrap(), 0, Order::C);
    let lazy = LazyArray::<f64>::load(&path, header, &[3, 2]).unwrap();
    assert_eq!(
        lazy.compute().unwrap(),
        Array::from_shape_vec((4, 5), values).unwrap().into_dyn()
    );
}

#[test]
fn invalid_bool_fails_at_compute() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, [0u8, 1, 0, 1, 5, 0]).unwrap();

    let header = ArrayHeader::new(vec![6], DType::parse("|b1").unwrap(), 0, Order::C);
    let lazy = LazyArray::<bool>::load(&path, header, &[2]).unwrap();
    assert_eq!(
        lazy.tasks()[0].run().unwrap(),
        array![false, true].into_dyn()
    );
    assert!(matches!(
        lazy.compute(),
        Err(Error::InvalidData(InvalidDataError::Bool { bad_value: 5 }))
    ));
}

#[cfg(feature = "num-complex-0_4")]
#[test]
fn complex_round_trip() {
    use ndarray_npy_chunked::lazy;
    use num_complex_0_4::Complex;

    let dir = tempdir().unwrap();
    let path = dir.path().join("c.npy");
    let original = Array::from_shape_fn((3, 4), |(i, j)| Complex::new(i as f32, -(j as f32)));
    lazy::save(&original, &path, &[2, 3])
        .unwrap()
        .compute()
        .unwrap();
    let header = ndarray_npy_chunked::npy::head(&path).unwrap();
    assert_eq!(header.dtype.to_string(), <Complex<f32>>::dtype().to_string());
    let loaded = LazyArray::<Complex<f32>>::load(&path, header, &[3, 3]).unwrap();
    assert_eq!(loaded.compute().unwrap(), original.into_dyn());
}
