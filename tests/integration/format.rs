//! Loading and saving by path.

use ndarray::prelude::*;
use ndarray_npy_chunked::format::{self, Format, Location};
use ndarray_npy_chunked::{ChunkOptions, ConfigurationError, Element, Error, DEFAULT_MEMBER};
use tempfile::tempdir;

#[test]
fn npy_by_extension() {
    let dir = tempdir().unwrap();
    let location = Location::resolve(dir.path().join("a.npy"), None).unwrap();
    assert_eq!(location.format(), Format::Npy);

    let original = Array::from_iter(0i64..40).into_shape((8, 5)).unwrap();
    let options = ChunkOptions::default().with_chunks([3, 5]);
    let saved = format::save(&original, &location, &options).unwrap();
    assert_eq!(saved.num_chunks(), 3);
    saved.compute().unwrap();

    let header = format::head(&location).unwrap();
    assert_eq!(header.shape, vec![8, 5]);
    let loaded = format::load::<i64>(&location, &ChunkOptions::default()).unwrap();
    assert_eq!(loaded.num_chunks(), 1);
    assert_eq!(loaded.compute().unwrap(), original.into_dyn());
}

#[test]
fn automatic_chunks_respect_target_size() {
    let dir = tempdir().unwrap();
    let location = Location::resolve(dir.path().join("a.npy"), None).unwrap();
    let original = Array::from_iter((0..60).map(|x| x as f32)).into_shape((10, 6)).unwrap();
    format::save(&original, &location, &ChunkOptions::default())
        .unwrap()
        .compute()
        .unwrap();

    let options = ChunkOptions::default().with_target_chunk_bytes(2 * 6 * 4);
    let loaded = format::load::<f32>(&location, &options).unwrap();
    assert_eq!(loaded.chunks()[0].coordinate_range, vec![0..2, 0..6]);
    assert_eq!(loaded.num_chunks(), 5);
    assert_eq!(loaded.compute().unwrap(), original.into_dyn());
}

#[cfg(feature = "npz")]
#[test]
fn archive_member_path() {
    let dir = tempdir().unwrap();
    let location = Location::resolve(dir.path().join("arrays.npz").join("m"), None).unwrap();
    assert_eq!(location.format(), Format::Npz);

    let original = array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
    let lazy_source = ndarray_npy_chunked::LazyArray::from_array(&original, &[1, 2]).unwrap();
    format::save(lazy_source.map(|x| x * 10.0), &location, &ChunkOptions::default()).unwrap();

    let header = format::head(&location).unwrap();
    assert_eq!(header.shape, vec![3, 2]);
    let options = ChunkOptions::default().with_chunks([2, 2]);
    let loaded = format::load::<f64>(&location, &options).unwrap();
    assert_eq!(loaded.num_chunks(), 2);
    assert_eq!(loaded.compute().unwrap(), original.mapv(|x| x * 10.0).into_dyn());
}

#[test]
fn text_file() {
    let dir = tempdir().unwrap();
    let location = Location::resolve(dir.path().join("values.dat"), Some("ascii")).unwrap();
    let original = array![[1i32, -2, 3], [4, 5, -6]];
    format::save(&original, &location, &ChunkOptions::default()).unwrap();
    assert_eq!(
        std::fs::read_to_string(location.path()).unwrap(),
        "1 -2 3\n4 5 -6\n"
    );
    assert!(matches!(
        format::head(&location),
        Err(Error::Configuration(ConfigurationError::Unsupported(_)))
    ));
    let options = ChunkOptions::default().with_chunks([1, 3]);
    let loaded = format::load::<i32>(&location, &options).unwrap();
    assert_eq!(loaded.num_chunks(), 2);
    assert_eq!(loaded.compute().unwrap(), original.into_dyn());
}

#[test]
fn unknown_formats() {
    assert!(matches!(
        Location::resolve("a.h5", None),
        Err(ConfigurationError::UnknownFormat(_))
    ));
    assert!(matches!(
        Location::resolve("a.npy", Some("hdf5")),
        Err(ConfigurationError::UnknownFormat(_))
    ));
}

#[cfg(feature = "npz")]
#[test]
fn whole_npz_archive() {
    let dir = tempdir().unwrap();
    let archive = Location::resolve(dir.path().join("foo.npz"), None).unwrap();
    assert!(matches!(archive, Location::Archive { .. }));

    let original = Array::from_iter(0i32..12).into_shape((3, 4)).unwrap();
    format::save(&original, &archive, &ChunkOptions::default()).unwrap();
    let member = Location::resolve(dir.path().join("foo.npz").join("arr_0"), None).unwrap();
    assert_eq!(
        format::load::<i32>(&member, &ChunkOptions::default())
            .unwrap()
            .compute()
            .unwrap(),
        original.clone().into_dyn()
    );

    // Saving to the whole archive again replaces the default member.
    let next = original.mapv(|x| -x);
    format::save(&next, &archive, &ChunkOptions::default()).unwrap();
    let headers = format::head_all(&archive).unwrap();
    assert_eq!(headers.keys().collect::<Vec<_>>(), vec![DEFAULT_MEMBER]);
    assert_eq!(headers[DEFAULT_MEMBER].shape, vec![3, 4]);
    let arrays = format::load_all::<i32>(&archive, &ChunkOptions::default()).unwrap();
    assert_eq!(arrays[DEFAULT_MEMBER].compute().unwrap(), next.into_dyn());

    assert!(matches!(
        format::head(&archive),
        Err(Error::Configuration(ConfigurationError::Unsupported(_)))
    ));
    assert!(format::load::<i32>(&archive, &ChunkOptions::default()).is_err());
    assert!(format::head_all(&member).is_err());
}

#[cfg(feature = "tar")]
#[test]
fn tarball_member_path() {
    let dir = tempdir().unwrap();
    let location = Location::resolve(dir.path().join("arrays.tar").join("m"), None).unwrap();
    assert_eq!(location.format(), Format::Tar);

    let original = array![[1u8, 2, 3], [4, 5, 6]];
    format::save(&original, &location, &ChunkOptions::default()).unwrap();
    assert_eq!(format::head(&location).unwrap().shape, vec![2, 3]);
    let options = ChunkOptions::default().with_chunks([1, 3]);
    let loaded = format::load::<u8>(&location, &options).unwrap();
    assert_eq!(loaded.num_chunks(), 2);
    assert_eq!(loaded.compute().unwrap(), original.into_dyn());
}

/// Saves and loads `original` at `location` using only the `Element` bound.
fn save_and_load<A>(original: &ArrayD<A>, location: &Location)
where
    A: Element + std::fmt::Debug + PartialEq,
{
    let saved = format::save(original, location, &ChunkOptions::default()).unwrap();
    saved.compute().unwrap();
    let loaded = format::load::<A>(location, &ChunkOptions::default()).unwrap();
    assert_eq!(&loaded.compute().unwrap(), original);
}

#[test]
fn generic_elements_through_every_format() {
    let dir = tempdir().unwrap();
    let floats = array![[0.5f64, -1.25], [3.0, 4.5]].into_dyn();
    let flags = array![[true, false, true], [false, false, true]].into_dyn();
    let mut names = vec!["a.npy", "a.txt"];
    if cfg!(feature = "npz") {
        names.push("a.npz/m");
    }
    if cfg!(feature = "tar") {
        names.push("a.tgz/m");
    }
    for name in names {
        let location = Location::resolve(dir.path().join(name), None).unwrap();
        save_and_load(&floats, &location);
        save_and_load(&flags, &location);
    }
}
