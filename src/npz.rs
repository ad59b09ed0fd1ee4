//! `.npz` archives: zip files whose members are `.npy` files.
//!
//! Members stored without compression are plain `.npy` byte ranges inside
//! the archive, so they can be loaded lazily like any other `.npy` file.
//! Compressed members are read eagerly.

use crate::error::Error;
use crate::layout::ArrayHeader;
use crate::lazy::LazyArray;
use crate::npy::elements::Element;
use crate::npy::{head_from_reader, read_npy, write_npy};
use crate::options::ChunkOptions;
use crate::store::partial_path;
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Writer for `.npz` files.
///
/// # Example
///
/// ```no_run
/// use ndarray::{array, Array1, Array2};
/// use ndarray_npy_chunked::NpzWriter;
/// use std::fs::File;
///
/// let mut npz = NpzWriter::new(File::create("arrays.npz")?);
/// let a: Array2<i32> = array![[1, 2, 3], [4, 5, 6]];
/// let b: Array1<i32> = array![7, 8, 9];
/// npz.add_array("a", &a)?;
/// npz.add_array("b", &b)?;
/// npz.finish()?;
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct NpzWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: FileOptions,
}

impl<W: Write + Seek> NpzWriter<W> {
    /// Create a new `.npz` file without compression. See [`numpy.savez`].
    ///
    /// [`numpy.savez`]: https://docs.scipy.org/doc/numpy/reference/generated/numpy.savez.html
    pub fn new(writer: W) -> NpzWriter<W> {
        NpzWriter {
            zip: ZipWriter::new(writer),
            options: FileOptions::default().compression_method(CompressionMethod::Stored),
        }
    }

    /// Creates a new `.npz` file with compression. See [`numpy.savez_compressed`].
    ///
    /// [`numpy.savez_compressed`]: https://docs.scipy.org/doc/numpy/reference/generated/numpy.savez_compressed.html
    #[cfg(feature = "compressed_npz")]
    pub fn new_compressed(writer: W) -> NpzWriter<W> {
        NpzWriter {
            zip: ZipWriter::new(writer),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    /// Adds an array with the specified `name` to the `.npz` file.
    pub fn add_array<N, A, S, D>(&mut self, name: N, array: &ArrayBase<S, D>) -> Result<(), Error>
    where
        N: Into<String>,
        A: Element,
        S: Data<Elem = A>,
        D: Dimension,
    {
        self.zip.start_file(name, self.options)?;
        write_npy(array, &mut self.zip)
    }

    /// Calls [`.finish()`](ZipWriter::finish) on the zip file and
    /// [`.flush()`](Write::flush) on the writer, and then returns the writer.
    ///
    /// Errors during drop are silently ignored, so call this to find out
    /// whether the archive was completed.
    pub fn finish(mut self) -> Result<W, Error> {
        let mut writer = self.zip.finish()?;
        writer.flush()?;
        Ok(writer)
    }
}

impl NpzWriter<File> {
    /// Opens the existing archive at `path` for appending members.
    fn append(path: &Path) -> Result<NpzWriter<File>, Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(NpzWriter {
            zip: ZipWriter::new_append(file)?,
            options: FileOptions::default().compression_method(CompressionMethod::Stored),
        })
    }
}

/// Where a member's bytes live inside the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberLocation {
    /// Full member name, including any `.npy` suffix.
    pub name: String,
    /// Offset of the member's first byte from the start of the archive.
    pub data_start: u64,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Whether the member is stored without compression.
    pub stored: bool,
}

/// Reader for `.npz` files.
///
/// # Example
///
/// ```no_run
/// use ndarray::ArrayD;
/// use ndarray_npy_chunked::NpzReader;
/// use std::fs::File;
///
/// let mut npz = NpzReader::new(File::open("arrays.npz")?)?;
/// let a: ArrayD<i32> = npz.by_name("a")?;
/// let b: ArrayD<i32> = npz.by_name("b.npy")?;
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct NpzReader<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> NpzReader<R> {
    /// Creates a new `.npz` file reader.
    pub fn new(reader: R) -> Result<NpzReader<R>, Error> {
        Ok(NpzReader {
            zip: ZipArchive::new(reader)?,
        })
    }

    /// Returns `true` iff the `.npz` file doesn't contain any arrays.
    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Returns the number of arrays in the `.npz` file.
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    /// Returns the names of all of the arrays in the file.
    pub fn names(&mut self) -> Result<Vec<String>, Error> {
        Ok((0..self.zip.len())
            .map(|i| Ok(self.zip.by_index(i)?.name().to_owned()))
            .collect::<Result<_, ZipError>>()?)
    }

    /// The stored member name for `name`, which may omit the `.npy` suffix.
    fn resolve(&self, name: &str) -> String {
        if name.ends_with(".npy") || self.zip.file_names().any(|n| n == name) {
            name.to_owned()
        } else {
            format!("{}.npy", name)
        }
    }

    /// Locates the member `name` inside the archive.
    pub fn member_location(&mut self, name: &str) -> Result<MemberLocation, Error> {
        let name = self.resolve(name);
        let file = self.zip.by_name(&name)?;
        Ok(MemberLocation {
            name,
            data_start: file.data_start(),
            size: file.size(),
            stored: file.compression() == CompressionMethod::Stored,
        })
    }

    /// Reads the header of the member `name`.
    ///
    /// For stored members the byte offset is absolute within the archive;
    /// for compressed members it's relative to the start of the member.
    pub fn head(&mut self, name: &str) -> Result<ArrayHeader, Error> {
        let location = self.member_location(name)?;
        let base = if location.stored {
            location.data_start
        } else {
            0
        };
        head_from_reader(self.zip.by_name(&location.name)?, base)
    }

    /// Reads an array by name.
    pub fn by_name<A: Element>(&mut self, name: &str) -> Result<ArrayD<A>, Error> {
        let name = self.resolve(name);
        read_npy(self.zip.by_name(&name)?)
    }

    /// Reads an array by index in the `.npz` file.
    pub fn by_index<A: Element>(&mut self, index: usize) -> Result<ArrayD<A>, Error> {
        read_npy(self.zip.by_index(index)?)
    }
}

/// The stored name of `member`, with the `.npy` suffix added if missing.
fn member_file_name(member: &str) -> String {
    if member.ends_with(".npy") {
        member.to_owned()
    } else {
        format!("{}.npy", member)
    }
}

fn open(path: &Path) -> Result<NpzReader<BufReader<File>>, Error> {
    NpzReader::new(BufReader::new(File::open(path)?))
}

/// Reads the header of member `member` of the archive at `path`.
pub fn head<P: AsRef<Path>>(path: P, member: &str) -> Result<ArrayHeader, Error> {
    open(path.as_ref())?.head(member)
}

/// Reads the headers of all members of the archive at `path`, keyed by
/// member name without the `.npy` suffix.
pub fn head_all<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, ArrayHeader>, Error> {
    let mut npz = open(path.as_ref())?;
    let mut headers = BTreeMap::new();
    for name in npz.names()? {
        let header = npz.head(&name)?;
        let key = name.strip_suffix(".npy").unwrap_or(&name).to_owned();
        headers.insert(key, header);
    }
    Ok(headers)
}

/// Loads member `member` of the archive at `path` as a lazy array.
///
/// Stored members are read chunk by chunk straight from the archive.
/// Compressed members can't be addressed by byte offset, so they are read
/// into memory first.
pub fn load<A, P>(path: P, member: &str, options: &ChunkOptions) -> Result<LazyArray<A>, Error>
where
    A: Element,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut npz = open(path)?;
    let location = npz.member_location(member)?;
    if location.stored {
        let header = npz.head(&location.name)?;
        return LazyArray::load_with_options(path, header, options);
    }

    log::warn!(
        "member {} of {} is compressed, reading it into memory",
        location.name,
        path.display()
    );
    let array: ArrayD<A> = npz.by_name(&location.name)?;
    LazyArray::from_array_with_options(&array, options)
}

/// Loads every member of the archive at `path`, keyed by member name
/// without the `.npy` suffix.
///
/// All members must hold elements of type `A`.
pub fn load_all<A, P>(
    path: P,
    options: &ChunkOptions,
) -> Result<BTreeMap<String, LazyArray<A>>, Error>
where
    A: Element,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let names = open(path)?.names()?;
    names
        .into_iter()
        .map(|name| {
            let lazy = load(path, &name, options)?;
            let key = name.strip_suffix(".npy").unwrap_or(&name).to_owned();
            Ok((key, lazy))
        })
        .collect()
}

/// Writes `array` as member `member` of the archive at `path`, without
/// compression.
///
/// A new archive is created if there is none. A new member is appended to
/// an existing archive. An existing member of the same name is replaced:
/// the archive is rebuilt next to `path` without it, copying the other
/// members as they are, and then renamed over `path`. The write happens
/// immediately.
pub fn save<A, S, D, P>(path: P, member: &str, array: &ArrayBase<S, D>) -> Result<(), Error>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let name = member_file_name(member);
    log::debug!("writing member {} of {}", name, path.display());
    if !path.exists() {
        let mut npz = NpzWriter::new(File::create(path)?);
        npz.add_array(name, array)?;
        npz.finish()?;
        return Ok(());
    }

    let mut existing = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let stale = |n: &str| n == name || n == member;
    if !existing.file_names().any(stale) {
        drop(existing);
        let mut npz = NpzWriter::append(path)?;
        npz.add_array(name, array)?;
        npz.finish()?;
        return Ok(());
    }

    let partial = partial_path(path);
    let mut npz = NpzWriter::new(BufWriter::new(File::create(&partial)?));
    for i in 0..existing.len() {
        let file = existing.by_index_raw(i)?;
        if !stale(file.name()) {
            npz.zip.raw_copy_file(file)?;
        }
    }
    npz.add_array(name.as_str(), array)?;
    npz.finish()?;
    drop(existing);
    fs::rename(&partial, path)?;
    Ok(())
}
