//! Tarballs whose members are `.npy` files.
//!
//! In an uncompressed tarball every member's bytes are one contiguous range
//! of the file, so members are loaded lazily at their raw file position.
//! Compressed tarballs (gzip, bzip2 or xz) can only be streamed, so their
//! members are read into memory first.

use crate::error::{ConfigurationError, Error};
use crate::layout::ArrayHeader;
use crate::lazy::LazyArray;
use crate::npy::elements::Element;
use crate::npy::{head_from_reader, read_npy, write_npy};
use crate::options::ChunkOptions;
use crate::store::partial_path;
use ::tar::{Archive, Builder, EntryType, Header};
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Compression applied to a whole tarball.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// The compression implied by the file name of `path`, or `None` if it
    /// isn't a tarball name.
    pub fn from_path(path: &Path) -> Option<Compression> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let suffixes: &[(&str, Compression)] = &[
            (".tar", Compression::None),
            (".tar.gz", Compression::Gzip),
            (".tgz", Compression::Gzip),
            (".taz", Compression::Gzip),
            (".tar.bz2", Compression::Bzip2),
            (".tbz2", Compression::Bzip2),
            (".tbz", Compression::Bzip2),
            (".tb2", Compression::Bzip2),
            (".tz2", Compression::Bzip2),
            (".tar.xz", Compression::Xz),
            (".txz", Compression::Xz),
        ];
        suffixes
            .iter()
            .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
            .map(|&(_, compression)| compression)
    }
}

fn compression_of(path: &Path) -> Result<Compression, Error> {
    Compression::from_path(path).ok_or_else(|| {
        ConfigurationError::UnknownFormat(format!("{} is not a tarball name", path.display()))
            .into()
    })
}

/// Opens the tarball at `path` for streaming through its entries.
fn open(path: &Path, compression: Compression) -> Result<Archive<Box<dyn Read>>, Error> {
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = match compression {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
    };
    Ok(Archive::new(reader))
}

/// The entry name with any `.npy` suffix removed.
fn member_key(name: &str) -> &str {
    name.strip_suffix(".npy").unwrap_or(name)
}

/// Returns `true` if the entry called `entry` holds member `member`, which
/// may omit the `.npy` suffix.
fn is_member(entry: &str, member: &str) -> bool {
    entry == member || member_key(entry) == member
}

fn missing_member(path: &Path, member: &str) -> Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no member {} in {}", member, path.display()),
    )
    .into()
}

/// Returns the names of all regular file members of the tarball at `path`.
pub fn names<P: AsRef<Path>>(path: P) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    let mut archive = open(path, compression_of(path)?)?;
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type() == EntryType::Regular {
            names.push(entry.path()?.to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Reads the header of member `member` of the tarball at `path`.
///
/// For uncompressed tarballs the byte offset is absolute within the file;
/// for compressed ones it's relative to the start of the member.
pub fn head<P: AsRef<Path>>(path: P, member: &str) -> Result<ArrayHeader, Error> {
    let path = path.as_ref();
    let compression = compression_of(path)?;
    let mut archive = open(path, compression)?;
    for entry in archive.entries()? {
        let entry = entry?;
        if is_member(&entry.path()?.to_string_lossy(), member) {
            let base = match compression {
                Compression::None => entry.raw_file_position(),
                _ => 0,
            };
            return head_from_reader(entry, base);
        }
    }
    Err(missing_member(path, member))
}

/// Reads the headers of all members of the tarball at `path`, keyed by
/// member name without the `.npy` suffix.
pub fn head_all<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, ArrayHeader>, Error> {
    let path = path.as_ref();
    let compression = compression_of(path)?;
    let mut archive = open(path, compression)?;
    let mut headers = BTreeMap::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let base = match compression {
            Compression::None => entry.raw_file_position(),
            _ => 0,
        };
        headers.insert(member_key(&name).to_owned(), head_from_reader(entry, base)?);
    }
    Ok(headers)
}

/// Loads member `member` of the tarball at `path` as a lazy array.
///
/// Members of uncompressed tarballs are read chunk by chunk straight from
/// the file. Members of compressed tarballs are read into memory first.
pub fn load<A, P>(path: P, member: &str, options: &ChunkOptions) -> Result<LazyArray<A>, Error>
where
    A: Element,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let compression = compression_of(path)?;
    if compression == Compression::None {
        let header = head(path, member)?;
        return LazyArray::load_with_options(path, header, options);
    }

    log::warn!(
        "{} is compressed, reading member {} into memory",
        path.display(),
        member
    );
    let mut archive = open(path, compression)?;
    for entry in archive.entries()? {
        let entry = entry?;
        if is_member(&entry.path()?.to_string_lossy(), member) {
            let array: ArrayD<A> = read_npy(entry)?;
            return LazyArray::from_array_with_options(&array, options);
        }
    }
    Err(missing_member(path, member))
}

/// Loads every member of the tarball at `path`, keyed by member name
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
    names(path)?
        .into_iter()
        .map(|name| {
            let lazy = load(path, &name, options)?;
            Ok((member_key(&name).to_owned(), lazy))
        })
        .collect()
}

/// An entry kept when a tarball is rebuilt.
struct KeptEntry {
    path: PathBuf,
    header: Header,
    data: Vec<u8>,
}

fn build<W: Write>(writer: W, entries: &[KeptEntry]) -> io::Result<W> {
    let mut builder = Builder::new(writer);
    for entry in entries {
        let mut header = entry.header.clone();
        builder.append_data(&mut header, &entry.path, entry.data.as_slice())?;
    }
    builder.into_inner()
}

/// Writes `array` as member `member` of the tarball at `path`.
///
/// The tarball is created with the compression its name implies. If it
/// already exists it is rebuilt next to `path` with its other entries, minus
/// any previous member of the same name, plus the new member, and then
/// renamed over `path`. The write happens immediately.
pub fn save<A, S, D, P>(path: P, member: &str, array: &ArrayBase<S, D>) -> Result<(), Error>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let compression = compression_of(path)?;
    let name = if member.ends_with(".npy") {
        member.to_owned()
    } else {
        format!("{}.npy", member)
    };

    let mut entries = Vec::new();
    if path.exists() {
        let mut archive = open(path, compression)?;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_path = entry.path()?.into_owned();
            let entry_name = entry_path.to_string_lossy();
            if entry_name == name || entry_name == member {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            entries.push(KeptEntry {
                path: entry_path,
                header: entry.header().clone(),
                data,
            });
        }
    }

    let mut data = Vec::new();
    write_npy(array, &mut data)?;
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    entries.push(KeptEntry {
        path: PathBuf::from(&name),
        header,
        data,
    });
    log::debug!(
        "writing member {} of {} ({} entries)",
        name,
        path.display(),
        entries.len()
    );

    let partial = partial_path(path);
    let file = BufWriter::new(File::create(&partial)?);
    let mut file = match compression {
        Compression::None => build(file, &entries)?,
        Compression::Gzip => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            build(encoder, &entries)?.finish()?
        }
        Compression::Bzip2 => {
            let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            build(encoder, &entries)?.finish()?
        }
        Compression::Xz => build(xz2::write::XzEncoder::new(file, 6), &entries)?.finish()?,
    };
    file.flush()?;
    drop(file);
    fs::rename(&partial, path)?;
    Ok(())
}
