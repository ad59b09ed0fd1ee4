//! Format dispatch.
//!
//! A path (optionally with an explicit format name) is resolved once into a
//! [`Location`], which tells how the array can be accessed: raw binary
//! `.npy` data is loaded and saved chunk by chunk, while archive members and
//! text files go through their own readers and writers.
//!
//! An archive path with a member (`data/arrays.npz/x`, `data/arrays.tar/x`)
//! addresses one array. A bare archive path addresses the whole archive:
//! [`head_all`] and [`load_all`] return every member, and [`save`] writes
//! the member [`DEFAULT_MEMBER`].

use crate::error::{ConfigurationError, Error};
use crate::layout::ArrayHeader;
use crate::lazy::{self, IntoLazyArray, LazyArray};
use crate::npy::{self, elements::Element};
#[cfg(feature = "npz")]
use crate::npz;
use crate::options::ChunkOptions;
#[cfg(feature = "tar")]
use crate::tarball;
use crate::text;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Member written when an array is saved to a whole archive, as
/// `numpy.savez` names its first positional array.
pub const DEFAULT_MEMBER: &str = "arr_0";

/// A supported file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Npy,
    Npz,
    Tar,
    Text,
}

impl Format {
    /// The format implied by the file name of `path`, if any.
    pub fn from_extension(path: &Path) -> Option<Format> {
        #[cfg(feature = "tar")]
        if tarball::Compression::from_path(path).is_some() {
            return Some(Format::Tar);
        }
        path.extension()?.to_str()?.parse().ok()
    }
}

impl FromStr for Format {
    type Err = ConfigurationError;

    fn from_str(name: &str) -> Result<Format, ConfigurationError> {
        match name.to_ascii_lowercase().as_str() {
            "numpy" | "npy" => Ok(Format::Npy),
            "numpyz" | "npz" => Ok(Format::Npz),
            "tar" | "tarball" => Ok(Format::Tar),
            "ascii" | "text" | "txt" => Ok(Format::Text),
            _ => Err(ConfigurationError::UnknownFormat(name.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Format::Npy => "npy",
            Format::Npz => "npz",
            Format::Tar => "tar",
            Format::Text => "text",
        })
    }
}

/// The kind of container holding archive members.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// A zip archive of `.npy` files.
    Npz,
    /// A tarball of `.npy` files, optionally gzip or bzip2 compressed.
    Tar,
}

impl ArchiveKind {
    fn of(format: Format) -> Option<ArchiveKind> {
        match format {
            Format::Npz => Some(ArchiveKind::Npz),
            Format::Tar => Some(ArchiveKind::Tar),
            Format::Npy | Format::Text => None,
        }
    }

    pub fn format(self) -> Format {
        match self {
            ArchiveKind::Npz => Format::Npz,
            ArchiveKind::Tar => Format::Tar,
        }
    }
}

/// Where an array lives, and so how it can be accessed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// An `.npy` file: header followed by flat data, chunk addressable.
    RawBinary(PathBuf),
    /// A whole archive, holding any number of members.
    Archive { archive: PathBuf, kind: ArchiveKind },
    /// One member of an archive.
    ArchiveMember {
        archive: PathBuf,
        kind: ArchiveKind,
        member: String,
    },
    /// A whitespace-separated text file.
    Text(PathBuf),
}

/// Splits `dir/archive.npz/member` into the archive path, its kind and the
/// member name, if any.
fn split_archive(path: &Path) -> Option<(PathBuf, ArchiveKind, Option<String>)> {
    let mut archive = PathBuf::new();
    let mut components = path.components();
    while let Some(component) = components.next() {
        archive.push(component);
        if let Some(kind) = Format::from_extension(&archive).and_then(ArchiveKind::of) {
            let member = components.as_path();
            let member = if member.as_os_str().is_empty() {
                None
            } else {
                Some(member.to_string_lossy().into_owned())
            };
            return Some((archive, kind, member));
        }
    }
    None
}

fn archive_location(archive: PathBuf, kind: ArchiveKind, member: Option<String>) -> Location {
    match member {
        Some(member) => Location::ArchiveMember {
            archive,
            kind,
            member,
        },
        None => Location::Archive { archive, kind },
    }
}

impl Location {
    /// Resolves `path` using the explicit `format` name if given, otherwise
    /// the path itself (an archive component or the file extension).
    ///
    /// With an explicit archive format and no archive component in `path`,
    /// the last component of `path` is the member and the rest the archive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownFormat`] if the format name or
    /// extension isn't recognized, and [`ConfigurationError::Unsupported`]
    /// if an archive format is given for a path with a single component.
    pub fn resolve<P: AsRef<Path>>(
        path: P,
        format: Option<&str>,
    ) -> Result<Location, ConfigurationError> {
        let path = path.as_ref();
        let format = match format {
            Some(name) => Some(name.parse::<Format>()?),
            None => None,
        };
        let split = split_archive(path);

        match (format, split) {
            (None, Some((archive, kind, member))) => Ok(archive_location(archive, kind, member)),
            (Some(format @ (Format::Npz | Format::Tar)), split) => {
                let kind = if format == Format::Npz {
                    ArchiveKind::Npz
                } else {
                    ArchiveKind::Tar
                };
                if let Some((archive, _, member)) = split {
                    return Ok(archive_location(archive, kind, member));
                }
                let no_archive = || {
                    ConfigurationError::Unsupported(format!(
                        "no archive in {}",
                        path.display()
                    ))
                };
                let member = path.file_name().ok_or_else(no_archive)?;
                match path.parent() {
                    Some(archive) if !archive.as_os_str().is_empty() => {
                        Ok(Location::ArchiveMember {
                            archive: archive.to_path_buf(),
                            kind,
                            member: member.to_string_lossy().into_owned(),
                        })
                    }
                    _ => Err(no_archive()),
                }
            }
            (Some(Format::Npy), _) => Ok(Location::RawBinary(path.to_path_buf())),
            (Some(Format::Text), _) => Ok(Location::Text(path.to_path_buf())),
            (None, None) => match Format::from_extension(path) {
                Some(Format::Npy) => Ok(Location::RawBinary(path.to_path_buf())),
                Some(Format::Text) => Ok(Location::Text(path.to_path_buf())),
                _ => Err(ConfigurationError::UnknownFormat(
                    path.display().to_string(),
                )),
            },
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Location::RawBinary(_) => Format::Npy,
            Location::Archive { kind, .. } | Location::ArchiveMember { kind, .. } => kind.format(),
            Location::Text(_) => Format::Text,
        }
    }

    /// The file holding the array.
    pub fn path(&self) -> &Path {
        match self {
            Location::RawBinary(path) | Location::Text(path) => path,
            Location::Archive { archive, .. } => archive,
            Location::ArchiveMember { archive, .. } => archive,
        }
    }
}

fn disabled(kind: ArchiveKind) -> Error {
    let feature = match kind {
        ArchiveKind::Npz => "npz",
        ArchiveKind::Tar => "tar",
    };
    ConfigurationError::Unsupported(format!(
        "{} archives require the `{}` feature",
        kind.format(),
        feature
    ))
    .into()
}

fn whole_archive(archive: &Path, op: &str) -> Error {
    ConfigurationError::Unsupported(format!(
        "{} is a whole archive; use {} or name a member",
        archive.display(),
        op
    ))
    .into()
}

fn not_an_archive(location: &Location) -> Error {
    let path = location.path().display();
    ConfigurationError::Unsupported(format!("{} is not a whole archive", path)).into()
}

fn member_head(archive: &Path, kind: ArchiveKind, member: &str) -> Result<ArrayHeader, Error> {
    match kind {
        #[cfg(feature = "npz")]
        ArchiveKind::Npz => npz::head(archive, member),
        #[cfg(feature = "tar")]
        ArchiveKind::Tar => tarball::head(archive, member),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = (archive, member);
            Err(disabled(kind))
        }
    }
}

fn member_load<A: Element>(
    archive: &Path,
    kind: ArchiveKind,
    member: &str,
    options: &ChunkOptions,
) -> Result<LazyArray<A>, Error> {
    match kind {
        #[cfg(feature = "npz")]
        ArchiveKind::Npz => npz::load(archive, member, options),
        #[cfg(feature = "tar")]
        ArchiveKind::Tar => tarball::load(archive, member, options),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = (archive, member, options);
            Err(disabled(kind))
        }
    }
}

fn member_save<A: Element>(
    archive: &Path,
    kind: ArchiveKind,
    member: &str,
    data: &ndarray::ArrayD<A>,
) -> Result<(), Error> {
    match kind {
        #[cfg(feature = "npz")]
        ArchiveKind::Npz => npz::save(archive, member, data),
        #[cfg(feature = "tar")]
        ArchiveKind::Tar => tarball::save(archive, member, data),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = (archive, member, data);
            Err(disabled(kind))
        }
    }
}

/// Reads the header of the array at `location` without reading its data.
///
/// Text files have no header and whole archives hold several, so this
/// returns [`ConfigurationError::Unsupported`] for them.
pub fn head(location: &Location) -> Result<ArrayHeader, Error> {
    match location {
        Location::RawBinary(path) => npy::head(path),
        Location::ArchiveMember {
            archive,
            kind,
            member,
        } => member_head(archive, *kind, member),
        Location::Archive { archive, .. } => Err(whole_archive(archive, "head_all")),
        Location::Text(path) => Err(ConfigurationError::Unsupported(format!(
            "text file {} has no header",
            path.display()
        ))
        .into()),
    }
}

/// Reads the headers of all members of the whole archive at `location`,
/// keyed by member name without the `.npy` suffix.
pub fn head_all(location: &Location) -> Result<BTreeMap<String, ArrayHeader>, Error> {
    match location {
        #[cfg(feature = "npz")]
        Location::Archive {
            archive,
            kind: ArchiveKind::Npz,
        } => npz::head_all(archive),
        #[cfg(feature = "tar")]
        Location::Archive {
            archive,
            kind: ArchiveKind::Tar,
        } => tarball::head_all(archive),
        #[allow(unreachable_patterns)]
        Location::Archive { kind, .. } => Err(disabled(*kind)),
        other => Err(not_an_archive(other)),
    }
}

/// Loads the array at `location` as a lazy array.
pub fn load<A: Element>(
    location: &Location,
    options: &ChunkOptions,
) -> Result<LazyArray<A>, Error> {
    match location {
        Location::RawBinary(path) => {
            let header = npy::head(path)?;
            LazyArray::load_with_options(path, header, options)
        }
        Location::ArchiveMember {
            archive,
            kind,
            member,
        } => member_load(archive, *kind, member, options),
        Location::Archive { archive, .. } => Err(whole_archive(archive, "load_all")),
        Location::Text(path) => {
            LazyArray::from_array_with_options(&text::read_text(path)?, options)
        }
    }
}

/// Loads every member of the whole archive at `location`, keyed by member
/// name without the `.npy` suffix. All members must hold elements of type
/// `A`.
pub fn load_all<A: Element>(
    location: &Location,
    options: &ChunkOptions,
) -> Result<BTreeMap<String, LazyArray<A>>, Error> {
    match location {
        #[cfg(feature = "npz")]
        Location::Archive {
            archive,
            kind: ArchiveKind::Npz,
        } => npz::load_all(archive, options),
        #[cfg(feature = "tar")]
        Location::Archive {
            archive,
            kind: ArchiveKind::Tar,
        } => tarball::load_all(archive, options),
        #[allow(unreachable_patterns)]
        Location::Archive { kind, .. } => Err(disabled(*kind)),
        other => Err(not_an_archive(other)),
    }
}

/// Saves `array` to `location`.
///
/// For raw binary files only the header is written now; computing the
/// returned array writes the data chunk by chunk. Archive members and text
/// files are written immediately, materializing a lazy `array` first, and
/// the returned array just holds the written data. Saving to a whole
/// archive writes the member [`DEFAULT_MEMBER`], replacing any previous one.
pub fn save<A, T>(
    array: T,
    location: &Location,
    options: &ChunkOptions,
) -> Result<LazyArray<A>, Error>
where
    A: Element,
    T: IntoLazyArray<A>,
{
    match location {
        Location::RawBinary(path) => lazy::save_with_options(array, path, options),
        Location::ArchiveMember {
            archive,
            kind,
            member,
        } => {
            let data = array.into_lazy_array()?.compute()?;
            member_save(archive, *kind, member, &data)?;
            LazyArray::from_array_with_options(&data, options)
        }
        Location::Archive { archive, kind } => {
            let data = array.into_lazy_array()?.compute()?;
            member_save(archive, *kind, DEFAULT_MEMBER, &data)?;
            LazyArray::from_array_with_options(&data, options)
        }
        Location::Text(path) => {
            let data = array.into_lazy_array()?.compute()?;
            text::write_text(&data, path)?;
            LazyArray::from_array_with_options(&data, options)
        }
    }
}
