//! Access to the data used to construct a torrent file.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::metainfo::validate_path_component;

/// Trait used to access data that is stored at some location.
pub trait DataEntry: Send {
    type Data: io::Read;

    /// Open the entry for reading from the start.
    fn access(&self) -> io::Result<Self::Data>;
}

/// One file of an accessor, with its relative path and stat'd length.
pub struct AccessorEntry<T> {
    /// Raw relative path components of the entry.
    pub path: Vec<Vec<u8>>,
    /// Length of the entry in bytes.
    pub length: u64,
    /// Handle used to read the entry's bytes.
    pub entry: T,
}

/// Trait for accessing the data used to construct a torrent file.
pub trait Accessor {
    type Entry: DataEntry;

    /// Access the directory that all files should be relative to.
    fn access_directory(&self) -> Option<&Path>;

    /// Access the ordered file entries with their lengths and relative paths.
    ///
    /// Entries are yielded sorted by raw path component bytes, lengths come
    /// from a single stat each, and every failure surfaces before any
    /// hashing starts.
    fn access_entries(&self) -> ParseResult<Vec<AccessorEntry<Self::Entry>>>;
}

impl<'a, T> Accessor for &'a T
    where T: Accessor
{
    type Entry = T::Entry;

    fn access_directory(&self) -> Option<&Path> {
        Accessor::access_directory(*self)
    }

    fn access_entries(&self) -> ParseResult<Vec<AccessorEntry<T::Entry>>> {
        Accessor::access_entries(*self)
    }
}

/// Trait for types convertible as a Result into some Accessor.
pub trait IntoAccessor {
    /// Concrete Accessor type that will be converted into.
    type Accessor: Accessor;

    /// Convert the type into some Accessor as a Result.
    fn into_accessor(self) -> ParseResult<Self::Accessor>;
}

// ----------------------------------------------------------------------------//

/// Accessor that pulls data in from the file system.
pub struct FileAccessor {
    absolute_path: PathBuf,
    directory_name: Option<PathBuf>,
}

impl FileAccessor {
    /// Create a new FileAccessor from the given file/directory path.
    pub fn new<T>(path: T) -> ParseResult<FileAccessor>
        where T: AsRef<Path>
    {
        let absolute_path = path.as_ref().canonicalize().map_err(|_| {
            ParseError::from_kind(ParseErrorKind::FilesystemMissing {
                path: path.as_ref().to_string_lossy().into_owned(),
            })
        })?;
        let directory_name = if absolute_path.is_dir() {
            let dir_name: &Path = absolute_path.iter().last()
                .expect("torv_metainfo: Canonical Paths Cannot Be Empty")
                .as_ref();

            Some(dir_name.to_path_buf())
        } else {
            None
        };

        Ok(FileAccessor {
            absolute_path,
            directory_name,
        })
    }
}

impl IntoAccessor for FileAccessor {
    type Accessor = FileAccessor;

    fn into_accessor(self) -> ParseResult<FileAccessor> {
        Ok(self)
    }
}

impl<T> IntoAccessor for T
    where T: AsRef<Path>
{
    type Accessor = FileAccessor;

    fn into_accessor(self) -> ParseResult<FileAccessor> {
        FileAccessor::new(self)
    }
}

impl Accessor for FileAccessor {
    type Entry = FileEntry;

    fn access_directory(&self) -> Option<&Path> {
        self.directory_name.as_deref()
    }

    fn access_entries(&self) -> ParseResult<Vec<AccessorEntry<FileEntry>>> {
        let num_skip_paths = if self.access_directory().is_some() {
            self.absolute_path.iter().count()
        } else {
            self.absolute_path.iter().count() - 1
        };

        let mut entries = Vec::new();
        let walk = WalkDir::new(&self.absolute_path)
            .sort_by_file_name()
            .into_iter()
            .filter(|res_entry| {
                res_entry.as_ref().map(|entry| entry.file_type().is_file()).unwrap_or(true)
            });

        for res_entry in walk {
            let entry = res_entry?;
            let metadata = entry.metadata().map_err(|_| {
                ParseError::from_kind(ParseErrorKind::FilesystemMissing {
                    path: entry.path().to_string_lossy().into_owned(),
                })
            })?;

            let mut path = Vec::new();
            for os_component in entry.path().iter().skip(num_skip_paths) {
                let component = os_component.to_str().ok_or_else(|| {
                    ParseError::from_kind(ParseErrorKind::InvalidData {
                        details: "Found Path Element That Is Not Valid UTF-8".to_owned(),
                    })
                })?;
                validate_path_component(component.as_bytes())?;

                path.push(component.as_bytes().to_vec());
            }

            entries.push(AccessorEntry {
                path,
                length: metadata.len(),
                entry: FileEntry { path: entry.path().to_path_buf() },
            });
        }

        Ok(entries)
    }
}

/// Filesystem backed data entry.
pub struct FileEntry {
    path: PathBuf,
}

impl DataEntry for FileEntry {
    type Data = File;

    fn access(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

// ----------------------------------------------------------------------------//

/// Accessor that pulls data in directly from memory.
pub struct DirectAccessor<'a> {
    file_name: &'a str,
    file_contents: &'a [u8],
}

impl<'a> DirectAccessor<'a> {
    /// Create a new DirectAccessor from the given file name and contents.
    pub fn new(file_name: &'a str, file_contents: &'a [u8]) -> DirectAccessor<'a> {
        DirectAccessor {
            file_name,
            file_contents,
        }
    }
}

impl<'a> IntoAccessor for DirectAccessor<'a> {
    type Accessor = DirectAccessor<'a>;

    fn into_accessor(self) -> ParseResult<DirectAccessor<'a>> {
        Ok(self)
    }
}

impl<'a> Accessor for DirectAccessor<'a> {
    type Entry = DirectEntry<'a>;

    fn access_directory(&self) -> Option<&Path> {
        None
    }

    fn access_entries(&self) -> ParseResult<Vec<AccessorEntry<DirectEntry<'a>>>> {
        validate_path_component(self.file_name.as_bytes())?;

        Ok(vec![AccessorEntry {
            path: vec![self.file_name.as_bytes().to_vec()],
            length: self.file_contents.len() as u64,
            entry: DirectEntry { contents: self.file_contents },
        }])
    }
}

/// Memory backed data entry.
pub struct DirectEntry<'a> {
    contents: &'a [u8],
}

impl<'a> DataEntry for DirectEntry<'a> {
    type Data = Cursor<&'a [u8]>;

    fn access(&self) -> io::Result<Cursor<&'a [u8]>> {
        Ok(Cursor::new(self.contents))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Accessor, DirectAccessor, FileAccessor};

    #[test]
    fn positive_direct_accessor_single_entry() {
        let accessor = DirectAccessor::new("file.bin", b"some file data");

        let entries = accessor.access_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].length, 14);
        assert_eq!(entries[0].path, vec![b"file.bin".to_vec()]);
        assert!(accessor.access_directory().is_none());
    }

    #[test]
    fn positive_file_accessor_sorted_relative_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("zebra.bin"), b"zz").unwrap();
        fs::write(dir.path().join("apple.bin"), b"a").unwrap();
        fs::write(dir.path().join("nested").join("inner.bin"), b"inner").unwrap();

        let accessor = FileAccessor::new(dir.path()).unwrap();
        assert!(accessor.access_directory().is_some());

        let entries = accessor.access_entries().unwrap();
        let paths: Vec<&Vec<Vec<u8>>> = entries.iter().map(|entry| &entry.path).collect();

        assert_eq!(paths,
                   vec![&vec![b"apple.bin".to_vec()],
                        &vec![b"nested".to_vec(), b"inner.bin".to_vec()],
                        &vec![b"zebra.bin".to_vec()]]);
        assert_eq!(entries[0].length, 1);
        assert_eq!(entries[2].length, 2);
    }

    #[test]
    fn positive_file_accessor_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("single.bin");
        fs::write(&file_path, b"payload").unwrap();

        let accessor = FileAccessor::new(&file_path).unwrap();
        assert!(accessor.access_directory().is_none());

        let entries = accessor.access_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, vec![b"single.bin".to_vec()]);
        assert_eq!(entries[0].length, 7);
    }

    #[test]
    fn negative_file_accessor_missing_path() {
        let dir = tempfile::tempdir().unwrap();

        let result = FileAccessor::new(dir.path().join("missing"));
        assert!(result.is_err());
    }
}
