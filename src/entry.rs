use anyhow::{bail, Result};
use std::{
    fs,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const COMPARE_CHUNK: usize = 64 * 1024;

/// One importable file. Entries are never mutated by the import.
pub trait FileEntry: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    fn read_bytes(&self) -> io::Result<Vec<u8>>;

    /// False when `name` is only a lossy rendering of a name that is not
    /// valid UTF-8.
    fn has_exact_name(&self) -> bool {
        true
    }

    /// Backing file on disk, when there is one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Byte-for-byte content equality. Names are not compared.
    fn is_identical(&self, other: &dyn FileEntry) -> io::Result<bool> {
        if self.size() != other.size() {
            return Ok(false);
        }
        Ok(self.read_bytes()? == other.read_bytes()?)
    }
}

/// Something that can list the files of one import.
pub trait MediaSource {
    fn files(&self) -> Result<Vec<Box<dyn FileEntry>>>;
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    exact_name: bool,
    size: u64,
}

impl LocalFile {
    pub fn new(path: PathBuf, size: u64) -> Self {
        let raw = path.file_name().unwrap_or_default();
        let exact_name = raw.to_str().is_some();
        let name = raw.to_string_lossy().into_owned();
        Self {
            path,
            name,
            exact_name,
            size,
        }
    }
}

impl FileEntry for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn has_exact_name(&self) -> bool {
        self.exact_name
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn is_identical(&self, other: &dyn FileEntry) -> io::Result<bool> {
        if self.size != other.size() {
            return Ok(false);
        }
        match other.path() {
            Some(other_path) => files_equal(&self.path, other_path),
            None => Ok(fs::read(&self.path)? == other.read_bytes()?),
        }
    }
}

fn files_equal(left: &Path, right: &Path) -> io::Result<bool> {
    if left == right {
        return Ok(true);
    }
    let mut left = BufReader::new(fs::File::open(left)?);
    let mut right = BufReader::new(fs::File::open(right)?);
    let mut left_buf = vec![0u8; COMPARE_CHUNK];
    let mut right_buf = vec![0u8; COMPARE_CHUNK];
    loop {
        let read = read_full(&mut left, &mut left_buf)?;
        let other_read = read_full(&mut right, &mut right_buf)?;
        if read != other_read || left_buf[..read] != right_buf[..other_read] {
            return Ok(false);
        }
        if read == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(count) => filled += count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// A directory on disk, listed flat or recursively.
#[derive(Debug, Clone)]
pub struct LocalRoot {
    pub path: PathBuf,
    pub recursive: bool,
}

impl LocalRoot {
    pub fn new(path: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            path: path.into(),
            recursive,
        }
    }

    pub fn local_files(&self) -> Result<Vec<LocalFile>> {
        if !self.path.is_dir() {
            bail!("media folder not found: {}", self.path.display());
        }
        let mut walker = WalkDir::new(&self.path).min_depth(1).sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }
        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!("skipping {}: {err}", entry.path().display());
                    continue;
                }
            };
            files.push(LocalFile::new(entry.into_path(), meta.len()));
        }
        Ok(files)
    }
}

impl MediaSource for LocalRoot {
    fn files(&self) -> Result<Vec<Box<dyn FileEntry>>> {
        let files = self
            .local_files()?
            .into_iter()
            .map(|file| Box::new(file) as Box<dyn FileEntry>)
            .collect();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local(path: PathBuf) -> LocalFile {
        let size = fs::metadata(&path).unwrap().len();
        LocalFile::new(path, size)
    }

    #[test]
    fn recursive_root_lists_nested_files_by_name() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.png"), b"aaa").unwrap();
        fs::write(dir.path().join("sub").join("b.mp3"), b"bb").unwrap();

        let files = LocalRoot::new(dir.path(), true).files().unwrap();
        let mut names: Vec<&str> = files.iter().map(|file| file.name()).collect();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.mp3"]);

        let flat = LocalRoot::new(dir.path(), false).files().unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].name(), "a.png");
        assert_eq!(flat[0].size(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let root = LocalRoot::new(dir.path().join("nope"), true);
        assert!(root.files().is_err());
    }

    #[test]
    fn identical_compares_content_not_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("two.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("three.jpg"), b"same bytez").unwrap();

        let one = local(dir.path().join("one.jpg"));
        let two = local(dir.path().join("two.jpg"));
        let three = local(dir.path().join("three.jpg"));
        assert!(one.is_identical(&two).unwrap());
        assert!(!one.is_identical(&three).unwrap());
        assert!(one.has_exact_name());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_flagged() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"a\xff.jpg"));
        if fs::write(&path, b"x").is_err() {
            // Filesystems that insist on UTF-8 names cannot hold this file.
            return;
        }
        let files = LocalRoot::new(dir.path(), false).files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(!files[0].has_exact_name());
        assert_eq!(files[0].name(), "a\u{fffd}.jpg");
    }
}
