use crate::{
    entry::{FileEntry, LocalRoot, MediaSource},
    error::StoreError,
};
use anyhow::Result;
use blake3::Hasher;
use std::{collections::HashMap, fs, path::PathBuf};

/// Writes land here first. The store lists only top-level files, so
/// staged data never shows up as media.
const STAGING_DIR: &str = ".media-import-staging";

/// Destination of an import: one flat namespace of media names.
pub trait MediaStore: Send + Sync {
    fn files(&self) -> Result<HashMap<String, Box<dyn FileEntry>>>;

    /// Stores `data` under `name` and returns the name actually used.
    fn write(&self, name: &str, data: &[u8]) -> Result<String, StoreError>;
}

/// A media folder on disk. Writing a name that already holds different
/// content stores the data under a hash-suffixed name instead.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_new(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let staging = self.dir.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let partial = staging.join(name);
        fs::write(&partial, data)?;
        if let Err(err) = fs::rename(&partial, self.dir.join(name)) {
            let _ = fs::remove_file(&partial);
            return Err(err.into());
        }
        Ok(())
    }
}

impl MediaStore for LocalStore {
    fn files(&self) -> Result<HashMap<String, Box<dyn FileEntry>>> {
        if !self.dir.exists() {
            return Ok(HashMap::new());
        }
        let files = LocalRoot::new(&self.dir, false).files()?;
        Ok(files
            .into_iter()
            .map(|file| (file.name().to_string(), file))
            .collect())
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<String, StoreError> {
        validate_name(name)?;
        fs::create_dir_all(&self.dir)?;

        let mut candidate = name.to_string();
        loop {
            let dest = self.dir.join(&candidate);
            if !dest.exists() {
                self.write_new(&candidate, data)?;
                return Ok(candidate);
            }
            if fs::read(&dest)? == data {
                return Ok(candidate);
            }
            let renamed = hashed_name(name, data);
            if renamed == candidate {
                return Err(StoreError::Unavailable(format!(
                    "no free name for {name} in {}",
                    self.dir.display()
                )));
            }
            candidate = renamed;
        }
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn hashed_name(name: &str, data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    let hash = hasher.finalize().to_hex();
    let digest = &hash.as_str()[..16];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{digest}.{ext}"),
        _ => format!("{name}-{digest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_list() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("media"));
        assert!(store.files().unwrap().is_empty());

        let stored = store.write("cat.jpg", b"meow").unwrap();
        assert_eq!(stored, "cat.jpg");
        let files = store.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["cat.jpg"].size(), 4);
    }

    #[test]
    fn identical_rewrite_keeps_name() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.write("cat.jpg", b"meow").unwrap();
        assert_eq!(store.write("cat.jpg", b"meow").unwrap(), "cat.jpg");
        assert_eq!(store.files().unwrap().len(), 1);
    }

    #[test]
    fn clashing_content_is_renamed() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.write("cat.jpg", b"meow").unwrap();
        let stored = store.write("cat.jpg", b"purr").unwrap();
        assert_ne!(stored, "cat.jpg");
        assert!(stored.starts_with("cat-"));
        assert!(stored.ends_with(".jpg"));
        assert_eq!(fs::read(dir.path().join(&stored)).unwrap(), b"purr");
    }

    #[test]
    fn partial_suffix_is_an_ordinary_name() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        fs::write(dir.path().join("clip.partial"), b"old").unwrap();
        store.write("new.jpg", b"new").unwrap();

        let files = store.files().unwrap();
        let mut names: Vec<&str> = files.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, vec!["clip.partial", "new.jpg"]);
        assert!(dir.path().join(STAGING_DIR).is_dir());
        assert!(!dir.path().join(STAGING_DIR).join("new.jpg").exists());
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.write("../escape.jpg", b"x").unwrap_err();
        assert!(!err.is_recoverable());
        assert!(store.write("", b"x").is_err());
    }
}
