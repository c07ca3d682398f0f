// File system access used by translator discovery and image enumeration
//
// Everything goes through the `DirectoryLister` trait so that repository and
// runner logic can be exercised against an in-memory tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{Result, TransError};

/// Read-only view of a directory tree
pub trait DirectoryLister: Send + Sync {
    /// Regular files below `dir`, sorted; only direct children unless `recursive`.
    ///
    /// Fails when `dir` itself cannot be read.
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Modification time, `None` when the file does not exist
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    fn exists(&self, path: &Path) -> bool {
        self.modified(path).is_some()
    }
}

/// The real file system, walked with `walkdir`
#[derive(Debug, Default, Clone, Copy)]
pub struct OsDirectoryLister;

impl DirectoryLister for OsDirectoryLister {
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        // Surface an unreadable root as an error instead of an empty listing
        fs::read_dir(dir)?;

        let mut walker = WalkDir::new(dir).follow_links(true).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(directory = %dir.display(), error = %e, "Skipping unreadable entry");
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(TransError::Io)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

/// In-memory directory tree for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectoryLister {
    files: BTreeMap<PathBuf, (String, SystemTime)>,
    directories: BTreeSet<PathBuf>,
}

impl MemoryDirectoryLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.with_file_modified(path, content, SystemTime::now())
    }

    pub fn with_file_modified(
        mut self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        modified: SystemTime,
    ) -> Self {
        let path = path.into();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            self.directories.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        self.files.insert(path, (content.into(), modified));
        self
    }

    /// Register a directory that holds no files
    pub fn with_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directories.insert(path.into());
        self
    }
}

impl DirectoryLister for MemoryDirectoryLister {
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !self.directories.contains(dir) {
            return Err(TransError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            )));
        }
        Ok(self
            .files
            .keys()
            .filter(|path| {
                if recursive {
                    path.starts_with(dir)
                } else {
                    path.parent() == Some(dir)
                }
            })
            .cloned()
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| {
                TransError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such file: {}", path.display()),
                ))
            })
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.files.get(path).map(|(_, modified)| *modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_os_lister_recursion() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("top.svg"), "<svg/>").unwrap();
        fs::write(temp_dir.path().join("nested/deep.svg"), "<svg/>").unwrap();

        let lister = OsDirectoryLister;
        let flat = lister.list_files(temp_dir.path(), false).unwrap();
        assert_eq!(flat, vec![temp_dir.path().join("top.svg")]);

        let deep = lister.list_files(temp_dir.path(), true).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep.contains(&temp_dir.path().join("nested/deep.svg")));
    }

    #[test]
    fn test_os_lister_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(OsDirectoryLister.list_files(&missing, true).is_err());
        assert!(!OsDirectoryLister.exists(&missing));
    }

    #[test]
    fn test_memory_lister() {
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let lister = MemoryDirectoryLister::new()
            .with_file("/doc/a.svg", "a")
            .with_file_modified("/doc/img/b.svg", "b", old)
            .with_directory("/empty");

        assert_eq!(
            lister.list_files(Path::new("/doc"), false).unwrap(),
            vec![PathBuf::from("/doc/a.svg")]
        );
        assert_eq!(lister.list_files(Path::new("/doc"), true).unwrap().len(), 2);
        assert!(lister.list_files(Path::new("/empty"), true).unwrap().is_empty());
        assert!(lister.list_files(Path::new("/nowhere"), true).is_err());
        assert_eq!(lister.modified(Path::new("/doc/img/b.svg")), Some(old));
        assert_eq!(lister.read_to_string(Path::new("/doc/a.svg")).unwrap(), "a");
    }
}
