//! In-memory mock filesystem for testing the collector without real files.
//!
//! `MockFs` simulates a textfile directory in memory, so collection-cycle
//! tests can run without touching disk and can simulate failure modes
//! (unreadable files, missing directories) deterministically.

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::collector::traits::FileSystem;

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, Vec<u8>>,
    /// Map from path to modification time (UNIX_EPOCH when unset).
    mtimes: HashMap<PathBuf, SystemTime>,
    /// Files that appear in directory listings but fail to open.
    unreadable: HashSet<PathBuf>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds a file with the given content and modification time expressed
    /// as whole seconds since the Unix epoch.
    pub fn add_file_with_mtime(
        &mut self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        mtime_secs: u64,
    ) {
        let path = path.as_ref().to_path_buf();
        self.add_file(&path, content);
        self.mtimes
            .insert(path, UNIX_EPOCH + Duration::from_secs(mtime_secs));
    }

    /// Adds a file that is listed by `read_dir` but fails to open with
    /// `PermissionDenied`. Its mtime is still readable.
    pub fn add_unreadable_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.unreadable.insert(path);
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    fn is_known_file(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.unreadable.contains(path)
    }
}

impl FileSystem for MockFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();
        for file_path in self.files.keys().chain(self.unreadable.iter()) {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }
        for dir_path in &self.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        if self.unreadable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        match self.files.get(path) {
            Some(content) => Ok(Box::new(Cursor::new(content.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )),
        }
    }

    fn mtime(&self, path: &Path) -> io::Result<SystemTime> {
        if !self.is_known_file(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            ));
        }
        Ok(self.mtimes.get(path).copied().unwrap_or(UNIX_EPOCH))
    }
}
