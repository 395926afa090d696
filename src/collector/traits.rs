//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the collector scan and read a real textfile
//! directory in production while tests run against an in-memory mock.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Abstraction for the filesystem operations a collection cycle needs.
pub trait FileSystem: Send + Sync {
    /// Lists entries in a directory.
    ///
    /// # Arguments
    /// * `path` - Path to the directory
    ///
    /// # Returns
    /// A vector of paths to entries in the directory, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Opens a file for reading as a byte stream.
    ///
    /// The returned reader owns the underlying handle; dropping it closes
    /// the file.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Returns a file's last-modification time.
    fn mtime(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn mtime(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}
