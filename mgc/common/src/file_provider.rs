//! The [`FileProvider`] trait, used by the compile config to resolve
//! `open` imports.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

pub trait FileProvider {
    /// Gets the contents of the file with the specified name
    fn read_file(&self, name: &str) -> Option<Box<str>>;
}

/// A [`FileProvider`] implementation that reads files from the file system
#[derive(Debug, Default)]
pub struct FsFileProvider {
    pub root: PathBuf,
}

impl FsFileProvider {
    pub fn new(root: PathBuf) -> Self {
        FsFileProvider { root }
    }
}

impl FileProvider for FsFileProvider {
    fn read_file(&self, name: &str) -> Option<Box<str>> {
        let path = self.root.join(name);
        std::fs::read_to_string(path)
            .ok()
            .map(|string| string.into())
    }
}

/// A [`FileProvider`] implementation backed by an in-memory pool of files
#[derive(Debug, Default)]
pub struct MemoryFileProvider {
    files: FxHashMap<Box<str>, Box<str>>,
}

impl MemoryFileProvider {
    pub fn add_file(&mut self, path: impl Into<Box<str>>, content: impl Into<Box<str>>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileProvider for MemoryFileProvider {
    fn read_file(&self, name: &str) -> Option<Box<str>> {
        self.files.get(name).cloned()
    }
}
