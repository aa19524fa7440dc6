use std::path::{Path, PathBuf};

use crate::hostfs;

/// Listing snapshot backing the count-then-index commands.
///
/// Subdirectories and files are refreshed independently, so after a count for
/// one base and a count of the other kind for a different base the two halves
/// describe different directories.
#[derive(Debug, Default)]
pub struct EnumerationCache {
    subdirectories: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl EnumerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the subdirectory snapshot with the listing of `base`.
    pub fn refresh_subdirectories(&mut self, base: &Path) -> usize {
        self.subdirectories = hostfs::visible_subdirectories(base);
        self.subdirectories.len()
    }

    /// Replace the file snapshot with the listing of `base`.
    pub fn refresh_files(&mut self, base: &Path) -> usize {
        self.files = hostfs::visible_files(base);
        self.files.len()
    }

    pub fn subdirectory_at(&self, index: i32) -> Option<&Path> {
        lookup(&self.subdirectories, index)
    }

    pub fn file_at(&self, index: i32) -> Option<&Path> {
        lookup(&self.files, index)
    }
}

fn lookup(entries: &[PathBuf], index: i32) -> Option<&Path> {
    let index = usize::try_from(index).ok()?;
    entries.get(index).map(PathBuf::as_path)
}
