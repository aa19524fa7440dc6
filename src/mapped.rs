use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::Error;

/// A read-only mapping of one whole file. Unmapped on drop.
pub struct MappedFile {
    path: PathBuf,
    // Empty files cannot be mapped; they carry no mapping at all.
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only and private to this process. A
            // concurrent truncation by another process is outside our control,
            // same as with any reader of a shared file.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(MappedFile {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Borrow `[offset, offset + length)` straight from the mapping.
    pub fn slice(&self, offset: i64, length: i64) -> Result<&[u8], Error> {
        let bytes = self.bytes();
        let out_of_range = || Error::OutOfRange {
            offset,
            length,
            size: bytes.len() as u64,
        };
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let len = usize::try_from(length).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        bytes.get(start..end).ok_or_else(out_of_range)
    }
}

/// Single-slot cache holding the file the Switch is currently reading.
#[derive(Default)]
pub struct MappedFileCache {
    current: Option<MappedFile>,
    maps_created: u64,
}

impl MappedFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mapping for `path`, replacing the cached one if it names a different file.
    pub fn ensure_mapped(&mut self, path: &Path) -> Result<&MappedFile, Error> {
        let mapped = match self.current.take() {
            Some(m) if m.path() == path => m,
            old => {
                // The old mapping is gone before the next one is created.
                if let Some(old) = old {
                    log::debug!("unmapping {}", old.path().display());
                }
                let m = MappedFile::open(path)?;
                log::debug!("mapped {} ({} bytes)", path.display(), m.bytes().len());
                self.maps_created += 1;
                m
            }
        };
        Ok(&*self.current.insert(mapped))
    }

    /// Borrow a range of the cached mapping. With nothing mapped every
    /// non-empty range is out of range.
    pub fn current_slice(&self, offset: i64, length: i64) -> Result<&[u8], Error> {
        match &self.current {
            Some(mapped) => mapped.slice(offset, length),
            None if offset == 0 && length == 0 => Ok(&[]),
            None => Err(Error::OutOfRange {
                offset,
                length,
                size: 0,
            }),
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(MappedFile::path)
    }

    /// Number of mappings created over the cache's lifetime.
    pub fn maps_created(&self) -> u64 {
        self.maps_created
    }

    pub fn release(&mut self) {
        self.current = None;
    }
}
