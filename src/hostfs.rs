//! Host file-system access: volume and special-path discovery, directory
//! listing, stat and removal.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// A labelled location offered to the Switch (a drive or a special path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub label: String,
    pub path: String,
}

impl PathEntry {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        PathEntry {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Build a drive entry, labelling `/` as "Root" and anything else by its last component.
    pub fn drive(path: &Path) -> Self {
        let path_str = path.to_string_lossy().into_owned();
        let label = if path == Path::new("/") {
            "Root".to_string()
        } else {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_str.replace('/', ""))
        };
        PathEntry::new(label, path_str)
    }
}

/// Drives and special paths, enumerated once and kept stable for a session.
#[derive(Debug, Clone, Default)]
pub struct HostCatalog {
    pub drives: Vec<PathEntry>,
    pub special_paths: Vec<PathEntry>,
}

impl HostCatalog {
    /// Enumerate the root volume, mounted removable volumes and the user's Home/Downloads.
    pub fn discover() -> Self {
        let mut drives = vec![PathEntry::drive(Path::new("/"))];
        drives.extend(mounted_volumes().iter().map(|p| PathEntry::drive(p)));

        let mut special_paths = Vec::new();
        if let Some(home) = env::var_os("HOME").map(PathBuf::from) {
            special_paths.push(PathEntry::new("Home", home.to_string_lossy()));
            let downloads = home.join("Downloads");
            if downloads.is_dir() {
                special_paths.push(PathEntry::new("Downloads", downloads.to_string_lossy()));
            }
        }

        log::debug!(
            "catalog: {} drives, {} special paths",
            drives.len(),
            special_paths.len()
        );
        HostCatalog {
            drives,
            special_paths,
        }
    }

    pub fn add_special_path(&mut self, entry: PathEntry) {
        self.special_paths.push(entry);
    }
}

// Every visible entry of /Volumes is a mount point.
#[cfg(target_os = "macos")]
fn mounted_volumes() -> Vec<PathBuf> {
    visible_subdirectories(Path::new("/Volumes"))
}

#[cfg(not(target_os = "macos"))]
fn mounted_volumes() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/media"), PathBuf::from("/mnt")];
    if let Some(user) = env::var_os("USER") {
        roots.push(Path::new("/run/media").join(user));
    }
    match fs::read_to_string("/proc/self/mounts") {
        Ok(table) => mount_points_under(&table, &roots),
        Err(e) => {
            log::debug!("reading mount table failed: {}", e);
            Vec::new()
        }
    }
}

/// Mount points from a `/proc/self/mounts` table that sit below one of `roots`,
/// in mount order, each listed once.
#[cfg_attr(target_os = "macos", allow(dead_code))]
fn mount_points_under(table: &str, roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut points: Vec<PathBuf> = Vec::new();
    for line in table.lines() {
        let Some(raw) = line.split_whitespace().nth(1) else {
            continue;
        };
        let point = PathBuf::from(unescape_mount_field(raw));
        let below_root = roots.iter().any(|r| point.starts_with(r) && point != *r);
        if below_root && !points.contains(&point) {
            points.push(point);
        }
    }
    points
}

/// Undo the kernel's octal escaping of whitespace and backslashes (`\040` is a space).
#[cfg_attr(target_os = "macos", allow(dead_code))]
fn unescape_mount_field(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes.get(i + 1..i + 4).filter(|d| {
            bytes[i] == b'\\' && d.iter().all(|b| (b'0'..=b'7').contains(b))
        });
        match escape {
            Some(d) => {
                let value = d.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                out.push(value as u8);
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Turn a wire path into a host location.
///
/// Literal spaces are escaped and the whole string is then percent-decoded, so
/// an already-escaped name such as `a%20b` resolves to `a b`.
pub fn resolve_location(path: &str) -> PathBuf {
    let escaped = path.replace(' ', "%20");
    PathBuf::from(percent_decode_str(&escaped).decode_utf8_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Immediate, non-hidden children of `dir`, sorted by name.
/// Anything that is not a readable directory lists as empty.
fn visible_children(dir: &Path) -> Vec<(PathBuf, bool)> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            log::debug!("list {} failed: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut entries: Vec<(PathBuf, bool)> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| !is_hidden(&e.file_name().to_string_lossy()))
        .map(|e| {
            let path = e.path();
            // Follow symlinks so a link to a directory lists as a directory.
            let is_dir = path.is_dir();
            (path, is_dir)
        })
        .collect();
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    entries
}

pub fn visible_subdirectories(dir: &Path) -> Vec<PathBuf> {
    visible_children(dir)
        .into_iter()
        .filter_map(|(p, is_dir)| is_dir.then_some(p))
        .collect()
}

pub fn visible_files(dir: &Path) -> Vec<PathBuf> {
    visible_children(dir)
        .into_iter()
        .filter_map(|(p, is_dir)| (!is_dir).then_some(p))
        .collect()
}

/// Last path component as sent back to the Switch.
pub fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Stat / remove
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File { size: u64 },
    Directory,
}

pub fn stat(path: &Path) -> io::Result<PathKind> {
    let meta = fs::metadata(path)?;
    Ok(if meta.is_dir() {
        PathKind::Directory
    } else {
        PathKind::File { size: meta.len() }
    })
}

/// Remove a file, or a directory together with its contents.
pub fn remove(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
