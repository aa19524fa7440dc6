//! Goldleaf command dispatcher.
//!
//! One [`Session`] serves one connection: it reads a frame, runs the command
//! against the host file system and its two caches, and writes the response
//! before reading the next frame.

use std::path::Path;

use crate::cache::EnumerationCache;
use crate::codec::{self, FrameReader};
use crate::error::Error;
use crate::hostfs::{self, HostCatalog, PathEntry, PathKind};
use crate::mapped::MappedFileCache;
use crate::protocol::*;
use crate::transport::{Padding, Transport};

/// Why a session loop stopped.
#[derive(Debug)]
pub enum ExitReason {
    /// The Switch went away. Normal end of a session.
    Disconnected,
    /// A framing error, an unsupported command or a transport failure.
    Aborted(Error),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transfer size responses are padded to.
    pub block_size: usize,
    pub catalog: HostCatalog,
}

impl SessionConfig {
    pub fn new(catalog: HostCatalog) -> Self {
        SessionConfig {
            block_size: BLOCK_SIZE,
            catalog,
        }
    }
}

/// What to put on the wire for one command.
enum Reply {
    Frame(Vec<u8>),
    /// Padded header, then `[offset, offset + length)` of the mapped file
    /// unpadded as a second transfer, borrowed from the mapping.
    MappedRange {
        header: Vec<u8>,
        offset: i64,
        length: i64,
    },
}

pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    enumeration: EnumerationCache,
    mapped: MappedFileCache,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Session {
            transport,
            config,
            enumeration: EnumerationCache::new(),
            mapped: MappedFileCache::new(),
        }
    }

    /// Serve frames until the Switch disconnects or the session has to be aborted.
    ///
    /// The mapped file is released on every exit path.
    pub fn run(&mut self) -> ExitReason {
        log::info!("session started");
        let reason = loop {
            match self.serve_one() {
                Ok(true) => continue,
                Ok(false) => break ExitReason::Disconnected,
                Err(e) => break ExitReason::Aborted(e),
            }
        };
        self.mapped.release();

        match &reason {
            ExitReason::Disconnected => log::info!("session ended: Switch disconnected"),
            ExitReason::Aborted(e) => log::error!("session aborted: {}", e),
        }
        reason
    }

    /// Read and answer one frame. Returns `false` once the transport reports disconnect.
    fn serve_one(&mut self) -> Result<bool, Error> {
        let frame = match self.transport.read(self.config.block_size)? {
            Some(frame) => frame,
            None => return Ok(false),
        };

        let padding = Padding::Block(self.config.block_size);
        match self.handle_frame(&frame)? {
            Reply::Frame(resp) => self.transport.send(&resp, padding)?,
            Reply::MappedRange {
                header,
                offset,
                length,
            } => {
                self.transport.send(&header, padding)?;
                let payload = self.mapped.current_slice(offset, length)?;
                self.transport.send(payload, Padding::None)?;
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Top-level dispatch
    // -----------------------------------------------------------------------

    fn handle_frame(&mut self, frame: &[u8]) -> Result<Reply, Error> {
        let mut r = FrameReader::new(frame);
        r.read_magic()?;
        let cmd = r.read_command()?;
        log::debug!("{} ({} argument bytes)", cmd.name(), r.remaining());

        let resp = match cmd {
            Command::GetDriveCount => self.handle_drive_count(),
            Command::GetDriveInfo => self.handle_drive_info(&mut r)?,
            Command::GetSpecialPathCount => self.handle_special_path_count(),
            Command::GetSpecialPath => self.handle_special_path(&mut r)?,
            Command::GetDirectoryCount => self.handle_directory_count(&mut r)?,
            Command::GetDirectory => self.handle_directory(&mut r)?,
            Command::GetFileCount => self.handle_file_count(&mut r)?,
            Command::GetFile => self.handle_file(&mut r)?,
            Command::StatPath => self.handle_stat_path(&mut r)?,
            Command::ReadFile => return self.handle_read_file(&mut r),
            Command::Delete => self.handle_delete(&mut r)?,
            other => return Err(Error::UnsupportedCommand(other)),
        };
        Ok(Reply::Frame(resp))
    }

    // -----------------------------------------------------------------------
    // Drives / special paths
    // -----------------------------------------------------------------------

    fn handle_drive_count(&self) -> Vec<u8> {
        let count = self.config.catalog.drives.len();
        log::debug!("  -> {} drives", count);
        count_response(count)
    }

    // Resp: label, path, i32 0, i32 0
    fn handle_drive_info(&self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let index = r.read_i32()?;
        let Some(drive) = entry_at(&self.config.catalog.drives, index) else {
            log::warn!("GetDriveInfo index {} out of range", index);
            return Ok(failure_response());
        };
        log::debug!("  -> {} ({})", drive.label, drive.path);

        let mut resp = success_response();
        codec::write_string(&mut resp, &drive.label);
        codec::write_string(&mut resp, &drive.path);
        codec::write_i32(&mut resp, 0);
        codec::write_i32(&mut resp, 0);
        Ok(resp)
    }

    fn handle_special_path_count(&self) -> Vec<u8> {
        let count = self.config.catalog.special_paths.len();
        log::debug!("  -> {} special paths", count);
        count_response(count)
    }

    // Resp: label, path
    fn handle_special_path(&self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let index = r.read_i32()?;
        let Some(entry) = entry_at(&self.config.catalog.special_paths, index) else {
            log::warn!("GetSpecialPath index {} out of range", index);
            return Ok(failure_response());
        };
        log::debug!("  -> {} ({})", entry.label, entry.path);

        let mut resp = success_response();
        codec::write_string(&mut resp, &entry.label);
        codec::write_string(&mut resp, &entry.path);
        Ok(resp)
    }

    // -----------------------------------------------------------------------
    // Listings: a count call snapshots, index calls read the snapshot.
    // The base path is re-sent with every index call and ignored.
    // -----------------------------------------------------------------------

    fn handle_directory_count(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let base = r.read_string()?;
        let count = self
            .enumeration
            .refresh_subdirectories(&hostfs::resolve_location(&base));
        log::debug!("  {} -> {} subdirectories", base, count);
        Ok(count_response(count))
    }

    fn handle_directory(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let _base = r.read_string()?;
        let index = r.read_i32()?;
        Ok(name_response(self.enumeration.subdirectory_at(index), "GetDirectory", index))
    }

    fn handle_file_count(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let base = r.read_string()?;
        let count = self
            .enumeration
            .refresh_files(&hostfs::resolve_location(&base));
        log::debug!("  {} -> {} files", base, count);
        Ok(count_response(count))
    }

    fn handle_file(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let _base = r.read_string()?;
        let index = r.read_i32()?;
        Ok(name_response(self.enumeration.file_at(index), "GetFile", index))
    }

    // -----------------------------------------------------------------------
    // StatPath
    // Resp: i32 kind, i64 size
    // -----------------------------------------------------------------------

    fn handle_stat_path(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let path = r.read_string()?;
        let location = hostfs::resolve_location(&path);

        let (kind, size) = match hostfs::stat(&location) {
            Ok(PathKind::Directory) => (KIND_DIRECTORY, 0),
            Ok(PathKind::File { size }) => (KIND_FILE, size as i64),
            Err(e) => {
                log::warn!("StatPath {} failed: {}", location.display(), e);
                return Ok(failure_response());
            }
        };
        log::debug!("  {} -> kind {} size {}", path, kind, size);

        let mut resp = success_response();
        codec::write_i32(&mut resp, kind);
        codec::write_i64(&mut resp, size);
        Ok(resp)
    }

    // -----------------------------------------------------------------------
    // ReadFile
    // Args: path, i64 offset, i64 length
    // Resp: i64 byte count, then the bytes as a separate unpadded transfer
    // -----------------------------------------------------------------------

    fn handle_read_file(&mut self, r: &mut FrameReader<'_>) -> Result<Reply, Error> {
        let path = r.read_string()?;
        let offset = r.read_i64()?;
        let length = r.read_i64()?;
        let location = hostfs::resolve_location(&path);
        log::debug!("  {} offset {} length {}", path, offset, length);

        // Range is checked here; the bytes are borrowed again at send time.
        let checked = self
            .mapped
            .ensure_mapped(&location)
            .and_then(|m| m.slice(offset, length).map(<[u8]>::len));

        match checked {
            Ok(len) => {
                let mut header = success_response();
                codec::write_i64(&mut header, len as i64);
                Ok(Reply::MappedRange {
                    header,
                    offset,
                    length,
                })
            }
            Err(e) => {
                log::warn!("ReadFile {} failed: {}", location.display(), e);
                Ok(Reply::Frame(failure_response()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Delete
    // Args: i32 (unused), path
    // -----------------------------------------------------------------------

    fn handle_delete(&mut self, r: &mut FrameReader<'_>) -> Result<Vec<u8>, Error> {
        let _unused = r.read_i32()?;
        let path = r.read_string()?;
        log::info!("Delete {}", path);

        match hostfs::remove(Path::new(&path)) {
            Ok(()) => Ok(success_response()),
            Err(e) => {
                log::warn!("Delete {} failed: {}", path, e);
                Ok(failure_response())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response builders
// ---------------------------------------------------------------------------

fn success_response() -> Vec<u8> {
    let mut resp = Vec::with_capacity(64);
    codec::write_response_header(&mut resp, RESULT_SUCCESS);
    resp
}

fn failure_response() -> Vec<u8> {
    let mut resp = Vec::with_capacity(8);
    codec::write_response_header(&mut resp, RESULT_FAILURE);
    resp
}

fn count_response(count: usize) -> Vec<u8> {
    let mut resp = success_response();
    codec::write_i32(&mut resp, i32::try_from(count).unwrap_or(i32::MAX));
    resp
}

fn name_response(entry: Option<&Path>, what: &str, index: i32) -> Vec<u8> {
    match entry {
        Some(path) => {
            let name = hostfs::entry_name(path);
            log::debug!("  [{}] -> {}", index, name);
            let mut resp = success_response();
            codec::write_string(&mut resp, &name);
            resp
        }
        None => {
            log::warn!("{} index {} outside the cached listing", what, index);
            failure_response()
        }
    }
}

fn entry_at(entries: &[PathEntry], index: i32) -> Option<&PathEntry> {
    usize::try_from(index).ok().and_then(|i| entries.get(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::TempDir;

    /// In-memory transport: replays queued frames, then reports disconnect.
    #[derive(Default)]
    struct ScriptedTransport {
        inbound: VecDeque<Vec<u8>>,
        writes: Vec<Vec<u8>>,
        fail_writes: bool,
        // Once this many writes succeeded, the next one only takes half its bytes.
        short_write_after: Option<usize>,
    }

    impl Transport for ScriptedTransport {
        fn read(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, Error> {
            Ok(self.inbound.pop_front().map(|mut f| {
                f.truncate(max_len);
                f
            }))
        }

        fn write_bulk(&mut self, data: &[u8]) -> Result<(), Error> {
            if self.fail_writes {
                return Err(Error::UsbIo(rusb::Error::NoDevice));
            }
            if self.short_write_after == Some(self.writes.len()) {
                return Err(Error::ShortWrite {
                    written: data.len() / 2,
                    expected: data.len(),
                });
            }
            self.writes.push(data.to_vec());
            Ok(())
        }
    }

    fn frame(cmd: Command, args: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut buf = INPUT_MAGIC.to_vec();
        codec::write_i32(&mut buf, cmd.id());
        args(&mut buf);
        // The Switch pads its frames to a full block too.
        buf.resize(BLOCK_SIZE, 0);
        buf
    }

    fn path_arg(path: &Path) -> impl FnOnce(&mut Vec<u8>) + '_ {
        move |b: &mut Vec<u8>| codec::write_string(b, &path.to_string_lossy())
    }

    fn indexed(path: &Path, index: i32) -> impl FnOnce(&mut Vec<u8>) + '_ {
        move |b: &mut Vec<u8>| {
            codec::write_string(b, &path.to_string_lossy());
            codec::write_i32(b, index);
        }
    }

    fn session(temp: &TempDir, frames: Vec<Vec<u8>>) -> Session<ScriptedTransport> {
        let catalog = HostCatalog {
            drives: vec![PathEntry::new("Root", "/")],
            special_paths: vec![PathEntry::new(
                "Downloads",
                temp.path().to_string_lossy(),
            )],
        };
        let transport = ScriptedTransport {
            inbound: frames.into(),
            ..Default::default()
        };
        Session::new(transport, SessionConfig::new(catalog))
    }

    /// Check the envelope and return a reader positioned after the result code.
    fn open_response(buf: &[u8]) -> (i32, FrameReader<'_>) {
        assert_eq!(&buf[..4], &OUTPUT_MAGIC);
        let mut r = FrameReader::new(&buf[4..]);
        let code = r.read_i32().unwrap();
        (code, r)
    }

    fn listing_fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        fs::create_dir(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("c.txt"), b"hello").unwrap();
        temp
    }

    #[test]
    fn every_response_is_a_padded_envelope() {
        let temp = listing_fixture();
        let frames = vec![
            frame(Command::GetDriveCount, |_| {}),
            frame(Command::GetSpecialPathCount, |_| {}),
            frame(Command::StatPath, path_arg(temp.path())),
        ];
        let mut s = session(&temp, frames);
        assert!(matches!(s.run(), ExitReason::Disconnected));

        assert_eq!(s.transport.writes.len(), 3);
        for w in &s.transport.writes {
            assert_eq!(w.len(), BLOCK_SIZE);
            let (code, _) = open_response(w);
            assert_eq!(code, RESULT_SUCCESS);
        }
    }

    #[test]
    fn drive_and_special_path_lookup() {
        let temp = TempDir::new().unwrap();
        let frames = vec![
            frame(Command::GetDriveCount, |_| {}),
            frame(Command::GetDriveInfo, |b| codec::write_i32(b, 0)),
            frame(Command::GetSpecialPath, |b| codec::write_i32(b, 0)),
        ];
        let mut s = session(&temp, frames);
        s.run();
        let w = &s.transport.writes;

        let (_, mut r) = open_response(&w[0]);
        assert_eq!(r.read_i32().unwrap(), 1);

        let (code, mut r) = open_response(&w[1]);
        assert_eq!(code, RESULT_SUCCESS);
        assert_eq!(r.read_string_with(false).unwrap(), "Root");
        assert_eq!(r.read_string_with(false).unwrap(), "/");
        assert_eq!(r.read_i32().unwrap(), 0);
        assert_eq!(r.read_i32().unwrap(), 0);

        let (_, mut r) = open_response(&w[2]);
        assert_eq!(r.read_string_with(false).unwrap(), "Downloads");
        assert_eq!(
            r.read_string_with(false).unwrap(),
            temp.path().to_string_lossy()
        );
    }

    #[test]
    fn count_then_index_enumerates_in_order() {
        let temp = listing_fixture();
        let frames = vec![
            frame(Command::GetDirectoryCount, path_arg(temp.path())),
            frame(Command::GetDirectory, indexed(temp.path(), 0)),
            frame(Command::GetDirectory, indexed(temp.path(), 1)),
            frame(Command::GetFileCount, path_arg(temp.path())),
            frame(Command::GetFile, indexed(temp.path(), 0)),
        ];
        let mut s = session(&temp, frames);
        s.run();
        let w = &s.transport.writes;

        let (_, mut r) = open_response(&w[0]);
        assert_eq!(r.read_i32().unwrap(), 2);
        let (_, mut r) = open_response(&w[1]);
        assert_eq!(r.read_string().unwrap(), "a");
        let (_, mut r) = open_response(&w[2]);
        assert_eq!(r.read_string().unwrap(), "b");
        let (_, mut r) = open_response(&w[3]);
        assert_eq!(r.read_i32().unwrap(), 1);
        let (_, mut r) = open_response(&w[4]);
        assert_eq!(r.read_string().unwrap(), "c.txt");
    }

    #[test]
    fn newer_count_replaces_snapshot_and_base_on_index_is_ignored() {
        let p1 = listing_fixture();
        let p2 = TempDir::new().unwrap();
        fs::create_dir(p2.path().join("zeta")).unwrap();

        let frames = vec![
            frame(Command::GetDirectoryCount, path_arg(p1.path())),
            frame(Command::GetDirectoryCount, path_arg(p2.path())),
            // Base names p1, but the snapshot belongs to p2.
            frame(Command::GetDirectory, indexed(p1.path(), 0)),
        ];
        let mut s = session(&p1, frames);
        s.run();

        let (_, mut r) = open_response(&s.transport.writes[2]);
        assert_eq!(r.read_string().unwrap(), "zeta");
    }

    #[test]
    fn hardened_out_of_range_index_fails_without_aborting() {
        let temp = listing_fixture();
        let frames = vec![
            frame(Command::GetFileCount, path_arg(temp.path())),
            frame(Command::GetFile, indexed(temp.path(), 5)),
            frame(Command::GetDriveInfo, |b| codec::write_i32(b, -1)),
            frame(Command::GetSpecialPath, |b| codec::write_i32(b, 3)),
            frame(Command::GetDriveCount, |_| {}),
        ];
        let mut s = session(&temp, frames);
        assert!(matches!(s.run(), ExitReason::Disconnected));

        let codes: Vec<i32> = s.transport.writes.iter().map(|w| open_response(w).0).collect();
        assert_eq!(
            codes,
            [RESULT_SUCCESS, RESULT_FAILURE, RESULT_FAILURE, RESULT_FAILURE, RESULT_SUCCESS]
        );
    }

    #[test]
    fn stat_reports_directories_and_files() {
        let temp = listing_fixture();
        let frames = vec![
            frame(Command::StatPath, path_arg(temp.path())),
            frame(Command::StatPath, path_arg(&temp.path().join("c.txt"))),
        ];
        let mut s = session(&temp, frames);
        s.run();
        let w = &s.transport.writes;

        let (_, mut r) = open_response(&w[0]);
        assert_eq!(r.read_i32().unwrap(), KIND_DIRECTORY);
        assert_eq!(r.read_i64().unwrap(), 0);
        let (_, mut r) = open_response(&w[1]);
        assert_eq!(r.read_i32().unwrap(), KIND_FILE);
        assert_eq!(r.read_i64().unwrap(), 5);
    }

    #[test]
    fn hardened_stat_of_missing_path_fails() {
        let temp = listing_fixture();
        let frames = vec![
            frame(Command::StatPath, path_arg(&temp.path().join("missing"))),
            frame(Command::GetDriveCount, |_| {}),
        ];
        let mut s = session(&temp, frames);
        assert!(matches!(s.run(), ExitReason::Disconnected));

        let codes: Vec<i32> = s.transport.writes.iter().map(|w| open_response(w).0).collect();
        assert_eq!(codes, [RESULT_FAILURE, RESULT_SUCCESS]);
    }

    #[test]
    fn stat_resolves_names_with_spaces() {
        let temp = TempDir::new().unwrap();
        let spaced = temp.path().join("My Games");
        fs::write(&spaced, b"abc").unwrap();

        let mut s = session(&temp, vec![frame(Command::StatPath, path_arg(&spaced))]);
        s.run();
        let (code, mut r) = open_response(&s.transport.writes[0]);
        assert_eq!(code, RESULT_SUCCESS);
        assert_eq!(r.read_i32().unwrap(), KIND_FILE);
        assert_eq!(r.read_i64().unwrap(), 3);
    }

    fn read_args(path: &Path, offset: i64, length: i64) -> impl FnOnce(&mut Vec<u8>) + '_ {
        move |b: &mut Vec<u8>| {
            codec::write_string(b, &path.to_string_lossy());
            codec::write_i64(b, offset);
            codec::write_i64(b, length);
        }
    }

    #[test]
    fn read_file_sends_padded_header_then_raw_bytes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("data.bin");
        fs::write(&file, [0u8, 1, 2, 3, 4, 5]).unwrap();

        let mut s = session(&temp, vec![frame(Command::ReadFile, read_args(&file, 2, 3))]);
        s.run();
        let w = &s.transport.writes;

        assert_eq!(w.len(), 2);
        assert_eq!(w[0].len(), BLOCK_SIZE);
        let (code, mut r) = open_response(&w[0]);
        assert_eq!(code, RESULT_SUCCESS);
        assert_eq!(r.read_i64().unwrap(), 3);
        assert_eq!(w[1], vec![2, 3, 4]);
    }

    #[test]
    fn read_file_maps_once_per_path() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.bin");
        let b = temp.path().join("b.bin");
        fs::write(&a, [10u8, 11, 12, 13]).unwrap();
        fs::write(&b, [20u8, 21]).unwrap();

        let frames = vec![
            frame(Command::ReadFile, read_args(&a, 0, 2)),
            frame(Command::ReadFile, read_args(&a, 2, 2)),
        ];
        let mut s = session(&temp, frames);
        s.run();
        assert_eq!(s.mapped.maps_created(), 1);
        assert_eq!(s.transport.writes[1], vec![10, 11]);
        assert_eq!(s.transport.writes[3], vec![12, 13]);

        s.transport.inbound.push_back(frame(Command::ReadFile, read_args(&b, 0, 2)));
        assert!(s.serve_one().unwrap());
        assert_eq!(s.mapped.maps_created(), 2);
        assert_eq!(s.mapped.current_path(), Some(b.as_path()));
        assert_eq!(s.transport.writes[5], vec![20, 21]);
    }

    #[test]
    fn hardened_read_file_failures_get_a_single_failure_frame() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("short.bin");
        fs::write(&file, [1u8, 2]).unwrap();

        let frames = vec![
            frame(Command::ReadFile, read_args(&file, 1, 8)),
            frame(Command::ReadFile, read_args(&temp.path().join("nope"), 0, 1)),
        ];
        let mut s = session(&temp, frames);
        assert!(matches!(s.run(), ExitReason::Disconnected));

        assert_eq!(s.transport.writes.len(), 2);
        assert_eq!(open_response(&s.transport.writes[0]).0, RESULT_FAILURE);
        assert_eq!(open_response(&s.transport.writes[1]).0, RESULT_FAILURE);
    }

    #[test]
    fn delete_reports_success_and_failure() {
        let temp = listing_fixture();
        let target = temp.path().join("c.txt");
        let delete = |path: &Path| {
            let path = path.to_string_lossy().into_owned();
            frame(Command::Delete, move |b| {
                codec::write_i32(b, 0);
                codec::write_string(b, &path);
            })
        };

        let frames = vec![delete(&target), delete(&target), frame(Command::GetDriveCount, |_| {})];
        let mut s = session(&temp, frames);
        assert!(matches!(s.run(), ExitReason::Disconnected));

        assert!(!target.exists());
        let codes: Vec<i32> = s.transport.writes.iter().map(|w| open_response(w).0).collect();
        assert_eq!(codes, [RESULT_SUCCESS, RESULT_FAILURE, RESULT_SUCCESS]);
    }

    #[test]
    fn bad_magic_aborts_without_a_response() {
        let temp = TempDir::new().unwrap();
        let mut bad = frame(Command::GetDriveCount, |_| {});
        bad[..4].copy_from_slice(b"XXXX");

        let mut s = session(&temp, vec![bad, frame(Command::GetDriveCount, |_| {})]);
        match s.run() {
            ExitReason::Aborted(Error::InvalidMagic(m)) => assert_eq!(&m, b"XXXX"),
            other => panic!("expected InvalidMagic abort, got {other:?}"),
        }
        assert!(s.transport.writes.is_empty());
    }

    #[test]
    fn unknown_command_and_short_frames_abort() {
        let temp = TempDir::new().unwrap();
        let mut unknown = INPUT_MAGIC.to_vec();
        codec::write_i32(&mut unknown, 42);
        let mut s = session(&temp, vec![unknown]);
        assert!(matches!(
            s.run(),
            ExitReason::Aborted(Error::UnknownCommand(42))
        ));

        // A bare header with no index argument.
        let mut short = INPUT_MAGIC.to_vec();
        codec::write_i32(&mut short, Command::GetDriveInfo.id());
        let mut s = session(&temp, vec![short]);
        match s.run() {
            ExitReason::Aborted(e) => assert!(e.is_framing()),
            other => panic!("expected framing abort, got {other:?}"),
        }
        assert!(s.transport.writes.is_empty());
    }

    #[test]
    fn unsupported_command_aborts_and_releases_mapping() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, [9u8; 4]).unwrap();

        let frames = vec![
            frame(Command::ReadFile, read_args(&file, 0, 4)),
            frame(Command::WriteFile, |_| {}),
        ];
        let mut s = session(&temp, frames);
        assert!(matches!(
            s.run(),
            ExitReason::Aborted(Error::UnsupportedCommand(Command::WriteFile))
        ));
        assert_eq!(s.transport.writes.len(), 2);
        assert_eq!(s.mapped.current_path(), None);
    }

    #[test]
    fn short_payload_write_aborts_and_releases_mapping() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, [5u8; 16]).unwrap();

        let frames = vec![
            frame(Command::ReadFile, read_args(&file, 0, 16)),
            frame(Command::GetDriveCount, |_| {}),
        ];
        let mut s = session(&temp, frames);
        s.transport.short_write_after = Some(1);
        assert!(matches!(
            s.run(),
            ExitReason::Aborted(Error::ShortWrite {
                written: 8,
                expected: 16
            })
        ));
        assert_eq!(s.transport.writes.len(), 1);
        assert_eq!(s.mapped.current_path(), None);
    }

    #[test]
    fn transport_write_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let mut s = session(&temp, vec![frame(Command::GetDriveCount, |_| {})]);
        s.transport.fail_writes = true;
        assert!(matches!(s.run(), ExitReason::Aborted(Error::UsbIo(_))));
    }
}
