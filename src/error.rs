use std::fmt;
use std::io;

use crate::protocol::Command;

#[derive(Debug)]
pub enum Error {
    /// No Switch running Goldleaf on the USB bus
    DeviceNotFound,
    /// USB open/configure/claim error
    UsbOpen(rusb::Error),
    /// USB I/O error during a transfer
    UsbIo(rusb::Error),
    /// Bulk OUT transfer accepted fewer bytes than were sent
    ShortWrite { written: usize, expected: usize },
    /// Frame ended before a field could be decoded
    ShortRead { needed: usize, remaining: usize },
    /// First four bytes of a frame were not the client magic
    InvalidMagic([u8; 4]),
    /// Command id outside the known set
    UnknownCommand(i32),
    /// String field with a negative length or invalid UTF-16
    InvalidString(String),
    /// Known command that this host does not serve
    UnsupportedCommand(Command),
    /// Host file-system error
    Io(io::Error),
    /// Byte range outside the mapped file
    OutOfRange { offset: i64, length: i64, size: u64 },
}

impl Error {
    /// Whether this error means the inbound byte stream can no longer be trusted.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::ShortRead { .. }
                | Error::InvalidMagic(_)
                | Error::UnknownCommand(_)
                | Error::InvalidString(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceNotFound => write!(f, "Switch not found (VID:057E PID:3000)"),
            Error::UsbOpen(e) => write!(f, "USB open error: {e}"),
            Error::UsbIo(e) => write!(f, "USB I/O error: {e}"),
            Error::ShortWrite { written, expected } => {
                write!(f, "short USB write: {written} of {expected} bytes")
            }
            Error::ShortRead { needed, remaining } => {
                write!(f, "short frame: needed {needed} bytes, {remaining} remaining")
            }
            Error::InvalidMagic(m) => write!(f, "invalid magic {:02X?}", m),
            Error::UnknownCommand(id) => write!(f, "unknown command id {id}"),
            Error::InvalidString(msg) => write!(f, "invalid string field: {msg}"),
            Error::UnsupportedCommand(cmd) => write!(f, "command {} not supported", cmd.name()),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::OutOfRange {
                offset,
                length,
                size,
            } => write!(
                f,
                "range {offset}+{length} outside file of {size} bytes"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UsbOpen(e) | Error::UsbIo(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
