/// Magic tags — first 4 bytes of every frame identify its direction.
pub const INPUT_MAGIC: [u8; 4] = *b"GLCI"; // Switch -> Host
pub const OUTPUT_MAGIC: [u8; 4] = *b"GLCO"; // Host -> Switch

/// Size of one bulk transfer. Every response except raw file data is padded to it.
pub const BLOCK_SIZE: usize = 0x1000;

/// Result codes carried in the response envelope.
pub const RESULT_SUCCESS: i32 = 0;
pub const RESULT_FAILURE: i32 = 1;

/// Entry kinds reported by `StatPath`.
pub const KIND_FILE: i32 = 1;
pub const KIND_DIRECTORY: i32 = 2;

/// Goldleaf command IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Command {
    /// Reserved sentinel, never valid on the wire.
    Invalid = -1,
    GetDriveCount = 0,
    GetDriveInfo = 1,
    StatPath = 2,
    GetFileCount = 3,
    GetFile = 4,
    GetDirectoryCount = 5,
    GetDirectory = 6,
    ReadFile = 7,
    WriteFile = 8,
    Create = 9,
    Delete = 10,
    Rename = 11,
    GetSpecialPathCount = 12,
    GetSpecialPath = 13,
    SelectFile = 14,
    Startup = 15,
}

impl Command {
    /// Map a wire id onto the command set. `-1` and anything outside 0..=15 is rejected.
    pub fn from_id(id: i32) -> Option<Self> {
        let cmd = match id {
            0 => Command::GetDriveCount,
            1 => Command::GetDriveInfo,
            2 => Command::StatPath,
            3 => Command::GetFileCount,
            4 => Command::GetFile,
            5 => Command::GetDirectoryCount,
            6 => Command::GetDirectory,
            7 => Command::ReadFile,
            8 => Command::WriteFile,
            9 => Command::Create,
            10 => Command::Delete,
            11 => Command::Rename,
            12 => Command::GetSpecialPathCount,
            13 => Command::GetSpecialPath,
            14 => Command::SelectFile,
            15 => Command::Startup,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn id(self) -> i32 {
        self as i32
    }

    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Command::Invalid => "Invalid",
            Command::GetDriveCount => "GetDriveCount",
            Command::GetDriveInfo => "GetDriveInfo",
            Command::StatPath => "StatPath",
            Command::GetFileCount => "GetFileCount",
            Command::GetFile => "GetFile",
            Command::GetDirectoryCount => "GetDirectoryCount",
            Command::GetDirectory => "GetDirectory",
            Command::ReadFile => "ReadFile",
            Command::WriteFile => "WriteFile",
            Command::Create => "Create",
            Command::Delete => "Delete",
            Command::Rename => "Rename",
            Command::GetSpecialPathCount => "GetSpecialPathCount",
            Command::GetSpecialPath => "GetSpecialPath",
            Command::SelectFile => "SelectFile",
            Command::Startup => "Startup",
        }
    }
}
