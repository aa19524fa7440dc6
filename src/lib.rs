//! Host side of the Goldleaf USB file protocol.
//!
//! Lets Goldleaf on a Switch browse and read the host file system over USB bulk transfers.

pub mod cache;
pub mod codec;
pub mod error;
pub mod hostfs;
pub mod mapped;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod usb;

pub use error::Error;
pub use hostfs::{HostCatalog, PathEntry};
pub use session::{ExitReason, Session, SessionConfig};
pub use transport::{Padding, Transport};
pub use usb::SwitchUsb;
