use crate::error::Error;

/// How a buffer is framed on the bulk OUT endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Zero-fill up to the given transfer size.
    Block(usize),
    /// Send as-is. Used for raw file data.
    None,
}

/// Blocking byte transport between the host and the Switch.
pub trait Transport {
    /// Receive up to `max_len` bytes. `Ok(None)` means the peer went away.
    fn read(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, Error>;

    /// Send one buffer in a single transfer.
    fn write_bulk(&mut self, data: &[u8]) -> Result<(), Error>;

    fn send(&mut self, data: &[u8], padding: Padding) -> Result<(), Error> {
        match padding {
            Padding::Block(size) if data.len() < size => {
                let mut padded = Vec::with_capacity(size);
                padded.extend_from_slice(data);
                padded.resize(size, 0);
                self.write_bulk(&padded)
            }
            _ => self.write_bulk(data),
        }
    }
}
