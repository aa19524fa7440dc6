use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::error::Error;
use crate::transport::Transport;

const SWITCH_VID: u16 = 0x057E;
const SWITCH_PID: u16 = 0x3000;

const EP_IN: u8 = 0x81; // Bulk IN  (Switch -> Host)
const EP_OUT: u8 = 0x01; // Bulk OUT (Host -> Switch)

const INTERFACE: u8 = 0;
const CONFIGURATION: u8 = 1;

pub struct SwitchUsb {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl SwitchUsb {
    /// Scan the USB bus for a Switch running Goldleaf, configure it and claim the interface.
    ///
    /// A zero `timeout` makes every transfer wait indefinitely.
    pub fn open(timeout: Duration) -> Result<Self, Error> {
        let ctx = Context::new().map_err(Error::UsbOpen)?;

        let device = ctx
            .devices()
            .map_err(Error::UsbOpen)?
            .iter()
            .find(|dev| {
                dev.device_descriptor()
                    .map(|d| d.vendor_id() == SWITCH_VID && d.product_id() == SWITCH_PID)
                    .unwrap_or(false)
            })
            .ok_or(Error::DeviceNotFound)?;

        let mut handle = device.open().map_err(Error::UsbOpen)?;

        // Ignore errors on platforms without kernel driver detach.
        let _ = handle.set_auto_detach_kernel_driver(true);

        handle
            .set_active_configuration(CONFIGURATION)
            .map_err(Error::UsbOpen)?;
        handle
            .claim_interface(INTERFACE)
            .map_err(Error::UsbOpen)?;

        log::info!(
            "Opened Switch (bus {:03} dev {:03})",
            device.bus_number(),
            device.address()
        );

        Ok(SwitchUsb { handle, timeout })
    }
}

impl Transport for SwitchUsb {
    fn read(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, Error> {
        let mut buf = vec![0u8; max_len];
        loop {
            match self.handle.read_bulk(EP_IN, &mut buf, self.timeout) {
                Ok(n) => {
                    buf.truncate(n);
                    log::trace!("EP_IN read {} bytes: {:02X?}", n, &buf[..n.min(32)]);
                    return Ok(Some(buf));
                }
                Err(rusb::Error::Timeout) => continue,
                Err(rusb::Error::NoDevice | rusb::Error::Io | rusb::Error::Pipe) => {
                    log::debug!("EP_IN read ended: device gone");
                    return Ok(None);
                }
                Err(e) => return Err(Error::UsbIo(e)),
            }
        }
    }

    fn write_bulk(&mut self, data: &[u8]) -> Result<(), Error> {
        let n = self
            .handle
            .write_bulk(EP_OUT, data, self.timeout)
            .map_err(Error::UsbIo)?;
        check_full_write(n, data.len())
    }
}

/// A partial transfer leaves the Switch waiting for bytes that never come.
fn check_full_write(written: usize, expected: usize) -> Result<(), Error> {
    if written != expected {
        log::error!("EP_OUT short write: {} of {} bytes", written, expected);
        return Err(Error::ShortWrite { written, expected });
    }
    Ok(())
}

impl Drop for SwitchUsb {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(INTERFACE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_bulk_write_is_an_error() {
        assert!(check_full_write(4096, 4096).is_ok());
        assert!(check_full_write(0, 0).is_ok());
        assert!(matches!(
            check_full_write(512, 4096),
            Err(Error::ShortWrite {
                written: 512,
                expected: 4096
            })
        ));
    }
}
