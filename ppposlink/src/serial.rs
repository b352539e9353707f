//! Serial output contract and real-port helpers.

use std::io;
use std::time::Duration;

use crate::error::LinkError;

/// Byte sink for framed output.
///
/// One operation, mirroring a raw serial driver: write up to `buf.len()`
/// octets and report how many were accepted. The framer treats anything
/// short as a hard failure and drops the rest of the frame.
pub trait SerialTx: Send {
    fn sio_write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<T: io::Write + Send> SerialTx for T {
    fn sio_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }
}

/// Serial ports visible on this system.
pub fn available_ports() -> impl Iterator<Item = String> {
    serialport::available_ports()
        .unwrap_or_else(|_| vec![])
        .into_iter()
        .map(|i| i.port_name)
}

/// Open a port configured for raw PPP byte traffic.
pub fn open_port(name: &str, baud: u32) -> Result<Box<dyn serialport::SerialPort>, LinkError> {
    serialport::new(name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| LinkError::Io(e.to_string()))
}
