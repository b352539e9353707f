use std::io;
use std::sync::{Arc, Mutex};

/// Serial device backed by a shared byte buffer, so tests can inspect what
/// the link wrote.
#[derive(Clone)]
pub(crate) struct SharedSerial {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedSerial {
    pub(crate) fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Drain everything written so far.
    pub(crate) fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.buf.lock().unwrap())
    }
}

impl io::Write for SharedSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serial device that accepts a fixed number of octets, then short-writes.
pub(crate) struct ShortSerial {
    remaining: usize,
}

impl ShortSerial {
    pub(crate) fn accepting(octets: usize) -> Self {
        Self { remaining: octets }
    }
}

impl io::Write for ShortSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let accepted = buf.len().min(self.remaining);
        self.remaining -= accepted;
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Dispatched frames collected across threads.
#[derive(Clone)]
pub(crate) struct CapturedFrames {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CapturedFrames {
    pub(crate) fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, frame: Vec<u8>) {
        self.frames.lock().unwrap().push(frame);
    }

    pub(crate) fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.frames.lock().unwrap())
    }
}
