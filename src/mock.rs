//! In-memory transport for exercising the driver without hardware.

use crate::protocol;
use crate::transport::Transport;
use crate::types::RawSample;
use crate::{EndoscopeError, Result};
use std::collections::VecDeque;

/// Scripted transport: bytes queued with [`MockTransport::push_bytes`] or
/// [`MockTransport::push_frame`] are handed out by the read calls.
///
/// Unlike a real link, an empty queue is reported as a lost connection so a
/// test can never hang waiting for bytes.
///
/// ```
/// use endoscope::{MockTransport, Transport};
///
/// let mut link = MockTransport::new();
/// link.push_bytes(&[0x42]);
/// link.open().unwrap();
/// assert_eq!(link.read_byte().unwrap(), 0x42);
/// assert_eq!(link.bytes_read(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    open: bool,
    fail_open: bool,
    open_calls: usize,
    close_calls: usize,
    bytes_read: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `open` always fails, like an absent COM port.
    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Queue raw bytes for reading.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Queue one well-formed frame carrying `sample`.
    pub fn push_frame(&mut self, sample: RawSample) {
        self.push_bytes(&protocol::encode_frame(&sample));
    }

    /// Bytes still queued.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Total bytes delivered through the read calls.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        self.open_calls += 1;
        if self.fail_open {
            return Err(EndoscopeError::Disconnected("mock port unavailable".into()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.open {
            return Err(EndoscopeError::Disconnected("mock port is closed".into()));
        }
        if self.rx.len() < buf.len() {
            return Err(EndoscopeError::Disconnected(format!(
                "mock stream exhausted ({} of {} bytes left)",
                self.rx.len(),
                buf.len()
            )));
        }
        for slot in buf.iter_mut() {
            // Length checked above.
            *slot = self.rx.pop_front().unwrap_or_default();
        }
        self.bytes_read += buf.len();
        Ok(())
    }
}
