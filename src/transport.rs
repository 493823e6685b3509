use crate::config::SerialSettings;
use crate::{EndoscopeError, Result};
use serialport::SerialPort;
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Pause after a zero-length read, which some USB-serial drivers return
/// immediately instead of honouring the port timeout.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Byte-oriented duplex link to the sensor.
///
/// Reads block until the requested bytes are available; they never return
/// short. Timeouts of the underlying link are retried internally.
pub trait Transport {
    /// Acquire and configure the link.
    fn open(&mut self) -> Result<()>;

    /// Release the link. Safe to call when already closed.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read exactly one byte.
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// Serial transport over the `serialport` crate.
///
/// Closing from another thread while a read is blocked is not supported; the
/// read returns only once bytes arrive or the stall timeout elapses.
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        log::info!(
            "Opening serial port {} at {} baud (8 data bits, {:?} stop bits, no parity)",
            self.settings.port,
            self.settings.baud_rate,
            self.settings.stop_bits
        );

        let port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(self.settings.stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(|e| {
                log::warn!("Failed to open {}: {}", self.settings.port, e);
                EndoscopeError::Serial(e)
            })?;

        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(port) = self.port.take() {
            drop(port);
            log::info!("Closed serial port {}", self.settings.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let stall_timeout = self.settings.stall_timeout;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| EndoscopeError::Disconnected("serial port is closed".into()))?;
        fill_blocking(port, buf, stall_timeout)
    }
}

/// Keep reading until `buf` is full.
///
/// Timeouts, would-block, interrupts and zero-length reads mean "no bytes yet"
/// and are retried. Any other error is a broken link. With `stall_timeout` set,
/// going that long without receiving a single byte is an error as well.
pub(crate) fn fill_blocking<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    stall_timeout: Option<Duration>,
) -> Result<()> {
    let mut filled = 0;
    let mut last_progress = Instant::now();

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(n) if n > 0 => {
                filled += n;
                last_progress = Instant::now();
                continue;
            }
            Ok(_) => std::thread::sleep(IDLE_BACKOFF),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(EndoscopeError::Io(e)),
        }

        log::trace!("Waiting for serial data ({}/{} bytes)", filled, buf.len());
        if let Some(limit) = stall_timeout {
            if last_progress.elapsed() >= limit {
                return Err(EndoscopeError::Stalled(limit));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Reader that replays a script of chunks and errors.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.0.push_front(Ok(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
            }
        }
    }

    fn timed_out() -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
    }

    #[test]
    fn test_fill_retries_until_complete() {
        let mut reader = Scripted(VecDeque::from(vec![
            Ok(vec![1, 2]),
            timed_out(),
            Ok(vec![]),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Ok(vec![3, 4, 5]),
        ]));
        let mut buf = [0u8; 5];
        fill_blocking(&mut reader, &mut buf, None).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_fill_backs_off_on_empty_reads() {
        let mut script: VecDeque<io::Result<Vec<u8>>> = (0..5).map(|_| Ok(vec![])).collect();
        script.push_back(Ok(vec![7]));
        let mut reader = Scripted(script);
        let mut buf = [0u8; 1];

        let start = Instant::now();
        fill_blocking(&mut reader, &mut buf, None).unwrap();
        assert!(start.elapsed() >= IDLE_BACKOFF * 5);
        assert_eq!(buf, [7]);
    }

    #[test]
    fn test_fill_propagates_broken_link() {
        let mut reader = Scripted(VecDeque::from(vec![
            Ok(vec![1]),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
        ]));
        let mut buf = [0u8; 4];
        let err = fill_blocking(&mut reader, &mut buf, None).unwrap_err();
        assert!(matches!(err, EndoscopeError::Io(_)));
    }

    #[test]
    fn test_fill_stall_timeout() {
        let mut reader = Scripted(VecDeque::new());
        let mut buf = [0u8; 1];
        let err = fill_blocking(&mut reader, &mut buf, Some(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, EndoscopeError::Stalled(_)));
    }

    #[test]
    fn test_closed_serial_transport_read_fails() {
        let mut transport = SerialTransport::new(SerialSettings::new("/dev/null-endoscope"));
        assert!(!transport.is_open());
        assert!(transport.close().is_ok());
        assert!(transport.close().is_ok());
        assert!(matches!(
            transport.read_byte(),
            Err(EndoscopeError::Disconnected(_))
        ));
    }
}
