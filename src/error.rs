use std::cell::RefCell;
use std::ffi::{c_char, CString};

/// Errors that can occur when talking to the endoscope sensor.
#[derive(Debug, thiserror::Error)]
pub enum EndoscopeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("No data from serial link for {0:?}")]
    Stalled(std::time::Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration is locked while the device is open")]
    ConfigLocked,

    #[error("Device not ready (closed)")]
    NotReady,

    #[error("Pose stream stopped")]
    StreamStopped,

    #[error("Timeout waiting for pose")]
    Timeout,
}

/// Coarse classification of [`EndoscopeError`] used by callers that only care
/// about which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The port could not be opened/configured, or a blocking read failed.
    Connection,
    /// A zero, negative or non-finite scale/limit was supplied.
    Configuration,
    /// The device is closed.
    NotReady,
    /// The polling worker is gone or did not deliver in time.
    Stream,
}

impl EndoscopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EndoscopeError::Serial(_)
            | EndoscopeError::Io(_)
            | EndoscopeError::Disconnected(_)
            | EndoscopeError::Stalled(_) => ErrorKind::Connection,
            EndoscopeError::InvalidConfig(_) | EndoscopeError::ConfigLocked => {
                ErrorKind::Configuration
            }
            EndoscopeError::NotReady => ErrorKind::NotReady,
            EndoscopeError::StreamStopped | EndoscopeError::Timeout => ErrorKind::Stream,
        }
    }
}

/// Last-error slot for the C FFI layer, kept per thread.
///
/// The pointer from [`LastError::as_ptr`] stays valid until the next `set`
/// on the same slot.
pub(crate) struct LastError {
    message: RefCell<Option<CString>>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: RefCell::new(None),
        }
    }

    pub fn set(&self, err: &EndoscopeError) {
        let text = err.to_string().replace('\0', " ");
        *self.message.borrow_mut() = CString::new(text).ok();
    }

    pub fn as_ptr(&self) -> *const c_char {
        match self.message.borrow().as_ref() {
            Some(msg) => msg.as_ptr(),
            None => std::ptr::null(),
        }
    }
}

thread_local! {
    pub(crate) static LAST_ERROR: LastError = const { LastError::new() };
}
