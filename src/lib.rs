//! # endoscope - driver for a tethered endoscope motion sensor
//!
//! Reads the sensor's framed serial stream and turns it into a calibrated
//! tip pose for a haptics/3D framework. Provides:
//! - Frame decoding (six `0xAA` sync bytes + three little-endian f64)
//! - Calibration: scaling, integration and per-axis clamping
//! - Pivot kinematics with jitter quantization
//! - The `HapticDevice` contract, a polling worker and a C FFI
//!
//! ## Quick Start
//! ```no_run
//! use endoscope::{DeviceConfig, HapticDevice, UsartDevice};
//!
//! let mut device = UsartDevice::serial("COM7");
//! device.configure(DeviceConfig::default()).unwrap();
//! device.open().unwrap();
//! for _ in 0..100 {
//!     let position = device.get_position().unwrap();
//!     let rotation = device.get_rotation().unwrap();
//!     println!("pos: {:?} rot: {:?}", position, rotation);
//! }
//! device.close().unwrap();
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod transport;
pub mod mock;
pub mod protocol;
pub mod calibration;
pub mod kinematics;
pub mod device;
pub mod stream;
pub mod ffi;

pub use error::{EndoscopeError, ErrorKind};
pub use types::*;
pub use config::{DeviceConfig, SerialSettings};
pub use transport::{SerialTransport, Transport};
pub use mock::MockTransport;
pub use protocol::{FrameDecoder, ResyncPolicy};
pub use device::{HapticDevice, UsartDevice};
pub use stream::PoseStream;

/// Result type alias for endoscope operations.
pub type Result<T> = std::result::Result<T, EndoscopeError>;
