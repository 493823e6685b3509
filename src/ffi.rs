//! C FFI layer for the endoscope driver.
//!
//! The haptics framework that consumes the device is C++, so the
//! [`HapticDevice`] contract is exported as an opaque-handle API.
//! The generated C header is written to `include/endoscope.h` by cbindgen.
//!
//! Return codes: `ES_OK` (0), `ES_ERROR` (-1, see `es_last_error()`),
//! `ES_NOT_READY` (-2, device closed). A lost serial link closes the device,
//! so later calls report `ES_NOT_READY` until `es_device_open` succeeds again.
//! Error messages are kept per calling thread.

use crate::device::{HapticDevice, UsartDevice};
use crate::error::LAST_ERROR;
use crate::types::Polarity;
use crate::{DeviceConfig, EndoscopeError, ErrorKind};
use std::ffi::{c_char, c_int, CStr};

pub const ES_OK: c_int = 0;
pub const ES_ERROR: c_int = -1;
pub const ES_NOT_READY: c_int = -2;

/// Opaque device handle for C consumers.
pub struct EsDevice(UsartDevice);

/// Calibration parameters in C-compatible layout. Polarities are +1 or -1.
#[repr(C)]
pub struct EsConfig {
    pub angle_limit: f64,
    pub zoom_limit: f64,
    pub angle_scale: f64,
    pub zoom_scale: f64,
    pub filter_resolution: f64,
    pub polarity_angle: c_int,
    pub polarity_zoom: c_int,
    pub pivot_offset: f64,
}

/// Device descriptor in C-compatible layout.
#[repr(C)]
pub struct EsSpecification {
    /// Null-terminated model name.
    pub model_name: [c_char; 64],
    /// Null-terminated manufacturer name.
    pub manufacturer_name: [c_char; 64],
    /// Capability bitmap (see `Capabilities`).
    pub capabilities: u32,
    pub workspace_radius: f64,
    pub angle_limit_deg: f64,
}

fn str_to_fixed<const N: usize>(s: &str) -> [c_char; N] {
    let mut buf = [0 as c_char; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N - 1);
    for (i, &b) in bytes[..len].iter().enumerate() {
        buf[i] = b as c_char;
    }
    buf
}

fn status(result: crate::Result<()>) -> c_int {
    match result {
        Ok(()) => ES_OK,
        Err(e) => {
            LAST_ERROR.with(|last| last.set(&e));
            if e.kind() == ErrorKind::NotReady {
                ES_NOT_READY
            } else {
                ES_ERROR
            }
        }
    }
}

fn polarity(value: c_int, field: &str) -> crate::Result<Polarity> {
    Polarity::from_i32(value).ok_or_else(|| {
        EndoscopeError::InvalidConfig(format!("{} must be +1 or -1, got {}", field, value))
    })
}

/// Create a closed device on the named serial port (e.g. "COM7", "/dev/ttyUSB0").
/// Returns NULL on error.
///
/// # Safety
/// `port` must be a valid null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_create(port: *const c_char) -> *mut EsDevice {
    if port.is_null() {
        return std::ptr::null_mut();
    }
    match CStr::from_ptr(port).to_str() {
        Ok(name) if !name.is_empty() => Box::into_raw(Box::new(EsDevice(UsartDevice::serial(name)))),
        _ => {
            let err = EndoscopeError::InvalidConfig("port name must be non-empty UTF-8".into());
            LAST_ERROR.with(|last| last.set(&err));
            std::ptr::null_mut()
        }
    }
}

/// Close a device (if open) and free it.
///
/// # Safety
/// `dev` must be a pointer returned by `es_device_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_destroy(dev: *mut EsDevice) {
    if !dev.is_null() {
        let mut dev = Box::from_raw(dev);
        if let Err(e) = dev.0.close() {
            log::warn!("Close on destroy failed: {}", e);
        }
    }
}

/// Install calibration parameters. Only allowed while the device is closed.
///
/// # Safety
/// `dev` and `config` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_configure(dev: *mut EsDevice, config: *const EsConfig) -> c_int {
    if dev.is_null() || config.is_null() {
        return ES_ERROR;
    }
    let dev = &mut *dev;
    let c = &*config;

    let result = polarity(c.polarity_angle, "polarity_angle").and_then(|polarity_angle| {
        let polarity_zoom = polarity(c.polarity_zoom, "polarity_zoom")?;
        dev.0.configure(DeviceConfig {
            angle_limit: c.angle_limit,
            zoom_limit: c.zoom_limit,
            angle_scale: c.angle_scale,
            zoom_scale: c.zoom_scale,
            filter_resolution: c.filter_resolution,
            polarity_angle,
            polarity_zoom,
            pivot_offset: c.pivot_offset,
        })
    });
    status(result)
}

/// Open the serial link.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_open(dev: *mut EsDevice) -> c_int {
    if dev.is_null() {
        return ES_ERROR;
    }
    status((*dev).0.open())
}

/// Close the serial link. Safe to call on a closed device.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_close(dev: *mut EsDevice) -> c_int {
    if dev.is_null() {
        return ES_ERROR;
    }
    status((*dev).0.close())
}

/// Poll the device once and write the tip position to `out[0..3]`.
///
/// # Safety
/// `dev` must be a valid device pointer and `out` must point to 3 doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn es_device_get_position(dev: *mut EsDevice, out: *mut f64) -> c_int {
    if dev.is_null() || out.is_null() {
        return ES_ERROR;
    }
    let dev = &mut *dev;
    status(dev.0.get_position().map(|position| {
        std::ptr::copy_nonoverlapping(position.as_ptr(), out, 3);
    }))
}

/// Write the rotation of the last poll to `out[0..9]`, row-major.
///
/// # Safety
/// `dev` must be a valid device pointer and `out` must point to 9 doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn es_device_get_rotation(dev: *const EsDevice, out: *mut f64) -> c_int {
    if dev.is_null() || out.is_null() {
        return ES_ERROR;
    }
    let dev = &*dev;
    status(dev.0.get_rotation().map(|rotation| {
        for (i, row) in rotation.iter().enumerate() {
            std::ptr::copy_nonoverlapping(row.as_ptr(), out.add(i * 3), 3);
        }
    }))
}

/// Fill `out` with the device descriptor.
///
/// # Safety
/// `dev` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn es_device_get_specifications(
    dev: *const EsDevice,
    out: *mut EsSpecification,
) -> c_int {
    if dev.is_null() || out.is_null() {
        return ES_ERROR;
    }
    let spec = (*dev).0.get_specifications();
    out.write(EsSpecification {
        model_name: str_to_fixed(&spec.model_name),
        manufacturer_name: str_to_fixed(&spec.manufacturer_name),
        capabilities: spec.capabilities.bits(),
        workspace_radius: spec.workspace_radius,
        angle_limit_deg: spec.angle_limit_deg,
    });
    ES_OK
}

/// Get the last error message of the calling thread. Returns NULL if no call
/// on this thread has failed yet.
///
/// The returned pointer is only valid on the calling thread, until that
/// thread's next failing call. Copy the string before handing it elsewhere.
#[no_mangle]
pub extern "C" fn es_last_error() -> *const c_char {
    LAST_ERROR.with(|last| last.as_ptr())
}
