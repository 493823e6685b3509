use crate::types::Polarity;
use crate::{EndoscopeError, Result};
use std::time::Duration;

/// Default baud rate of the sensor's USART bridge.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Per-read timeout. Reads that time out are retried, so this only bounds how
/// long a single OS read call may block.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Calibration parameters for one session.
///
/// Set through [`crate::UsartDevice::configure`] before opening; the device
/// refuses changes while open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// Largest integrated angle per axis, in degrees.
    pub angle_limit: f64,
    /// Largest tip extension, in scene distance units.
    pub zoom_limit: f64,
    /// Raw reading divisor giving degrees.
    pub angle_scale: f64,
    /// Integrated zoom divisor giving distance units.
    pub zoom_scale: f64,
    /// Quantization steps per unit.
    pub filter_resolution: f64,
    pub polarity_angle: Polarity,
    pub polarity_zoom: Polarity,
    /// Distance from the rotation pivot to the instrument tip.
    pub pivot_offset: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            angle_limit: 45.0,
            zoom_limit: 0.04,
            angle_scale: 15.0,
            zoom_scale: 10_000.0,
            filter_resolution: 20_000.0,
            polarity_angle: Polarity::Negative,
            polarity_zoom: Polarity::Negative,
            pivot_offset: 0.0,
        }
    }
}

impl DeviceConfig {
    /// Reject any scale, limit or resolution that is not finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("angle_limit", self.angle_limit),
            ("zoom_limit", self.zoom_limit),
            ("angle_scale", self.angle_scale),
            ("zoom_scale", self.zoom_scale),
            ("filter_resolution", self.filter_resolution),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EndoscopeError::InvalidConfig(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }
        if !self.pivot_offset.is_finite() {
            return Err(EndoscopeError::InvalidConfig(format!(
                "pivot_offset must be finite, got {}",
                self.pivot_offset
            )));
        }
        Ok(())
    }

    /// Build a config from the values an operator types at the rig's console.
    ///
    /// The zoom scale is entered in hundredths and both polarities are entered
    /// inverted relative to the stored convention.
    pub fn from_operator_input(
        zoom_scale: f64,
        polarity_zoom: Polarity,
        angle_scale: f64,
        polarity_angle: Polarity,
    ) -> Result<DeviceConfig> {
        let config = DeviceConfig {
            zoom_scale: 100.0 * zoom_scale,
            polarity_zoom: polarity_zoom.inverted(),
            angle_scale,
            polarity_angle: polarity_angle.inverted(),
            ..DeviceConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `ENDOSCOPE_*` environment variables.
    pub fn from_env() -> Result<DeviceConfig> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<DeviceConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = DeviceConfig::default();
        let f = |name: &str, default: f64| read_f64(&lookup, name).unwrap_or(default);
        let p = |name: &str, default: Polarity| {
            read_i32(&lookup, name)
                .and_then(Polarity::from_i32)
                .unwrap_or(default)
        };

        let config = DeviceConfig {
            angle_limit: f("ENDOSCOPE_ANGLE_LIMIT", d.angle_limit),
            zoom_limit: f("ENDOSCOPE_ZOOM_LIMIT", d.zoom_limit),
            angle_scale: f("ENDOSCOPE_ANGLE_SCALE", d.angle_scale),
            zoom_scale: f("ENDOSCOPE_ZOOM_SCALE", d.zoom_scale),
            filter_resolution: f("ENDOSCOPE_FILTER_RESOLUTION", d.filter_resolution),
            polarity_angle: p("ENDOSCOPE_POLARITY_ANGLE", d.polarity_angle),
            polarity_zoom: p("ENDOSCOPE_POLARITY_ZOOM", d.polarity_zoom),
            pivot_offset: f("ENDOSCOPE_PIVOT_OFFSET", d.pivot_offset),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Serial link parameters. Data bits are always 8, parity none, no flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub stop_bits: serialport::StopBits,
    pub read_timeout: Duration,
    /// Give up with [`EndoscopeError::Stalled`] after this long without a byte.
    /// `None` waits forever.
    pub stall_timeout: Option<Duration>,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            stop_bits: serialport::StopBits::Two,
            read_timeout: DEFAULT_READ_TIMEOUT,
            stall_timeout: None,
        }
    }

    /// Settings for a port given by its COM number, as the rig's operators know it.
    pub fn com_port(number: u32) -> Self {
        if cfg!(windows) {
            Self::new(format!("COM{}", number))
        } else {
            Self::new(format!("/dev/ttyS{}", number))
        }
    }

    /// `ENDOSCOPE_PORT` (required) plus optional `ENDOSCOPE_BAUD`,
    /// `ENDOSCOPE_STOP_BITS`, `ENDOSCOPE_READ_TIMEOUT_MS` and
    /// `ENDOSCOPE_STALL_TIMEOUT_MS`.
    pub fn from_env() -> Result<SerialSettings> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<SerialSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("ENDOSCOPE_PORT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EndoscopeError::InvalidConfig("ENDOSCOPE_PORT is not set".into()))?;

        let mut settings = SerialSettings::new(port);
        if let Some(baud) = lookup("ENDOSCOPE_BAUD").and_then(|v| v.trim().parse::<u32>().ok()) {
            settings.baud_rate = baud;
        }
        match read_i32(&lookup, "ENDOSCOPE_STOP_BITS") {
            Some(1) => settings.stop_bits = serialport::StopBits::One,
            Some(2) => settings.stop_bits = serialport::StopBits::Two,
            Some(other) => log::warn!("Ignoring ENDOSCOPE_STOP_BITS={} (supported: 1|2)", other),
            None => {}
        }
        if let Some(ms) = read_u64(&lookup, "ENDOSCOPE_READ_TIMEOUT_MS") {
            settings.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = read_u64(&lookup, "ENDOSCOPE_STALL_TIMEOUT_MS") {
            settings.stall_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(settings)
    }
}

fn read_f64<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<f64> {
    let parsed = lookup(name).and_then(|v| v.trim().parse::<f64>().ok());
    if parsed.is_none() && lookup(name).is_some() {
        log::warn!("Ignoring unparseable {}", name);
    }
    parsed
}

fn read_i32<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<i32> {
    lookup(name).and_then(|v| v.trim().trim_start_matches('+').parse::<i32>().ok())
}

fn read_u64<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<u64> {
    lookup(name).and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        assert!(DeviceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_and_negative() {
        let mut config = DeviceConfig::default();
        config.zoom_scale = 0.0;
        assert!(matches!(config.validate(), Err(EndoscopeError::InvalidConfig(_))));

        let mut config = DeviceConfig::default();
        config.filter_resolution = -1.0;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.angle_limit = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::default();
        config.pivot_offset = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_operator_input_conventions() {
        let config =
            DeviceConfig::from_operator_input(750.0, Polarity::Positive, 15.0, Polarity::Positive)
                .unwrap();
        assert_eq!(config.zoom_scale, 75_000.0);
        assert_eq!(config.angle_scale, 15.0);
        assert_eq!(config.polarity_zoom, Polarity::Negative);
        assert_eq!(config.polarity_angle, Polarity::Negative);

        assert!(
            DeviceConfig::from_operator_input(0.0, Polarity::Positive, 15.0, Polarity::Positive)
                .is_err()
        );
    }

    #[test]
    fn test_config_from_lookup() {
        let config = DeviceConfig::from_lookup(env(&[
            ("ENDOSCOPE_ANGLE_SCALE", "30"),
            ("ENDOSCOPE_POLARITY_ZOOM", "+1"),
            ("ENDOSCOPE_ZOOM_LIMIT", "not a number"),
        ]))
        .unwrap();
        assert_eq!(config.angle_scale, 30.0);
        assert_eq!(config.polarity_zoom, Polarity::Positive);
        assert_eq!(config.zoom_limit, DeviceConfig::default().zoom_limit);

        assert!(DeviceConfig::from_lookup(env(&[("ENDOSCOPE_ANGLE_LIMIT", "0")])).is_err());
    }

    #[test]
    fn test_serial_settings_from_lookup() {
        assert!(SerialSettings::from_lookup(env(&[])).is_err());

        let settings = SerialSettings::from_lookup(env(&[
            ("ENDOSCOPE_PORT", " /dev/ttyUSB0 "),
            ("ENDOSCOPE_BAUD", "115200"),
            ("ENDOSCOPE_STOP_BITS", "1"),
            ("ENDOSCOPE_STALL_TIMEOUT_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.stop_bits, serialport::StopBits::One);
        assert_eq!(settings.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(settings.stall_timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_serial_settings_defaults() {
        let settings = SerialSettings::new("COM7");
        assert_eq!(settings.baud_rate, 57_600);
        assert_eq!(settings.stop_bits, serialport::StopBits::Two);
        assert_eq!(settings.stall_timeout, None);
    }
}
