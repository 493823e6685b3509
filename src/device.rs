use crate::calibration;
use crate::config::{DeviceConfig, SerialSettings};
use crate::kinematics::{self, Mat3};
use crate::protocol::{FrameDecoder, ResyncPolicy};
use crate::transport::{SerialTransport, Transport};
use crate::types::{Capabilities, DeviceSpecification, OrientationState, Pose, RawSample};
use crate::{EndoscopeError, ErrorKind, Result};

/// Capability contract polled by the haptics framework.
///
/// `get_position` drives the device: it performs one read and leaves the pose
/// cached, and `get_rotation` reports the rotation of that same read.
pub trait HapticDevice {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn get_position(&mut self) -> Result<[f64; 3]>;
    fn get_rotation(&self) -> Result<Mat3>;
    fn get_specifications(&self) -> DeviceSpecification;
}

/// The endoscope sensor behind a USART-to-USB bridge.
///
/// Owns its transport, configuration and integrated orientation. Meant to be
/// polled from one thread; use [`crate::PoseStream`] to share results.
pub struct UsartDevice<T: Transport = SerialTransport> {
    transport: T,
    decoder: FrameDecoder,
    config: DeviceConfig,
    orientation: OrientationState,
    pose: Pose,
    ready: bool,
}

impl UsartDevice<SerialTransport> {
    /// Device on a named serial port with default link settings.
    pub fn serial(port: impl Into<String>) -> Self {
        Self::new(SerialTransport::new(SerialSettings::new(port)))
    }

    pub fn with_settings(settings: SerialSettings) -> Self {
        Self::new(SerialTransport::new(settings))
    }
}

impl<T: Transport> UsartDevice<T> {
    /// Wrap a transport. The device starts closed with [`DeviceConfig::default`].
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::default(),
            config: DeviceConfig::default(),
            orientation: OrientationState::default(),
            pose: Pose::IDENTITY,
            ready: false,
        }
    }

    pub fn with_resync_policy(mut self, policy: ResyncPolicy) -> Self {
        self.decoder = FrameDecoder::new(policy);
        self
    }

    /// Install calibration parameters. Only allowed while closed; an invalid
    /// config is rejected and the previous one kept.
    pub fn configure(&mut self, config: DeviceConfig) -> Result<()> {
        if self.ready {
            return Err(EndoscopeError::ConfigLocked);
        }
        config.validate()?;
        log::info!("Configured endoscope: {:?}", config);
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.ready
    }

    /// Integrated orientation since the last `open`.
    pub fn orientation(&self) -> OrientationState {
        self.orientation
    }

    /// Pose of the most recent poll.
    pub fn last_pose(&self) -> Pose {
        self.pose
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Read one frame, integrate it and recompute the pose.
    ///
    /// A connection error (lost or stalled link) also closes the device; call
    /// `open` again to resume.
    pub fn poll(&mut self) -> Result<Pose> {
        if !self.ready {
            return Err(EndoscopeError::NotReady);
        }
        let sample = match self.decoder.next_sample(&mut self.transport) {
            Ok(sample) => sample,
            Err(e) => {
                if e.kind() == ErrorKind::Connection {
                    // Dead link: drop to Closed so the caller's next open() reacquires it.
                    log::warn!("Serial link lost, closing device: {}", e);
                    self.ready = false;
                    if let Err(close_err) = self.transport.close() {
                        log::warn!("Close after link loss failed: {}", close_err);
                    }
                }
                return Err(e);
            }
        };
        Ok(self.apply(&sample))
    }

    fn apply(&mut self, sample: &RawSample) -> Pose {
        calibration::integrate(&mut self.orientation, sample, &self.config);
        self.pose = kinematics::solve(&self.orientation, &self.config);
        self.pose
    }
}

impl<T: Transport> HapticDevice for UsartDevice<T> {
    fn open(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        self.transport.open()?;
        self.orientation = OrientationState::default();
        self.pose = Pose::IDENTITY;
        self.ready = true;
        log::info!("Endoscope device open");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let was_open = self.ready;
        self.ready = false;
        self.transport.close()?;
        if was_open {
            log::info!("Endoscope device closed");
        }
        Ok(())
    }

    fn get_position(&mut self) -> Result<[f64; 3]> {
        Ok(self.poll()?.position)
    }

    fn get_rotation(&self) -> Result<Mat3> {
        if !self.ready {
            return Err(EndoscopeError::NotReady);
        }
        Ok(self.pose.rotation)
    }

    fn get_specifications(&self) -> DeviceSpecification {
        DeviceSpecification {
            model_name: "USART endoscope".into(),
            manufacturer_name: "custom".into(),
            capabilities: Capabilities::SENSED_POSITION | Capabilities::SENSED_ROTATION,
            workspace_radius: self.config.zoom_limit + self.config.pivot_offset.abs(),
            angle_limit_deg: self.config.angle_limit,
        }
    }
}
