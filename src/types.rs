/// One decoded frame: three raw per-axis readings, exactly as sent on the wire.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RawSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Integrated orientation in degrees since the device was opened.
///
/// `x` drives yaw, `z` drives pitch and `y` is the zoom (insertion) channel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Rotation and tip position derived from one poll.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// 3x3 row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Quantized tip position [x, y, z].
    pub position: [f64; 3],
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        position: [0.0; 3],
    };
}

impl Default for Pose {
    fn default() -> Self {
        Pose::IDENTITY
    }
}

/// Pose published by the polling worker.
#[derive(Debug, Clone, Copy)]
pub struct PoseSample {
    pub pose: Pose,
    /// Poll counter, starting at 0 for the first published pose.
    pub sequence: u64,
    /// Seconds since the worker started.
    pub host_timestamp_s: f64,
}

/// Sign convention of a sensed axis, matching how the sensor is mounted.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive = 1,
    Negative = -1,
}

impl Polarity {
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }

    pub fn inverted(self) -> Polarity {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }

    /// Parse `1`/`+1`/`-1` style operator input.
    pub fn from_i32(v: i32) -> Option<Polarity> {
        match v {
            1 => Some(Polarity::Positive),
            -1 => Some(Polarity::Negative),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// What the device can sense or actuate, as reported to the haptics framework.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct Capabilities: u32 {
        const SENSED_POSITION = 1 << 0;
        const SENSED_ROTATION = 1 << 1;
        const SENSED_GRIPPER  = 1 << 2;
        const ACTUATED_FORCE  = 1 << 3;
        const ACTUATED_TORQUE = 1 << 4;
    }
}

/// Device descriptor returned by `get_specifications`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpecification {
    pub model_name: String,
    pub manufacturer_name: String,
    pub capabilities: Capabilities,
    /// Radius of the reachable tip workspace.
    pub workspace_radius: f64,
    /// Largest integrated angle per axis, in degrees.
    pub angle_limit_deg: f64,
}
