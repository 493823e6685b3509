//! Pivot kinematics of the endoscope.
//!
//! The instrument rotates about a fixed pivot that sits `pivot_offset` behind
//! its tip, so a pure rotation at the pivot both turns and swings the tip.
//! Axes: X is insertion (zoom), Y is horizontal, Z is vertical.
//!
//! The tip position is computed as literal homogeneous algebra,
//! `T(s3) * R * T(-s3) * o`, to stay numerically identical to the rig's
//! calibration.

use crate::calibration::clamp_symmetric;
use crate::config::DeviceConfig;
use crate::types::{OrientationState, Pose};

pub type Mat3 = [[f64; 3]; 3];
pub type Mat4 = [[f64; 4]; 4];

/// Relative slack, in grid steps, under which a value counts as already quantized.
const GRID_EPSILON: f64 = 1e-9;

pub fn rot_x_deg(angle: f64) -> Mat3 {
    let (s, c) = angle.to_radians().sin_cos();
    [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]
}

pub fn rot_y_deg(angle: f64) -> Mat3 {
    let (s, c) = angle.to_radians().sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

pub fn rot_z_deg(angle: f64) -> Mat3 {
    let (s, c) = angle.to_radians().sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

pub fn mul3(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

pub fn mul4(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

pub fn transform_point(m: &Mat4, p: [f64; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (i, cell) in out.iter_mut().enumerate() {
        *cell = (0..4).map(|k| m[i][k] * p[k]).sum();
    }
    out
}

/// Homogeneous translation along X.
pub fn translation_x(d: f64) -> Mat4 {
    let mut m = identity4();
    m[0][3] = d;
    m
}

/// Embed a rotation into a homogeneous transform.
pub fn homogeneous(r: &Mat3) -> Mat4 {
    let mut m = identity4();
    for i in 0..3 {
        m[i][..3].copy_from_slice(&r[i]);
    }
    m
}

fn identity4() -> Mat4 {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Extrinsic Euler rotation over the fixed axes X, Z, Y, in that order.
///
/// `pitch` turns about Z first, `yaw` about Y second; the X (roll) slot is
/// always zero on this instrument.
pub fn orientation_matrix(pitch_deg: f64, yaw_deg: f64) -> Mat3 {
    let first = rot_x_deg(0.0);
    let second = rot_z_deg(pitch_deg);
    let third = rot_y_deg(yaw_deg);
    mul3(&third, &mul3(&second, &first))
}

/// Truncate toward zero onto the grid of `1 / resolution` steps.
///
/// Values that already sit on the grid (within representation error) stay on
/// the same grid point, so quantizing twice is the same as quantizing once.
pub fn quantize(value: f64, resolution: f64) -> f64 {
    let steps = value * resolution;
    let nearest = steps.round();
    let steps = if (steps - nearest).abs() <= GRID_EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        steps.trunc()
    };
    steps / resolution
}

/// Instrument extension `s3`: integrated zoom plus pivot offset, saturated at
/// the zoom limit.
pub fn extension(state: &OrientationState, config: &DeviceConfig) -> f64 {
    let zoom = state.y / config.zoom_scale;
    clamp_symmetric(
        zoom * config.polarity_zoom.sign() + config.pivot_offset,
        config.zoom_limit,
    )
}

/// Tip position for rotation `r` at extension `s3`.
///
/// The pre-transform origin carries the extension itself (`s3 - pivot_offset`)
/// in its X component before the pivot transform is applied.
pub fn pivot_position(r: &Mat3, s3: f64, pivot_offset: f64) -> [f64; 3] {
    let to_pivot = translation_x(s3);
    let from_pivot = translation_x(-s3);
    let m = mul4(&mul4(&to_pivot, &homogeneous(r)), &from_pivot);

    let origin = [s3 - pivot_offset, 0.0, 0.0, 1.0];
    let p = transform_point(&m, origin);
    [p[0], p[1], p[2]]
}

/// Derive the pose from the integrated orientation.
pub fn solve(state: &OrientationState, config: &DeviceConfig) -> Pose {
    let yaw = state.x * config.polarity_angle.sign();
    let pitch = -state.z * config.polarity_angle.sign();
    let s3 = extension(state, config);

    let rotation = orientation_matrix(pitch, yaw);
    let raw = pivot_position(&rotation, s3, config.pivot_offset);
    let position = raw.map(|v| quantize(v, config.filter_resolution));

    Pose { rotation, position }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarity;

    fn assert_mat_eq(a: &Mat3, b: &Mat3) {
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (a[i][j] - b[i][j]).abs() < 1e-12,
                    "[{}][{}]: {} != {}",
                    i,
                    j,
                    a[i][j],
                    b[i][j]
                );
            }
        }
    }

    fn rig_config() -> DeviceConfig {
        DeviceConfig {
            angle_scale: 15.0,
            zoom_scale: 75_000.0,
            angle_limit: 45.0,
            zoom_limit: 0.04,
            filter_resolution: 20_000.0,
            polarity_angle: Polarity::Negative,
            polarity_zoom: Polarity::Negative,
            pivot_offset: 0.0,
        }
    }

    #[test]
    fn test_orientation_identity() {
        assert_mat_eq(
            &orientation_matrix(0.0, 0.0),
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
    }

    #[test]
    fn test_orientation_order_pitch_then_yaw() {
        let r = orientation_matrix(20.0, 30.0);
        assert_mat_eq(&r, &mul3(&rot_y_deg(30.0), &rot_z_deg(20.0)));
        // Not commutative: the other order gives a different matrix.
        let other = mul3(&rot_z_deg(20.0), &rot_y_deg(30.0));
        assert!((r[0][1] - other[0][1]).abs() > 1e-3);
    }

    #[test]
    fn test_yaw_only_rotation() {
        let state = OrientationState {
            x: 10.0,
            y: 0.0,
            z: 0.0,
        };
        let pose = solve(&state, &rig_config());
        let (s, c) = (-10f64).to_radians().sin_cos();
        assert_mat_eq(&pose.rotation, &[[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]);
        assert_eq!(pose.position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zoom_clamp_boundary() {
        let config = DeviceConfig {
            zoom_scale: 100.0,
            ..rig_config()
        };
        let deep = OrientationState {
            x: 0.0,
            y: 40.0,
            z: 0.0,
        };
        assert_eq!(extension(&deep, &config), -0.04);

        let shallow = OrientationState { y: -40.0, ..deep };
        assert_eq!(extension(&shallow, &config), 0.04);
    }

    #[test]
    fn test_zoom_moves_tip_along_insertion_axis() {
        let config = DeviceConfig {
            zoom_scale: 1000.0,
            ..rig_config()
        };
        let state = OrientationState {
            x: 0.0,
            y: 4.0,
            z: 0.0,
        };
        let pose = solve(&state, &config);
        assert!((pose.position[0] - (-0.004)).abs() < 1e-12);
        assert_eq!(pose.position[1], 0.0);
        assert_eq!(pose.position[2], 0.0);
    }

    #[test]
    fn test_pivot_swing() {
        let config = DeviceConfig {
            angle_limit: 90.0,
            polarity_angle: Polarity::Positive,
            pivot_offset: 0.01,
            ..rig_config()
        };
        let state = OrientationState {
            x: 90.0,
            y: 0.0,
            z: 0.0,
        };
        let pose = solve(&state, &config);
        assert!((pose.position[0] - 0.01).abs() < 1e-12);
        assert!(pose.position[1].abs() < 1e-12);
        assert!((pose.position[2] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_quantize_truncates() {
        assert_eq!(quantize(0.123456, 1000.0), 0.123);
        assert_eq!(quantize(0.1239, 1000.0), 0.123);
        assert_eq!(quantize(-0.1239, 1000.0), -0.123);
        assert_eq!(quantize(0.00004, 20_000.0), 0.0);
    }

    #[test]
    fn test_quantize_idempotent() {
        for &v in &[0.0123456, -0.98765, 3.3333333, 1e-7, 0.00015, -0.04] {
            for &res in &[10_000.0, 20_000.0, 3.0, 7.0] {
                let once = quantize(v, res);
                assert_eq!(quantize(once, res), once, "v={} res={}", v, res);
            }
        }
    }
}
