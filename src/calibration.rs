use crate::config::DeviceConfig;
use crate::types::{OrientationState, RawSample};

/// Clamp a value to `[-limit, +limit]`.
pub fn clamp_symmetric(value: f64, limit: f64) -> f64 {
    value.clamp(-limit, limit)
}

/// Clamp each axis of `state` to the configured angle limit.
pub fn clamp_state(state: OrientationState, angle_limit: f64) -> OrientationState {
    OrientationState {
        x: clamp_symmetric(state.x, angle_limit),
        y: clamp_symmetric(state.y, angle_limit),
        z: clamp_symmetric(state.z, angle_limit),
    }
}

/// Per-poll delta in degrees.
pub fn scale_sample(sample: &RawSample, angle_scale: f64) -> OrientationState {
    OrientationState {
        x: sample.x / angle_scale,
        y: sample.y / angle_scale,
        z: sample.z / angle_scale,
    }
}

/// Fold one relative reading into the integrated orientation.
///
/// The sensor reports motion since the previous frame, so the delta is added
/// to the running state, then each axis saturates at the angle limit. A
/// non-finite delta (NaN or infinity off a corrupt frame) leaves its axis
/// unchanged.
pub fn integrate(state: &mut OrientationState, sample: &RawSample, config: &DeviceConfig) {
    let delta = scale_sample(sample, config.angle_scale);
    let summed = OrientationState {
        x: accumulate(state.x, delta.x, 'x'),
        y: accumulate(state.y, delta.y, 'y'),
        z: accumulate(state.z, delta.z, 'z'),
    };
    *state = clamp_state(summed, config.angle_limit);
}

fn accumulate(current: f64, delta: f64, axis: char) -> f64 {
    if delta.is_finite() {
        current + delta
    } else {
        log::debug!("Dropping non-finite {} delta: {}", axis, delta);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(angle_scale: f64, angle_limit: f64) -> DeviceConfig {
        DeviceConfig {
            angle_scale,
            angle_limit,
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn test_integration_accumulates() {
        let config = config(15.0, 45.0);
        let samples = [
            RawSample::new(15.0, -30.0, 7.5),
            RawSample::new(30.0, 15.0, -7.5),
            RawSample::new(-7.5, 3.0, 1.5),
        ];
        let mut state = OrientationState::default();
        for s in &samples {
            integrate(&mut state, s, &config);
        }

        let sum = |f: fn(&RawSample) -> f64| samples.iter().map(|s| f(s) / 15.0).sum::<f64>();
        assert!((state.x - sum(|s| s.x)).abs() < 1e-12);
        assert!((state.y - sum(|s| s.y)).abs() < 1e-12);
        assert!((state.z - sum(|s| s.z)).abs() < 1e-12);
    }

    #[test]
    fn test_saturates_at_limit() {
        let config = config(15.0, 45.0);
        let mut state = OrientationState::default();
        for _ in 0..10 {
            integrate(&mut state, &RawSample::new(10_000.0, -10_000.0, 0.0), &config);
            assert!(state.x <= 45.0);
        }
        assert_eq!(state.x, 45.0);
        assert_eq!(state.y, -45.0);

        // Coming back off the stop is immediate, there is no hidden overshoot.
        integrate(&mut state, &RawSample::new(-150.0, 0.0, 0.0), &config);
        assert_eq!(state.x, 35.0);
    }

    #[test]
    fn test_non_finite_delta_is_dropped() {
        let config = config(15.0, 45.0);
        let mut state = OrientationState { x: 5.0, y: -5.0, z: 0.0 };
        integrate(&mut state, &RawSample::new(f64::NAN, f64::INFINITY, 15.0), &config);
        assert_eq!(state, OrientationState { x: 5.0, y: -5.0, z: 1.0 });

        integrate(&mut state, &RawSample::new(f64::NEG_INFINITY, 0.0, f64::NAN), &config);
        assert_eq!(state, OrientationState { x: 5.0, y: -5.0, z: 1.0 });

        integrate(&mut state, &RawSample::new(15.0, 0.0, 0.0), &config);
        assert_eq!(state.x, 6.0);
    }

    #[test]
    fn test_clamp_idempotent() {
        let state = OrientationState {
            x: 100.0,
            y: -0.5,
            z: -46.0,
        };
        let once = clamp_state(state, 45.0);
        let twice = clamp_state(once, 45.0);
        assert_eq!(once, twice);
        assert_eq!(once.x, 45.0);
        assert_eq!(once.y, -0.5);
        assert_eq!(once.z, -45.0);
    }
}
