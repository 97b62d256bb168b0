use crate::rotation::Rotation;
use crate::types::Pose3DoF;
use std::sync::{Mutex, MutexGuard};

/// Angular speeds below this (rad/s) count as no motion.
pub const MIN_ANGULAR_SPEED: f64 = 1e-5;

/// Cumulative head orientation, shared between the reader thread and the renderer.
///
/// Every operation holds the one mutex for a matrix copy or product only,
/// so a reader never sees a half-written rotation.
#[derive(Debug, Default)]
pub struct HeadTracker {
    rotation: Mutex<Rotation>,
}

impl HeadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Rotation> {
        // The guarded value is Copy and written in one assignment.
        self.rotation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return to the power-on reference frame.
    pub fn reset(&self) {
        *self.lock() = Rotation::IDENTITY;
    }

    /// Integrate one body-frame angular velocity sample over `dt` seconds.
    ///
    /// First-order: the delta is a single rotation of `|w| * dt` about `w / |w|`,
    /// applied on the right (`R = R * dR`). Sub-epsilon and non-finite steps
    /// leave the rotation untouched.
    pub fn update(&self, angular_velocity: [f64; 3], dt: f64) {
        let [x, y, z] = angular_velocity;
        let magnitude = (x * x + y * y + z * z).sqrt();
        // Negated so a NaN rate is skipped too.
        if !(magnitude >= MIN_ANGULAR_SPEED) {
            return;
        }
        let angle = magnitude * dt;
        if !magnitude.is_finite() || !angle.is_finite() {
            log::trace!("Dropping non-finite gyro step ({:?}, dt={})", angular_velocity, dt);
            return;
        }
        let axis = [x / magnitude, y / magnitude, z / magnitude];
        let delta = Rotation::from_axis_angle(axis, angle);

        let mut rotation = self.lock();
        *rotation = rotation.mul(&delta).orthonormalized();
    }

    /// Replace the orientation with one reported by the device firmware.
    pub fn set_pose(&self, pose: &Pose3DoF) {
        let rotation = Rotation::from_pose(pose);
        *self.lock() = rotation;
    }

    /// Independent copy of the current orientation.
    pub fn snapshot(&self) -> Rotation {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_starts_at_identity() {
        assert_eq!(HeadTracker::new().snapshot(), Rotation::IDENTITY);
    }

    #[test]
    fn test_reset_returns_identity() {
        let tracker = HeadTracker::new();
        tracker.update([0.3, -1.2, 2.0], 0.5);
        tracker.update([1.0, 0.0, 0.0], 0.25);
        assert_ne!(tracker.snapshot(), Rotation::IDENTITY);
        tracker.reset();
        assert_eq!(tracker.snapshot(), Rotation::IDENTITY);
    }

    #[test]
    fn test_sub_epsilon_rate_is_no_op() {
        let tracker = HeadTracker::new();
        tracker.update([0.0, 0.4, 0.0], 0.1);
        let before = tracker.snapshot();
        tracker.update([5e-6, 0.0, 5e-6], 1.0);
        tracker.update([0.0, 0.0, 0.0], 1.0);
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn test_non_finite_steps_are_dropped() {
        let tracker = HeadTracker::new();
        tracker.update([0.0, 0.4, 0.0], 0.1);
        let before = tracker.snapshot();

        tracker.update([f64::NAN, 0.0, 0.0], 0.01);
        tracker.update([0.0, f64::INFINITY, 0.0], 0.01);
        tracker.update([f64::NEG_INFINITY, 1.0, f64::NAN], 0.01);
        tracker.update([0.0, 0.0, 1.0], f64::NAN);
        tracker.update([0.0, 0.0, 1.0], f64::INFINITY);
        tracker.update([1e300, 1e300, 0.0], 0.01);
        assert_eq!(tracker.snapshot(), before);

        // Still integrates normally afterwards.
        tracker.update([0.0, 0.0, 1.0], 0.01);
        let after = tracker.snapshot();
        assert!(after.is_orthonormal(1e-9));
        assert!(after.max_abs_diff(&before) > 1e-4);
    }

    #[test]
    fn test_one_radian_about_x() {
        let tracker = HeadTracker::new();
        tracker.update([1.0, 0.0, 0.0], 1.0);
        let (s, c) = 1.0f64.sin_cos();
        let want = Rotation {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        };
        assert!(tracker.snapshot().max_abs_diff(&want) < 1e-9);
    }

    #[test]
    fn test_composes_in_body_frame() {
        let tracker = HeadTracker::new();
        tracker.update([std::f64::consts::FRAC_PI_2, 0.0, 0.0], 1.0);
        tracker.update([0.0, 0.5, 0.0], 1.0);

        let rx = Rotation::from_axis_angle([1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2);
        let ry = Rotation::from_axis_angle([0.0, 1.0, 0.0], 0.5);
        assert!(tracker.snapshot().max_abs_diff(&rx.mul(&ry)) < 1e-9);
        assert!(tracker.snapshot().max_abs_diff(&ry.mul(&rx)) > 1e-3);
    }

    #[test]
    fn test_rotation_order_matters() {
        let xy = HeadTracker::new();
        xy.update([0.8, 0.0, 0.0], 1.0);
        xy.update([0.0, 0.8, 0.0], 1.0);

        let yx = HeadTracker::new();
        yx.update([0.0, 0.8, 0.0], 1.0);
        yx.update([0.8, 0.0, 0.0], 1.0);

        assert!(xy.snapshot().max_abs_diff(&yx.snapshot()) > 1e-3);
    }

    #[test]
    fn test_same_axis_steps_accumulate() {
        let tracker = HeadTracker::new();
        for _ in 0..100 {
            tracker.update([0.0, 0.0, 2.0], 0.005);
        }
        let want = Rotation::from_axis_angle([0.0, 0.0, 1.0], 1.0);
        assert!(tracker.snapshot().max_abs_diff(&want) < 1e-9);
    }

    #[test]
    fn test_set_pose_overwrites() {
        let tracker = HeadTracker::new();
        tracker.update([1.0, 1.0, 0.0], 0.3);
        tracker.set_pose(&Pose3DoF {
            yaw_deg: 90.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
        });
        let want = Rotation::from_axis_angle([0.0, 1.0, 0.0], std::f64::consts::FRAC_PI_2);
        assert!(tracker.snapshot().max_abs_diff(&want) < 1e-6);
    }

    #[test]
    fn test_concurrent_snapshots_are_never_torn() {
        let tracker = Arc::new(HeadTracker::new());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                let done = done.clone();
                std::thread::spawn(move || {
                    let mut seen = 0u64;
                    loop {
                        let r = tracker.snapshot();
                        assert!(r.is_orthonormal(1e-9), "torn snapshot: {:?}", r);
                        seen += 1;
                        if done.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                    seen
                })
            })
            .collect();

        for i in 0..20_000u32 {
            let t = i as f64 * 0.01;
            tracker.update([t.sin() * 3.0, t.cos() * 2.0, 1.5], 0.002);
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert!(tracker.snapshot().is_orthonormal(1e-9));
    }
}
