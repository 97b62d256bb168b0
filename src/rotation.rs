use crate::types::Pose3DoF;

/// A 3x3 row-major rotation matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub m: [[f64; 3]; 3],
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Rotation of `angle` radians about the unit vector `axis` (Rodrigues).
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Rotation {
        let [x, y, z] = axis;
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        Rotation {
            m: [
                [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
                [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
                [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
            ],
        }
    }

    /// Build from firmware yaw/pitch/roll: R = Ry(yaw) * Rx(pitch) * Rz(roll).
    pub fn from_pose(pose: &Pose3DoF) -> Rotation {
        let yaw = Rotation::from_axis_angle([0.0, 1.0, 0.0], (pose.yaw_deg as f64).to_radians());
        let pitch =
            Rotation::from_axis_angle([1.0, 0.0, 0.0], (pose.pitch_deg as f64).to_radians());
        let roll = Rotation::from_axis_angle([0.0, 0.0, 1.0], (pose.roll_deg as f64).to_radians());
        yaw.mul(&pitch).mul(&roll)
    }

    /// Matrix product `self * rhs`.
    pub fn mul(&self, rhs: &Rotation) -> Rotation {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Rotation { m: out }
    }

    pub fn transpose(&self) -> Rotation {
        let m = &self.m;
        Rotation {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Rows unit length and mutually orthogonal, determinant +1, within `tol`.
    pub fn is_orthonormal(&self, tol: f64) -> bool {
        let r = &self.m;
        for i in 0..3 {
            for j in 0..3 {
                let d = dot(r[i], r[j]);
                let want = if i == j { 1.0 } else { 0.0 };
                if (d - want).abs() > tol {
                    return false;
                }
            }
        }
        (self.determinant() - 1.0).abs() <= tol
    }

    /// Largest element-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Rotation) -> f64 {
        let mut max = 0.0f64;
        for i in 0..3 {
            for j in 0..3 {
                max = max.max((self.m[i][j] - other.m[i][j]).abs());
            }
        }
        max
    }

    /// Gram-Schmidt on the rows; pulls accumulated float error back onto SO(3).
    pub fn orthonormalized(&self) -> Rotation {
        let x = normalize(self.m[0]);
        let y = normalize(sub(self.m[1], scale(x, dot(x, self.m[1]))));
        let z = cross(x, y);
        Rotation { m: [x, y, z] }
    }

    /// Euler angles [yaw, pitch, roll] in degrees, inverse of [`Rotation::from_pose`].
    pub fn to_euler_deg(&self) -> [f64; 3] {
        let m = &self.m;
        let pitch = (-m[1][2]).clamp(-1.0, 1.0).asin();
        let (yaw, roll) = if pitch.cos().abs() > 1e-6 {
            (m[0][2].atan2(m[2][2]), m[1][0].atan2(m[1][1]))
        } else {
            // Gimbal lock: fold roll into yaw.
            ((-m[2][0]).atan2(m[0][0]), 0.0)
        };
        [yaw.to_degrees(), pitch.to_degrees(), roll.to_degrees()]
    }

    /// 4x4 homogeneous matrix, column-major, no translation.
    pub fn to_mat4(&self) -> [f32; 16] {
        let m = &self.m;
        let mut out = [0.0f32; 16];
        for col in 0..3 {
            for row in 0..3 {
                out[col * 4 + row] = m[row][col] as f32;
            }
        }
        out[15] = 1.0;
        out
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let len = dot(a, a).sqrt();
    if len > 0.0 {
        scale(a, 1.0 / len)
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_axis_angle_about_x() {
        let r = Rotation::from_axis_angle([1.0, 0.0, 0.0], 1.0);
        let (s, c) = 1.0f64.sin_cos();
        let want = Rotation {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        };
        assert!(r.max_abs_diff(&want) < 1e-12);
        assert!(r.is_orthonormal(1e-12));
    }

    #[test]
    fn test_quarter_turn_about_z_maps_x_to_y() {
        let r = Rotation::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        // First column is the image of the x axis.
        assert!((r.m[0][0]).abs() < 1e-12);
        assert!((r.m[1][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_transpose_is_inverse() {
        let r = Rotation::from_axis_angle([0.0, 0.6, 0.8], 0.7);
        assert!(r.mul(&r.transpose()).max_abs_diff(&Rotation::IDENTITY) < 1e-12);
    }

    #[test]
    fn test_euler_round_trip() {
        let pose = Pose3DoF {
            yaw_deg: 30.0,
            pitch_deg: -20.0,
            roll_deg: 10.0,
        };
        let [yaw, pitch, roll] = Rotation::from_pose(&pose).to_euler_deg();
        assert!((yaw - 30.0).abs() < 1e-4);
        assert!((pitch + 20.0).abs() < 1e-4);
        assert!((roll - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_orthonormalize_repairs_drift() {
        let mut r = Rotation::from_axis_angle([0.0, 1.0, 0.0], 0.3);
        r.m[0][0] += 1e-3;
        r.m[2][1] -= 1e-3;
        assert!(!r.is_orthonormal(1e-6));
        let fixed = r.orthonormalized();
        assert!(fixed.is_orthonormal(1e-12));
        assert!(fixed.max_abs_diff(&r) < 1e-2);
    }

    #[test]
    fn test_mat4_is_column_major() {
        let r = Rotation::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        let m4 = r.to_mat4();
        // Column 0 = (m00, m10, m20, 0)
        assert!((m4[1] - 1.0).abs() < 1e-6);
        // Column 1 = (m01, m11, m21, 0)
        assert!((m4[4] + 1.0).abs() < 1e-6);
        assert_eq!(m4[3], 0.0);
        assert_eq!(m4[12], 0.0);
        assert_eq!(m4[15], 1.0);
    }
}
