//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the TRS helpers the transform cache needs:
//! composing a local matrix and decomposing a world matrix back into
//! translation, rotation and scale.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (T * R * S)
    pub fn to_matrix(&self) -> Mat4 {
        trs_matrix(&self.position, &self.rotation, &self.scale)
    }

    /// Same as [`Transform::to_matrix`] with the scale forced to one
    pub fn to_unscaled_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position) * self.rotation.to_homogeneous()
    }

    /// Create a transform from a transformation matrix
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let scale = decompose_scale(matrix);
        Self {
            position: decompose_translation(matrix),
            rotation: decompose_rotation(matrix, &scale),
            scale,
        }
    }
}

/// Build a T * R * S matrix
pub fn trs_matrix(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position)
        * rotation.to_homogeneous()
        * Mat4::new_nonuniform_scaling(scale)
}

/// Extract the translation column of an affine matrix
pub fn decompose_translation(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Extract per-axis scale as the length of each basis column
pub fn decompose_scale(matrix: &Mat4) -> Vec3 {
    Vec3::new(
        matrix.fixed_view::<3, 1>(0, 0).norm(),
        matrix.fixed_view::<3, 1>(0, 1).norm(),
        matrix.fixed_view::<3, 1>(0, 2).norm(),
    )
}

/// Extract rotation from an affine matrix whose scale is already known.
///
/// A zero scale component leaves that basis column as-is; the result for such
/// degenerate matrices is unspecified.
pub fn decompose_rotation(matrix: &Mat4, scale: &Vec3) -> Quat {
    let mut basis: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    for axis in 0..3 {
        let s = scale[axis];
        if s != 0.0 {
            let mut column = basis.column_mut(axis);
            column /= s;
        }
    }
    Quat::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(basis))
}

/// Rotation whose forward axis (-Z) points along `look` with `up` as the up hint
pub fn look_rotation(look: &Vec3, up: &Vec3) -> Quat {
    Quat::face_towards(&-look, up)
}

/// Ray with a normalized direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin in world space
    pub origin: Vec3,
    /// Unit-length direction
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray, normalizing the direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point at `distance` along the ray
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Canonical direction vectors (Y-up right-handed, forward is -Z)
pub mod directions {
    use super::Vec3;

    /// -Z
    pub fn forward() -> Vec3 {
        Vec3::new(0.0, 0.0, -1.0)
    }

    /// +Z
    pub fn back() -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }

    /// +X
    pub fn right() -> Vec3 {
        Vec3::new(1.0, 0.0, 0.0)
    }

    /// -X
    pub fn left() -> Vec3 {
        Vec3::new(-1.0, 0.0, 0.0)
    }

    /// +Y
    pub fn up() -> Vec3 {
        Vec3::new(0.0, 1.0, 0.0)
    }

    /// -Y
    pub fn down() -> Vec3 {
        Vec3::new(0.0, -1.0, 0.0)
    }
}

/// Math utility functions
pub mod utils {
    use super::Vec3;

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// Linear interpolation between two vectors
    pub fn lerp(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
        a + (b - a) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_matrix_roundtrip_consistency() {
        let original = Transform {
            position: Vec3::new(1.0, -2.0, 3.5),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), PI / 3.0),
            scale: Vec3::new(2.0, 0.5, 1.5),
        };

        let reconstructed = Transform::from_matrix(&original.to_matrix());

        assert_relative_eq!(reconstructed.position, original.position, epsilon = EPSILON);
        assert_relative_eq!(reconstructed.scale, original.scale, epsilon = EPSILON);
        assert_relative_eq!(
            reconstructed.rotation.angle_to(&original.rotation),
            0.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_unscaled_matrix_ignores_scale() {
        let transform = Transform {
            position: Vec3::new(4.0, 0.0, 0.0),
            rotation: Quat::identity(),
            scale: Vec3::new(3.0, 3.0, 3.0),
        };

        let unscaled = transform.to_unscaled_matrix();
        assert_relative_eq!(decompose_scale(&unscaled), Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(decompose_translation(&unscaled), transform.position, epsilon = EPSILON);
    }

    #[test]
    fn test_look_rotation_points_forward_along_look() {
        let look = Vec3::new(1.0, 0.0, 0.0);
        let rotation = look_rotation(&look, &directions::up());

        assert_relative_eq!(rotation * directions::forward(), look, epsilon = EPSILON);
    }

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -5.0));
        assert_relative_eq!(ray.point_at(2.0), Vec3::new(0.0, 0.0, -2.0), epsilon = EPSILON);
    }
}
