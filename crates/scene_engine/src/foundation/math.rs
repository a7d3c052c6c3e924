//! Math utilities and types
//!
//! Provides the nalgebra-backed types used by the scene graph and the
//! animation evaluator, plus the TRS composition and quaternion helpers they
//! share.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Compose a local matrix as `T · R · S`.
///
/// Column-vector convention: a point is scaled first, then rotated, then
/// translated. `rotation` is a homogeneous rotation matrix.
pub fn compose_trs(translation: &Vec3, rotation: &Mat4, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(translation) * rotation * Mat4::new_nonuniform_scaling(scale)
}

/// Build a unit quaternion from a keyframe vec4 stored as (x, y, z, w).
pub fn quat_from_xyzw(v: &Vec4) -> Quat {
    Quat::new_normalize(Quaternion::new(v.w, v.x, v.y, v.z))
}

/// Shortest-path spherical interpolation between two rotations.
///
/// nalgebra refuses to slerp when the half-angle sine vanishes (nearly equal
/// or opposite inputs); those cases fall back to a normalized lerp on the
/// hemisphere-corrected quaternion.
pub fn slerp_shortest(from: &Quat, to: &Quat, t: f32) -> Quat {
    let to = if from.coords.dot(&to.coords) < 0.0 {
        Quat::new_unchecked(-to.into_inner())
    } else {
        *to
    };

    from.try_slerp(&to, t, 1.0e-6)
        .unwrap_or_else(|| from.nlerp(&to, t))
}

/// Convert a matrix to column-major nested arrays for GPU upload.
pub fn to_cols_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Math utility functions
pub mod utils {
    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Cubic Hermite basis weights `(s0, s1, s2, s3)` for value0, tangent0,
    /// value1, tangent1 at parameter `t`.
    pub fn hermite_weights(t: f32) -> (f32, f32, f32, f32) {
        let t2 = t * t;
        let t3 = t2 * t;

        let s2 = -2.0 * t3 + 3.0 * t2;
        let s3 = t3 - t2;
        let s0 = 1.0 - s2;
        let s1 = s3 - t2 + t;

        (s0, s1, s2, s3)
    }
}
