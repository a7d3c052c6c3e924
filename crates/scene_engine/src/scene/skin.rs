//! Skins and joint palettes

use crate::foundation::math::Mat4;
use super::{NodeIndex, SceneError};

/// Length of the joint matrix array declared by the skinning shader
pub const MAX_JOINTS: usize = 256;

/// Joint set plus the inverse-bind matrix of every joint
///
/// `inverse_bind_matrices[i]` belongs to `joints[i]`.
#[derive(Debug, Clone)]
pub struct Skin {
    /// Skin name from the source asset
    pub name: String,
    joints: Vec<NodeIndex>,
    inverse_bind_matrices: Vec<Mat4>,
}

impl Skin {
    /// Create a skin, checking that both lists line up and fit the shader array
    pub fn new(
        name: impl Into<String>,
        joints: Vec<NodeIndex>,
        inverse_bind_matrices: Vec<Mat4>,
    ) -> Result<Self, SceneError> {
        let name = name.into();

        if joints.len() != inverse_bind_matrices.len() {
            return Err(SceneError::SkinLengthMismatch {
                skin: name,
                joints: joints.len(),
                inverse_bind_matrices: inverse_bind_matrices.len(),
            });
        }
        if joints.len() > MAX_JOINTS {
            return Err(SceneError::JointCountExceeded {
                skin: name,
                count: joints.len(),
                max: MAX_JOINTS,
            });
        }

        Ok(Self { name, joints, inverse_bind_matrices })
    }

    /// Joint node indices in palette order
    pub fn joints(&self) -> &[NodeIndex] {
        &self.joints
    }

    /// Inverse-bind matrices, parallel to [`joints`](Self::joints)
    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind_matrices
    }

    /// Number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skin_rejects_length_mismatch() {
        let result = Skin::new("s", vec![0, 1], vec![Mat4::identity()]);
        assert!(matches!(result, Err(SceneError::SkinLengthMismatch { joints: 2, inverse_bind_matrices: 1, .. })));
    }

    #[test]
    fn test_skin_rejects_too_many_joints() {
        let count = MAX_JOINTS + 1;
        let result = Skin::new("s", (0..count).collect(), vec![Mat4::identity(); count]);
        assert!(matches!(result, Err(SceneError::JointCountExceeded { count: 257, .. })));
    }

    #[test]
    fn test_skin_accepts_full_palette() {
        let skin = Skin::new("s", (0..MAX_JOINTS).collect(), vec![Mat4::identity(); MAX_JOINTS]).unwrap();
        assert_eq!(skin.joint_count(), MAX_JOINTS);
        assert_eq!(skin.joints().len(), skin.inverse_bind_matrices().len());
    }
}
