//! Transform node
//!
//! A node carries its local TRS state, an optional raw matrix supplied by
//! the source asset, and the cached local matrix derived from either.

use crate::foundation::math::{compose_trs, Mat4, Quat, Vec3};

/// Index of a node within its model's node arena
pub type NodeIndex = usize;
/// Index of a mesh within its model
pub type MeshIndex = usize;
/// Index of a skin within its model
pub type SkinIndex = usize;

/// A single node in the scene hierarchy
///
/// Parent and children are arena indices; the parent logically owns its
/// children. Hierarchy links are wired by [`SceneGraph`](super::SceneGraph)
/// and never change after load.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name from the source asset
    pub name: String,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) children: Vec<NodeIndex>,
    /// Attached mesh
    pub mesh: Option<MeshIndex>,
    /// Skin deforming the attached mesh
    pub skin: Option<SkinIndex>,

    translation: Vec3,
    rotation: Mat4,
    scale: Vec3,
    matrix: Option<Mat4>,
    local_matrix: Mat4,

    joint_matrices: Vec<Mat4>,
}

impl Node {
    /// Create a node with an identity transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            mesh: None,
            skin: None,
            translation: Vec3::zeros(),
            rotation: Mat4::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            matrix: None,
            local_matrix: Mat4::identity(),
            joint_matrices: Vec::new(),
        }
    }

    /// Add a child index; the graph fills in the child's parent link
    pub fn with_child(mut self, child: NodeIndex) -> Self {
        self.children.push(child);
        self
    }

    /// Attach a mesh
    pub fn with_mesh(mut self, mesh: MeshIndex) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Attach a skin
    pub fn with_skin(mut self, skin: SkinIndex) -> Self {
        self.skin = Some(skin);
        self
    }

    /// Set the local TRS in one step
    pub fn with_trs(mut self, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        self.translation = translation;
        self.rotation = rotation.to_homogeneous();
        self.scale = scale;
        self.matrix = None;
        self.update_local_matrix();
        self
    }

    /// Parent index, `None` for roots
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Child indices in source order
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Local translation
    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }

    /// Local rotation as a homogeneous matrix
    pub fn rotation(&self) -> &Mat4 {
        &self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> &Vec3 {
        &self.scale
    }

    /// Cached local matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// Whether the local matrix comes from a raw source matrix
    pub fn has_matrix_override(&self) -> bool {
        self.matrix.is_some()
    }

    /// Joint palette computed by the last joint update
    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Set the local translation. Drops any raw matrix override.
    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.matrix = None;
        self.update_local_matrix();
    }

    /// Set the local rotation. Drops any raw matrix override.
    pub fn set_rotation(&mut self, rotation: &Quat) {
        self.rotation = rotation.to_homogeneous();
        self.matrix = None;
        self.update_local_matrix();
    }

    /// Set the local scale. Drops any raw matrix override.
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.matrix = None;
        self.update_local_matrix();
    }

    /// Use a raw matrix as the local transform
    ///
    /// The TRS fields are left as they are, so a later TRS write starts from
    /// them rather than from a decomposition of `matrix`.
    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = Some(matrix);
        self.update_local_matrix();
    }

    /// Recompute the cached local matrix
    pub fn update_local_matrix(&mut self) {
        self.local_matrix = match self.matrix {
            Some(matrix) => matrix,
            None => compose_trs(&self.translation, &self.rotation, &self.scale),
        };
    }

    pub(crate) fn set_joint_matrices(&mut self, palette: Vec<Mat4>) {
        self.joint_matrices = palette;
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}
