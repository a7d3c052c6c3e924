//! Scene graph, nodes, skins and meshes

pub mod graph;
pub mod mesh;
pub mod node;
pub mod skin;

pub use graph::SceneGraph;
pub use mesh::{DrawRange, Material, Mesh, Primitive, PrimitiveIndex};
pub use node::{MeshIndex, Node, NodeIndex, SkinIndex};
pub use skin::{Skin, MAX_JOINTS};

/// Structural errors in a node hierarchy or its skins
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A node index does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(NodeIndex),

    /// A node refers to a mesh that does not exist
    #[error("Node {node} refers to missing mesh {mesh}")]
    MeshNotFound {
        /// Referring node
        node: NodeIndex,
        /// Missing mesh
        mesh: MeshIndex,
    },

    /// A primitive index does not exist
    #[error("Primitive not found: {0}")]
    PrimitiveNotFound(PrimitiveIndex),

    /// A skin index does not exist or no node uses it
    #[error("Skin not found: {0}")]
    SkinNotFound(SkinIndex),

    /// Joint and inverse-bind lists differ in length
    #[error("Skin '{skin}' has {joints} joints but {inverse_bind_matrices} inverse-bind matrices")]
    SkinLengthMismatch {
        /// Skin name
        skin: String,
        /// Joint count
        joints: usize,
        /// Inverse-bind matrix count
        inverse_bind_matrices: usize,
    },

    /// A skin joint is not a node
    #[error("Skin '{skin}' refers to missing joint node {joint}")]
    InvalidSkinJoint {
        /// Skin name
        skin: String,
        /// Missing node index
        joint: NodeIndex,
    },

    /// More joints than the shader palette holds
    #[error("Skin '{skin}' has {count} joints, shader palette holds {max}")]
    JointCountExceeded {
        /// Skin name
        skin: String,
        /// Joint count
        count: usize,
        /// Palette capacity
        max: usize,
    },

    /// The global matrix of a skinned node cannot be inverted
    #[error("Global matrix of node {node} is not invertible")]
    SingularMatrix {
        /// Skinned node
        node: NodeIndex,
    },

    /// A node appears in more than one children list
    #[error("Node {node} has more than one parent")]
    MultipleParents {
        /// Offending node
        node: NodeIndex,
    },

    /// Parent links form a loop
    #[error("Hierarchy cycle through node {node}")]
    CyclicHierarchy {
        /// A node on the cycle's path
        node: NodeIndex,
    },

    /// A listed root has a parent
    #[error("Node {node} is listed as a root but has a parent")]
    NotARoot {
        /// Offending node
        node: NodeIndex,
    },
}
