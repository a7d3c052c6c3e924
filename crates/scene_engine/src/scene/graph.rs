//! Scene graph
//!
//! Nodes live in a flat arena and refer to each other by index. The graph
//! owns the arena, the root list and two lookup tables built once at load:
//! the pre-order node order and the node → primitives map.

use std::collections::{HashMap, HashSet};

use crate::foundation::logging::debug;
use crate::foundation::math::Mat4;
use super::{Mesh, Node, NodeIndex, PrimitiveIndex, SceneError, Skin, SkinIndex, MAX_JOINTS};

/// Node forest with lookup tables
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeIndex>,
    node_lookup: Vec<NodeIndex>,
    primitive_lookup: HashMap<NodeIndex, Vec<PrimitiveIndex>>,
}

impl SceneGraph {
    /// Build a graph from nodes whose `children` lists are filled in
    ///
    /// Parent links are derived from the children lists. An empty `roots`
    /// list means "every node without a parent".
    pub fn new(mut nodes: Vec<Node>, roots: Vec<NodeIndex>, meshes: &[Mesh]) -> Result<Self, SceneError> {
        let count = nodes.len();

        for node in &mut nodes {
            node.parent = None;
        }
        for parent in 0..count {
            let children = nodes[parent].children.clone();
            for child in children {
                let child_node = nodes.get_mut(child).ok_or(SceneError::NodeNotFound(child))?;
                if child_node.parent.is_some() {
                    return Err(SceneError::MultipleParents { node: child });
                }
                child_node.parent = Some(parent);
            }
        }

        // Every parent chain must end within `count` steps.
        for start in 0..count {
            let mut steps = 0;
            let mut current = nodes[start].parent;
            while let Some(parent) = current {
                steps += 1;
                if steps > count {
                    return Err(SceneError::CyclicHierarchy { node: start });
                }
                current = nodes[parent].parent;
            }
        }

        let roots: Vec<NodeIndex> = if roots.is_empty() {
            (0..count).filter(|&index| nodes[index].parent.is_none()).collect()
        } else {
            let mut seen = HashSet::new();
            roots.into_iter().filter(|root| seen.insert(*root)).collect()
        };
        for &root in &roots {
            let node = nodes.get(root).ok_or(SceneError::NodeNotFound(root))?;
            if node.parent.is_some() {
                return Err(SceneError::NotARoot { node: root });
            }
        }

        let mut node_lookup = Vec::with_capacity(count);
        let mut stack: Vec<NodeIndex> = roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            node_lookup.push(index);
            stack.extend(nodes[index].children.iter().rev());
        }

        let mut primitive_lookup = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if let Some(mesh) = node.mesh {
                let mesh_data = meshes
                    .get(mesh)
                    .ok_or(SceneError::MeshNotFound { node: index, mesh })?;
                primitive_lookup.insert(index, mesh_data.primitives.clone());
            }
        }

        debug!(
            "Scene graph built: {} nodes, {} roots, {} reachable",
            count,
            roots.len(),
            node_lookup.len()
        );

        Ok(Self { nodes, roots, node_lookup, primitive_lookup })
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, indexed by [`NodeIndex`]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Root nodes in scene order
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Reachable nodes in pre-order, roots first
    pub fn node_lookup(&self) -> &[NodeIndex] {
        &self.node_lookup
    }

    /// Get a node
    pub fn node(&self, index: NodeIndex) -> Result<&Node, SceneError> {
        self.nodes.get(index).ok_or(SceneError::NodeNotFound(index))
    }

    /// Get a node for mutation
    pub fn node_mut(&mut self, index: NodeIndex) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(index).ok_or(SceneError::NodeNotFound(index))
    }

    /// First node with the given name
    pub fn find_node(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Primitives drawn for a node, empty when the node has no mesh
    pub fn primitives(&self, node: NodeIndex) -> &[PrimitiveIndex] {
        self.primitive_lookup.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Visit every reachable node in pre-order
    pub fn for_each_node<F>(&self, mut f: F)
    where
        F: FnMut(NodeIndex, &Node),
    {
        for &index in &self.node_lookup {
            f(index, &self.nodes[index]);
        }
    }

    /// Product of local matrices from the root down to `index`
    ///
    /// Computed on demand by walking the parent chain.
    pub fn global_matrix(&self, index: NodeIndex) -> Result<Mat4, SceneError> {
        let node = self.node(index)?;
        let mut matrix = *node.local_matrix();
        let mut current = node.parent;
        while let Some(parent) = current {
            let parent_node = &self.nodes[parent];
            matrix = parent_node.local_matrix() * matrix;
            current = parent_node.parent;
        }
        Ok(matrix)
    }

    /// Check that node skin references and skin joints resolve
    pub fn validate_skins(&self, skins: &[Skin]) -> Result<(), SceneError> {
        for node in &self.nodes {
            if let Some(skin) = node.skin {
                if skin >= skins.len() {
                    return Err(SceneError::SkinNotFound(skin));
                }
            }
        }
        for skin in skins {
            if let Some(&joint) = skin.joints().iter().find(|&&joint| joint >= self.nodes.len()) {
                return Err(SceneError::InvalidSkinJoint { skin: skin.name.clone(), joint });
            }
        }
        Ok(())
    }

    /// Recompute the joint palette of every skinned mesh node
    ///
    /// `palette[j] = inverse(global(node)) * global(joint_j) * inverse_bind[j]`
    pub fn update_joints(&mut self, skins: &[Skin]) -> Result<(), SceneError> {
        for position in 0..self.node_lookup.len() {
            let index = self.node_lookup[position];
            let node = &self.nodes[index];
            let skin_index = match (node.mesh, node.skin) {
                (Some(_), Some(skin)) => skin,
                _ => continue,
            };

            let skin = skins.get(skin_index).ok_or(SceneError::SkinNotFound(skin_index))?;
            if skin.joint_count() > MAX_JOINTS {
                return Err(SceneError::JointCountExceeded {
                    skin: skin.name.clone(),
                    count: skin.joint_count(),
                    max: MAX_JOINTS,
                });
            }

            let inverse_global = self
                .global_matrix(index)?
                .try_inverse()
                .ok_or(SceneError::SingularMatrix { node: index })?;

            let palette = skin
                .joints()
                .iter()
                .zip(skin.inverse_bind_matrices())
                .map(|(&joint, inverse_bind)| Ok(inverse_global * self.global_matrix(joint)? * inverse_bind))
                .collect::<Result<Vec<_>, SceneError>>()?;

            self.nodes[index].set_joint_matrices(palette);
        }
        Ok(())
    }

    /// Joint palette of the first mesh node (pre-order) skinned by `skin`
    ///
    /// Only nodes with both a mesh and a skin own a palette, so skin-only
    /// nodes are passed over.
    pub fn joint_matrices(&self, skin: SkinIndex) -> Result<&[Mat4], SceneError> {
        self.node_lookup
            .iter()
            .map(|&index| &self.nodes[index])
            .find(|node| node.mesh.is_some() && node.skin == Some(skin))
            .map(Node::joint_matrices)
            .ok_or(SceneError::SkinNotFound(skin))
    }

    /// [`joint_matrices`](Self::joint_matrices) flattened column-major
    pub fn flattened_joint_matrices(&self, skin: SkinIndex) -> Result<Vec<f32>, SceneError> {
        Ok(self
            .joint_matrices(skin)?
            .iter()
            .flat_map(|matrix| matrix.as_slice().iter().copied())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Vec3};
    use approx::assert_relative_eq;

    fn two_level() -> SceneGraph {
        let root = Node::new("root")
            .with_trs(Vec3::new(0.0, 2.0, 0.0), Quat::from_axis_angle(&Vec3::z_axis(), 0.5), Vec3::new(2.0, 2.0, 2.0))
            .with_child(1);
        let child = Node::new("child").with_trs(Vec3::new(1.0, 0.0, 0.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0));
        SceneGraph::new(vec![root, child], vec![], &[]).unwrap()
    }

    #[test]
    fn test_root_global_equals_local() {
        let graph = two_level();
        assert_eq!(graph.global_matrix(0).unwrap(), *graph.node(0).unwrap().local_matrix());
    }

    #[test]
    fn test_child_global_is_parent_global_times_local() {
        let graph = two_level();
        let expected = graph.global_matrix(0).unwrap() * graph.node(1).unwrap().local_matrix();
        assert_relative_eq!(graph.global_matrix(1).unwrap(), expected, epsilon = 1e-6);
        assert_ne!(graph.global_matrix(1).unwrap(), *graph.node(1).unwrap().local_matrix());
    }

    #[test]
    fn test_parent_links_and_preorder_lookup() {
        // 0 -> [1, 3], 1 -> [2]
        let nodes = vec![
            Node::new("a").with_child(1).with_child(3),
            Node::new("b").with_child(2),
            Node::new("c"),
            Node::new("d"),
        ];
        let graph = SceneGraph::new(nodes, vec![], &[]).unwrap();

        assert_eq!(graph.roots(), &[0]);
        assert_eq!(graph.node_lookup(), &[0, 1, 2, 3]);
        assert_eq!(graph.node(2).unwrap().parent(), Some(1));
        assert_eq!(graph.find_node("d"), Some(3));
    }

    #[test]
    fn test_multiple_parents_rejected() {
        let nodes = vec![Node::new("a").with_child(2), Node::new("b").with_child(2), Node::new("c")];
        let result = SceneGraph::new(nodes, vec![], &[]);
        assert!(matches!(result, Err(SceneError::MultipleParents { node: 2 })));
    }

    #[test]
    fn test_cycle_rejected() {
        let nodes = vec![Node::new("a").with_child(1), Node::new("b").with_child(0)];
        let result = SceneGraph::new(nodes, vec![], &[]);
        assert!(matches!(result, Err(SceneError::CyclicHierarchy { .. })));
    }

    #[test]
    fn test_missing_child_rejected() {
        let result = SceneGraph::new(vec![Node::new("a").with_child(7)], vec![], &[]);
        assert!(matches!(result, Err(SceneError::NodeNotFound(7))));
    }

    #[test]
    fn test_primitive_lookup_follows_mesh() {
        let meshes = vec![Mesh { name: "m".into(), primitives: vec![0, 1] }];
        let nodes = vec![Node::new("a").with_child(1).with_mesh(0), Node::new("b")];
        let graph = SceneGraph::new(nodes, vec![], &meshes).unwrap();

        assert_eq!(graph.primitives(0), &[0, 1]);
        assert!(graph.primitives(1).is_empty());
    }

    #[test]
    fn test_missing_mesh_rejected() {
        let result = SceneGraph::new(vec![Node::new("a").with_mesh(3)], vec![], &[]);
        assert!(matches!(result, Err(SceneError::MeshNotFound { node: 0, mesh: 3 })));
    }

    fn skinned_graph() -> (SceneGraph, Vec<Skin>) {
        // 0: mesh node (skinned), 1: joint root, 2: joint child
        let meshes = vec![Mesh { name: "m".into(), primitives: vec![0] }];
        let nodes = vec![
            Node::new("mesh").with_mesh(0).with_skin(0).with_trs(Vec3::new(0.0, 0.0, 5.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0)),
            Node::new("hip").with_child(2).with_trs(Vec3::new(0.0, 1.0, 0.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0)),
            Node::new("knee").with_trs(Vec3::new(0.0, -0.5, 0.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0)),
        ];
        let graph = SceneGraph::new(nodes, vec![], &meshes).unwrap();

        let inverse_binds = [1, 2]
            .iter()
            .map(|&joint| graph.global_matrix(joint).unwrap().try_inverse().unwrap())
            .collect();
        let skins = vec![Skin::new("skin", vec![1, 2], inverse_binds).unwrap()];
        (graph, skins)
    }

    #[test]
    fn test_joint_matrices_in_bind_pose() {
        let (mut graph, skins) = skinned_graph();
        graph.update_joints(&skins).unwrap();

        // In bind pose each joint matrix reduces to inverse(global(mesh node)).
        let inverse_mesh = graph.global_matrix(0).unwrap().try_inverse().unwrap();
        let palette = graph.joint_matrices(0).unwrap();
        assert_eq!(palette.len(), 2);
        for matrix in palette {
            assert_relative_eq!(*matrix, inverse_mesh, epsilon = 1e-5);
        }
        assert_eq!(graph.flattened_joint_matrices(0).unwrap().len(), 32);
    }

    #[test]
    fn test_joint_matrices_follow_joint_motion() {
        let (mut graph, skins) = skinned_graph();
        graph.node_mut(1).unwrap().set_translation(Vec3::new(3.0, 1.0, 0.0));
        graph.update_joints(&skins).unwrap();

        let inverse_mesh = graph.global_matrix(0).unwrap().try_inverse().unwrap();
        let expected = inverse_mesh * Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(graph.joint_matrices(0).unwrap()[1], expected, epsilon = 1e-5);
    }

    #[test]
    fn test_singular_mesh_node_is_an_error() {
        let (mut graph, skins) = skinned_graph();
        graph.node_mut(0).unwrap().set_scale(Vec3::zeros());
        let result = graph.update_joints(&skins);
        assert!(matches!(result, Err(SceneError::SingularMatrix { node: 0 })));
    }

    #[test]
    fn test_validate_skins_catches_bad_joint() {
        let (graph, _) = skinned_graph();
        let skins = vec![Skin::new("bad", vec![9], vec![Mat4::identity()]).unwrap()];
        assert!(matches!(graph.validate_skins(&skins), Err(SceneError::InvalidSkinJoint { joint: 9, .. })));
    }

    #[test]
    fn test_skin_only_node_does_not_hide_palette() {
        // 0: skin without mesh, listed first in pre-order; 1: skinned mesh; 2: joint
        let meshes = vec![Mesh { name: "m".into(), primitives: vec![0] }];
        let nodes = vec![
            Node::new("skin_only").with_skin(0),
            Node::new("mesh").with_mesh(0).with_skin(0),
            Node::new("joint"),
        ];
        let mut graph = SceneGraph::new(nodes, vec![], &meshes).unwrap();
        let skins = vec![Skin::new("skin", vec![2], vec![Mat4::identity()]).unwrap()];

        graph.update_joints(&skins).unwrap();

        assert!(graph.node(0).unwrap().joint_matrices().is_empty());
        assert_eq!(graph.joint_matrices(0).unwrap().len(), 1);
        assert_eq!(graph.flattened_joint_matrices(0).unwrap().len(), 16);
    }

    #[test]
    fn test_unknown_skin_palette_lookup() {
        let graph = two_level();
        assert!(matches!(graph.joint_matrices(4), Err(SceneError::SkinNotFound(4))));
    }
}
