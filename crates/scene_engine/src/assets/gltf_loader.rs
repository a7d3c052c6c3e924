//! glTF 2.0 loader
//!
//! Node indices are the glTF node indices, so skins and animation channels
//! refer to nodes without remapping. Primitives are decoded on the batch
//! worker pool and merged into one vertex and one index array; indices stay
//! relative to their primitive's first vertex.

use std::collections::HashMap;
use std::path::Path;

use gltf::animation::util::ReadOutputs;
use gltf::buffer::Data as BufferData;

use crate::animation::{Animation, AnimationError, Channel, ChannelPath, Interpolation, Sampler};
use crate::core::config::AssetConfig;
use crate::foundation::logging::{debug, warn};
use crate::foundation::math::{quat_from_xyzw, Mat4, Vec3, Vec4};
use crate::model::{Model, ModelParts};
use crate::scene::{Material, Mesh, Node, NodeIndex, Primitive, Skin};
use super::{decode_batches, AssetError, Vertex};

/// Normal used when a primitive has none
const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Loader for `.gltf` and `.glb` files
pub struct GltfLoader;

/// One primitive's geometry before merging
struct DecodedPrimitive {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    material: Option<usize>,
}

impl GltfLoader {
    /// Load and validate a model
    pub fn load<P: AsRef<Path>>(path: P, config: &AssetConfig) -> Result<Model, AssetError> {
        Model::from_parts(Self::load_parts(path, config)?)
    }

    /// Load a file into unvalidated model parts
    pub fn load_parts<P: AsRef<Path>>(path: P, config: &AssetConfig) -> Result<ModelParts, AssetError> {
        let path = path.as_ref();
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)?;

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("model")
            .to_string();

        let nodes = document.nodes().map(|node| load_node(&node)).collect();
        let roots = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .map(|scene| scene.nodes().map(|node| node.index()).collect())
            .unwrap_or_default();

        let (meshes, primitives, vertices, indices) = load_geometry(&document, &buffers, config)?;
        let materials = document.materials().map(|material| load_material(&material)).collect();
        let skins = document
            .skins()
            .map(|skin| load_skin(&skin, &buffers))
            .collect::<Result<_, _>>()?;
        let animations = document
            .animations()
            .map(|animation| load_animation(&animation, &buffers))
            .collect::<Result<_, _>>()?;

        debug!("Parsed glTF '{}' ({} buffers)", path.display(), buffers.len());

        Ok(ModelParts {
            name,
            nodes,
            roots,
            meshes,
            primitives,
            materials,
            skins,
            animations,
            vertices,
            indices,
            texture_count: document.textures().len(),
        })
    }
}

fn buffer_source<'s>(buffers: &'s [BufferData]) -> impl Clone + Fn(gltf::Buffer<'_>) -> Option<&'s [u8]> {
    move |buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice())
}

fn load_node(source: &gltf::Node<'_>) -> Node {
    let name = source
        .name()
        .map_or_else(|| format!("node_{}", source.index()), str::to_string);

    let (translation, rotation, scale) = source.transform().decomposed();
    let mut node = Node::new(name).with_trs(
        Vec3::from(translation),
        quat_from_xyzw(&Vec4::from(rotation)),
        Vec3::from(scale),
    );
    if let gltf::scene::Transform::Matrix { matrix } = source.transform() {
        node.set_matrix(Mat4::from(matrix));
    }

    for child in source.children() {
        node = node.with_child(child.index());
    }
    if let Some(mesh) = source.mesh() {
        node = node.with_mesh(mesh.index());
    }
    if let Some(skin) = source.skin() {
        node = node.with_skin(skin.index());
    }
    node
}

fn load_material(source: &gltf::Material<'_>) -> Material {
    let pbr = source.pbr_metallic_roughness();
    Material {
        name: source.name().unwrap_or("material").to_string(),
        base_color_factor: Vec4::from(pbr.base_color_factor()),
        base_color_texture: pbr.base_color_texture().map(|info| info.texture().index()),
    }
}

type Geometry = (Vec<Mesh>, Vec<Primitive>, Vec<Vertex>, Vec<u32>);

fn load_geometry(
    document: &gltf::Document,
    buffers: &[BufferData],
    config: &AssetConfig,
) -> Result<Geometry, AssetError> {
    let mut meshes = Vec::new();
    let mut jobs = Vec::new();
    for mesh in document.meshes() {
        let first = jobs.len();
        jobs.extend(mesh.primitives().map(|primitive| (mesh.index(), primitive)));
        meshes.push(Mesh {
            name: mesh.name().map_or_else(|| format!("mesh_{}", mesh.index()), str::to_string),
            primitives: (first..jobs.len()).collect(),
        });
    }

    let decoded = decode_batches(&jobs, config, |(mesh, primitive)| decode_primitive(*mesh, primitive, buffers))?;

    let mut primitives = Vec::with_capacity(decoded.len());
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for (index, part) in decoded.into_iter().enumerate() {
        let range = |value: usize| u32::try_from(value).map_err(|_| AssetError::PrimitiveOutOfRange { primitive: index });
        primitives.push(Primitive {
            first_vertex: range(vertices.len())?,
            vertex_count: range(part.vertices.len())?,
            first_index: range(indices.len())?,
            index_count: range(part.indices.len())?,
            material: part.material,
        });
        vertices.extend(part.vertices);
        indices.extend(part.indices);
    }

    Ok((meshes, primitives, vertices, indices))
}

fn check_stride(accessor: &gltf::Accessor<'_>) -> Result<(), AssetError> {
    if let Some(stride) = accessor.view().and_then(|view| view.stride()) {
        if stride < accessor.size() {
            return Err(AssetError::InvalidStride {
                accessor: accessor.index(),
                stride,
                element_size: accessor.size(),
            });
        }
    }
    Ok(())
}

fn decode_primitive(
    mesh: usize,
    primitive: &gltf::Primitive<'_>,
    buffers: &[BufferData],
) -> Result<DecodedPrimitive, AssetError> {
    for (_, accessor) in primitive.attributes() {
        check_stride(&accessor)?;
    }
    if let Some(accessor) = primitive.indices() {
        check_stride(&accessor)?;
    }

    let missing = |attribute: &str| AssetError::MissingAttribute {
        mesh,
        primitive: primitive.index(),
        attribute: attribute.to_string(),
    };

    let reader = primitive.reader(buffer_source(buffers));
    let mut vertices: Vec<Vertex> = reader
        .read_positions()
        .ok_or_else(|| missing("POSITION"))?
        .map(|position| Vertex::new(position, DEFAULT_NORMAL, [0.0, 0.0]))
        .collect();

    if let Some(normals) = reader.read_normals() {
        vertices.iter_mut().zip(normals).for_each(|(v, n)| v.normal = n);
    }
    if let Some(uvs) = reader.read_tex_coords(0) {
        vertices.iter_mut().zip(uvs.into_f32()).for_each(|(v, uv)| v.uv = uv);
    }
    if let Some(joints) = reader.read_joints(0) {
        vertices.iter_mut().zip(joints.into_u16()).for_each(|(v, j)| v.joints = j);
    }
    if let Some(weights) = reader.read_weights(0) {
        vertices.iter_mut().zip(weights.into_f32()).for_each(|(v, w)| v.weights = w);
    }

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => {
            let count = u32::try_from(vertices.len()).map_err(|_| missing("32-bit addressable vertex count"))?;
            (0..count).collect()
        }
    };

    Ok(DecodedPrimitive {
        vertices,
        indices,
        material: primitive.material().index(),
    })
}

fn load_skin(source: &gltf::Skin<'_>, buffers: &[BufferData]) -> Result<Skin, AssetError> {
    let joints: Vec<NodeIndex> = source.joints().map(|joint| joint.index()).collect();
    let inverse_bind_matrices = match source.reader(buffer_source(buffers)).read_inverse_bind_matrices() {
        Some(matrices) => matrices.map(Mat4::from).collect(),
        None => vec![Mat4::identity(); joints.len()],
    };

    let name = source
        .name()
        .map_or_else(|| format!("skin_{}", source.index()), str::to_string);
    Ok(Skin::new(name, joints, inverse_bind_matrices)?)
}

fn channel_path(property: gltf::animation::Property) -> Result<ChannelPath, AnimationError> {
    match property {
        gltf::animation::Property::Translation => Ok(ChannelPath::Translation),
        gltf::animation::Property::Rotation => Ok(ChannelPath::Rotation),
        gltf::animation::Property::Scale => Ok(ChannelPath::Scale),
        gltf::animation::Property::MorphTargetWeights => "weights".parse(),
    }
}

fn interpolation(source: gltf::animation::Interpolation) -> Interpolation {
    match source {
        gltf::animation::Interpolation::Linear => Interpolation::Linear,
        gltf::animation::Interpolation::Step => Interpolation::Step,
        gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
    }
}

fn load_animation(source: &gltf::Animation<'_>, buffers: &[BufferData]) -> Result<Animation, AssetError> {
    let mut samplers = Vec::new();
    let mut channels = Vec::new();
    let mut sampler_lookup: HashMap<usize, usize> = HashMap::new();

    for (index, channel) in source.channels().enumerate() {
        let target = channel.target();
        let path = channel_path(target.property())?;
        let source_sampler = channel.sampler();

        let sampler = match sampler_lookup.get(&source_sampler.index()) {
            Some(&sampler) => sampler,
            None => {
                let missing = |attribute: &str| AssetError::MissingAttribute {
                    mesh: source.index(),
                    primitive: index,
                    attribute: attribute.to_string(),
                };

                let reader = channel.reader(buffer_source(buffers));
                let inputs: Vec<f32> = reader.read_inputs().ok_or_else(|| missing("sampler input"))?.collect();
                let outputs: Vec<Vec4> = match reader.read_outputs().ok_or_else(|| missing("sampler output"))? {
                    ReadOutputs::Translations(values) | ReadOutputs::Scales(values) => {
                        values.map(|[x, y, z]| Vec4::new(x, y, z, 0.0)).collect()
                    }
                    ReadOutputs::Rotations(values) => values.into_f32().map(Vec4::from).collect(),
                    ReadOutputs::MorphTargetWeights(_) => {
                        return Err(AnimationError::UnsupportedPath("weights".to_string()).into());
                    }
                };

                samplers.push(Sampler::new(interpolation(source_sampler.interpolation()), inputs, outputs)?);
                sampler_lookup.insert(source_sampler.index(), samplers.len() - 1);
                samplers.len() - 1
            }
        };

        channels.push(Channel { path, node: target.node().index(), sampler });
    }

    let unused = source.samplers().count() - samplers.len();
    if unused > 0 {
        warn!("Animation {} has {} samplers no channel uses; skipped", source.index(), unused);
    }

    let name = source
        .name()
        .map_or_else(|| format!("animation_{}", source.index()), str::to_string);
    Ok(Animation::new(name, samplers, channels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MAX_JOINTS;
    use approx::assert_relative_eq;

    fn fixture(name: &str) -> String {
        format!("{}/resources/test_models/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn load(name: &str) -> Model {
        GltfLoader::load(fixture(name), &AssetConfig::default()).unwrap()
    }

    #[test]
    fn test_cube_single_node_global_equals_local() {
        let model = load("cube.gltf");

        assert_eq!(model.graph().len(), 1);
        assert_eq!(model.vertices().len(), 24);
        assert_eq!(model.indices().len(), 36);
        assert_eq!(model.graph().roots(), &[0]);

        let node = model.graph().node(0).unwrap();
        assert_relative_eq!(model.global_matrix(0).unwrap(), *node.local_matrix());
    }

    #[test]
    fn test_cube_material_and_texture() {
        let model = load("cube.gltf");

        assert_eq!(model.texture_count(), 1);
        assert_eq!(model.materials().len(), 1);
        assert_eq!(model.materials()[0].base_color_texture, Some(0));
        assert_eq!(model.primitives()[0].material, Some(0));
        assert_eq!(model.primitives()[0].draw_range().index_count, 36);
    }

    #[test]
    fn test_hierarchy_child_global_composes_parent() {
        let model = load("hierarchy.gltf");
        let graph = model.graph();

        let root = graph.find_node("root").unwrap();
        let child = graph.find_node("child").unwrap();
        assert_eq!(graph.node(child).unwrap().parent(), Some(root));

        let root_local = *graph.node(root).unwrap().local_matrix();
        let child_local = *graph.node(child).unwrap().local_matrix();
        let child_global = model.global_matrix(child).unwrap();

        assert!(root_local != Mat4::identity());
        assert!(child_global != child_local);
        assert_relative_eq!(root_local * child_local, child_global, epsilon = 1e-6);
        assert_relative_eq!(model.global_matrix(root).unwrap(), root_local);
    }

    #[test]
    fn test_hierarchy_matrix_transform_is_an_override() {
        let model = load("hierarchy.gltf");
        let root = model.graph().find_node("root").unwrap();
        let node = model.graph().node(root).unwrap();

        assert!(node.has_matrix_override());
        assert_relative_eq!(*node.translation(), Vec3::new(0.0, 2.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_skinned_counts_and_timeline() {
        let model = load("skinned.gltf");

        assert_eq!(model.skins().len(), 1);
        let skin = &model.skins()[0];
        assert_eq!(skin.joint_count(), 19);
        assert_eq!(skin.joints().len(), skin.inverse_bind_matrices().len());
        assert!(skin.joint_count() <= MAX_JOINTS);

        assert_eq!(model.animations().len(), 1);
        let animation = model.animation(0).unwrap();
        assert_eq!(animation.channels().len(), 57);
        assert_eq!(animation.samplers().len(), 57);
        assert_relative_eq!(animation.start_time(), 0.0);
        assert_relative_eq!(animation.end_time(), 1.25);

        let max_input = animation
            .samplers()
            .iter()
            .filter_map(Sampler::last_time)
            .fold(f32::MIN, f32::max);
        assert_relative_eq!(animation.end_time(), max_input);
    }

    #[test]
    fn test_skinned_vertices_carry_joint_data() {
        let model = load("skinned.gltf");

        assert!(model.vertices().iter().all(|v| v.joints.iter().all(|&j| usize::from(j) < 19)));
        for vertex in model.vertices() {
            assert_relative_eq!(vertex.weights.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_skinned_bind_pose_palette_is_identity() {
        let mut model = load("skinned.gltf");
        model.update_joints().unwrap();

        let palette = model.graph().joint_matrices(0).unwrap();
        assert_eq!(palette.len(), 19);
        for matrix in palette {
            assert_relative_eq!(*matrix, Mat4::identity(), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_load_twice_is_identical() {
        let a = load("skinned.gltf");
        let b = load("skinned.gltf");

        assert_eq!(a.graph().len(), b.graph().len());
        assert_eq!(a.graph().roots(), b.graph().roots());
        assert_eq!(a.graph().node_lookup(), b.graph().node_lookup());
        assert_eq!(a.primitives(), b.primitives());
        assert_eq!(a.vertices(), b.vertices());
        assert_eq!(a.indices(), b.indices());

        for (na, nb) in a.graph().nodes().iter().zip(b.graph().nodes()) {
            assert_eq!(na.children(), nb.children());
            assert_eq!(na.parent(), nb.parent());
            let bits_a: Vec<u32> = na.local_matrix().iter().map(|x| x.to_bits()).collect();
            let bits_b: Vec<u32> = nb.local_matrix().iter().map(|x| x.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn test_parallel_decode_matches_serial() {
        let serial = AssetConfig::default().with_loader_threads(1);
        let parallel = AssetConfig::default().with_loader_threads(4).with_vertex_batch_size(1);

        let a = GltfLoader::load(fixture("skinned.gltf"), &serial).unwrap();
        let b = GltfLoader::load(fixture("skinned.gltf"), &parallel).unwrap();
        assert_eq!(a.primitives(), b.primitives());
        assert_eq!(a.vertices(), b.vertices());
        assert_eq!(a.indices(), b.indices());
    }

    #[test]
    fn test_skinned_animation_plays_through_model() {
        let mut model = load("skinned.gltf");
        let end = model.animation(0).unwrap().end_time();

        model.advance(0, end).unwrap();
        assert_relative_eq!(model.animation(0).unwrap().current_time(), 0.0);

        model.advance(0, 0.6).unwrap();
        model.update_joints().unwrap();
        assert_relative_eq!(model.animation(0).unwrap().current_time(), 0.6, epsilon = 1e-6);
        assert_eq!(model.graph().joint_matrices(0).unwrap().len(), 19);
    }

    #[test]
    fn test_stride_smaller_than_element_is_rejected() {
        let result = GltfLoader::load(fixture("bad_stride.gltf"), &AssetConfig::default());
        assert!(matches!(
            result,
            Err(AssetError::InvalidStride { accessor: 0, stride: 8, element_size: 12 })
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = GltfLoader::load(fixture("missing.gltf"), &AssetConfig::default());
        assert!(matches!(result, Err(AssetError::Gltf(_))));
    }
}
