//! Wavefront OBJ loader
//!
//! Produces a single-node model with one mesh and one primitive. Every face
//! corner becomes its own vertex; polygons are fan-triangulated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::foundation::logging::debug;
use crate::model::{Model, ModelParts};
use crate::scene::{Mesh, Node, Primitive};
use super::{AssetError, Vertex};

/// Loader for `.obj` files
pub struct ObjLoader;

#[derive(Default)]
struct ObjData {
    name: Option<String>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl ObjLoader {
    /// Load and validate a model
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Model, AssetError> {
        Model::from_parts(Self::load_parts(path)?)
    }

    /// Load a file into unvalidated model parts
    pub fn load_parts<P: AsRef<Path>>(path: P) -> Result<ModelParts, AssetError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let fallback = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("model")
            .to_string();

        let mut parts = Self::parse(BufReader::new(file))?;
        parts.name = fallback;
        debug!(
            "Parsed OBJ '{}': {} vertices, {} indices",
            path.display(),
            parts.vertices.len(),
            parts.indices.len()
        );
        Ok(parts)
    }

    /// Parse OBJ text from any reader
    pub fn parse<R: BufRead>(reader: R) -> Result<ModelParts, AssetError> {
        let mut data = ObjData::default();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            let args: Vec<&str> = parts.collect();
            let line_number = number + 1;

            match keyword {
                "v" => data.positions.push(parse_floats(&args, line_number, "vertex")?),
                "vn" => data.normals.push(parse_floats(&args, line_number, "normal")?),
                "vt" => data.tex_coords.push(parse_floats(&args, line_number, "texture coordinate")?),
                "f" => data.add_face(&args, line_number)?,
                "o" | "g" => {
                    if data.name.is_none() {
                        data.name = args.first().map(|name| (*name).to_string());
                    }
                }
                // Materials, smoothing groups and the like carry nothing we bind.
                _ => {}
            }
        }

        if data.vertices.is_empty() {
            return Err(AssetError::Parse { line: 0, message: "no faces found".to_string() });
        }

        let to_u32 = |count: usize| {
            u32::try_from(count).map_err(|_| AssetError::PrimitiveOutOfRange { primitive: 0 })
        };
        let primitive = Primitive {
            first_vertex: 0,
            vertex_count: to_u32(data.vertices.len())?,
            first_index: 0,
            index_count: to_u32(data.indices.len())?,
            material: None,
        };
        let mesh_name = data.name.unwrap_or_else(|| "mesh".to_string());

        Ok(ModelParts {
            name: mesh_name.clone(),
            nodes: vec![Node::new(mesh_name.clone()).with_mesh(0)],
            roots: vec![0],
            meshes: vec![Mesh { name: mesh_name, primitives: vec![0] }],
            primitives: vec![primitive],
            vertices: data.vertices,
            indices: data.indices,
            ..ModelParts::default()
        })
    }
}

fn parse_floats<const N: usize>(args: &[&str], line: usize, what: &str) -> Result<[f32; N], AssetError> {
    if args.len() < N {
        return Err(AssetError::Parse {
            line,
            message: format!("{} needs {} components, got {}", what, N, args.len()),
        });
    }

    let mut values = [0.0; N];
    for (value, arg) in values.iter_mut().zip(args) {
        *value = arg.parse().map_err(|_| AssetError::Parse {
            line,
            message: format!("invalid {} component '{}'", what, arg),
        })?;
    }
    Ok(values)
}

/// Resolve a 1-based (or negative, relative) OBJ index
fn resolve_index(raw: &str, count: usize, line: usize) -> Result<usize, AssetError> {
    let invalid = || AssetError::Parse { line, message: format!("invalid index '{}'", raw) };
    let index: i64 = raw.parse().map_err(|_| invalid())?;

    let resolved = match index {
        0 => return Err(invalid()),
        i if i > 0 => usize::try_from(i - 1).map_err(|_| invalid())?,
        i => count.checked_sub(usize::try_from(-i).map_err(|_| invalid())?).ok_or_else(invalid)?,
    };

    if resolved >= count {
        return Err(AssetError::Parse {
            line,
            message: format!("index {} out of bounds ({} available)", raw, count),
        });
    }
    Ok(resolved)
}

impl ObjData {
    fn add_face(&mut self, args: &[&str], line: usize) -> Result<(), AssetError> {
        if args.len() < 3 {
            return Err(AssetError::Parse {
                line,
                message: format!("face needs at least 3 corners, got {}", args.len()),
            });
        }

        let first = self.vertices.len();
        for corner in args {
            let mut fields = corner.split('/');
            let position = match fields.next() {
                Some(raw) => self.positions[resolve_index(raw, self.positions.len(), line)?],
                None => continue,
            };
            let uv = match fields.next().filter(|raw| !raw.is_empty()) {
                Some(raw) => self.tex_coords[resolve_index(raw, self.tex_coords.len(), line)?],
                None => [0.0, 0.0],
            };
            let normal = match fields.next().filter(|raw| !raw.is_empty()) {
                Some(raw) => self.normals[resolve_index(raw, self.normals.len(), line)?],
                None => [0.0, 1.0, 0.0],
            };
            self.vertices.push(Vertex::new(position, normal, uv));
        }

        let to_u32 = |index: usize| {
            u32::try_from(index).map_err(|_| AssetError::Parse { line, message: "too many vertices".to_string() })
        };
        for i in first + 1..self.vertices.len() - 1 {
            self.indices.push(to_u32(first)?);
            self.indices.push(to_u32(i)?);
            self.indices.push(to_u32(i + 1)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
# unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let parts = ObjLoader::parse(Cursor::new(QUAD)).unwrap();

        assert_eq!(parts.vertices.len(), 4);
        assert_eq!(parts.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(parts.vertices[2].uv, [1.0, 1.0]);
        assert_eq!(parts.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(parts.meshes[0].name, "quad");
    }

    #[test]
    fn test_quad_builds_single_node_model() {
        let model = Model::from_parts(ObjLoader::parse(Cursor::new(QUAD)).unwrap()).unwrap();

        assert_eq!(model.graph().len(), 1);
        assert_eq!(model.graph().roots(), &[0]);
        assert_eq!(model.draw_range(0).unwrap().index_count, 6);
    }

    #[test]
    fn test_negative_indices_are_relative() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let parts = ObjLoader::parse(Cursor::new(text)).unwrap();
        assert_eq!(parts.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(parts.vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bad_index_reports_line() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        let result = ObjLoader::parse(Cursor::new(text));
        assert!(matches!(result, Err(AssetError::Parse { line: 4, .. })));
    }

    #[test]
    fn test_bad_float_reports_line() {
        let text = "v 0 0 0\nv 1 x 0\n";
        let result = ObjLoader::parse(Cursor::new(text));
        assert!(matches!(result, Err(AssetError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_no_faces_is_error() {
        let result = ObjLoader::parse(Cursor::new("v 0 0 0\n"));
        assert!(matches!(result, Err(AssetError::Parse { .. })));
    }

    #[test]
    fn test_fixture_file_loads() {
        let path = format!("{}/resources/test_models/triangle.obj", env!("CARGO_MANIFEST_DIR"));
        let model = ObjLoader::load(path).unwrap();
        assert_eq!(model.name, "triangle");
        assert_eq!(model.vertices().len(), 3);
        assert_eq!(model.indices().len(), 3);
    }
}
