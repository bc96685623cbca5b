//! Programmatic GLB generation for integration tests.
//!
//! Generates a complete GLB file with:
//! - 3 stacked box segments, one rigid segment per bone (72 vertices, 16 distinct positions)
//! - 3-bone chain skeleton (Root → Spine → Head) with inverse bind matrices
//! - "Wave" animation: 1 second of Z rotations on every bone, rotation channels only
//!
//! Every box face gets its own UV tile, so each face is one UV island.

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use gltf_json as json;
use json::validation::Checked::Valid;

/// Bone count for the test skeleton
pub const BONE_COUNT: usize = 3;
/// Vertices in the mesh (24 per segment)
pub const VERTEX_COUNT: usize = 72;
/// Distinct vertex positions (4 corners at 4 heights)
pub const UNIQUE_POSITIONS: usize = 16;
/// Faces across all segments
pub const FACE_COUNT: usize = 18;
/// Keyframes of the wave animation
pub const KEYFRAME_COUNT: usize = 5;
/// Segment height between bones
pub const SEGMENT_HEIGHT: f32 = 1.0;
/// Half the box width
pub const HALF_WIDTH: f32 = 0.15;

/// Vertex attributes of the test mesh
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub joints: Vec<[u8; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u16>,
}

/// Z rotation of `bone` at normalised time `t`
pub fn wave_angle(bone: usize, t: f32) -> f32 {
    let amplitude = 0.3 + bone as f32 * 0.1;
    (t * TAU + bone as f32 * 0.5).sin() * amplitude
}

fn box_faces(y0: f32, y1: f32) -> [([f32; 3], [[f32; 3]; 4]); 6] {
    let w = HALF_WIDTH;
    [
        // Front (+Z)
        ([0.0, 0.0, 1.0], [[-w, y0, w], [w, y0, w], [w, y1, w], [-w, y1, w]]),
        // Back (-Z)
        ([0.0, 0.0, -1.0], [[w, y0, -w], [-w, y0, -w], [-w, y1, -w], [w, y1, -w]]),
        // Right (+X)
        ([1.0, 0.0, 0.0], [[w, y0, w], [w, y0, -w], [w, y1, -w], [w, y1, w]]),
        // Left (-X)
        ([-1.0, 0.0, 0.0], [[-w, y0, -w], [-w, y0, w], [-w, y1, w], [-w, y1, -w]]),
        // Top (+Y)
        ([0.0, 1.0, 0.0], [[-w, y1, w], [w, y1, w], [w, y1, -w], [-w, y1, -w]]),
        // Bottom (-Y)
        ([0.0, -1.0, 0.0], [[-w, y0, -w], [w, y0, -w], [w, y0, w], [-w, y0, w]]),
    ]
}

/// Create mesh data: 3 stacked boxes, each rigidly skinned to one bone
pub fn create_mesh_data() -> MeshData {
    let mut mesh = MeshData {
        positions: Vec::with_capacity(VERTEX_COUNT),
        normals: Vec::with_capacity(VERTEX_COUNT),
        uvs: Vec::with_capacity(VERTEX_COUNT),
        joints: Vec::with_capacity(VERTEX_COUNT),
        weights: Vec::with_capacity(VERTEX_COUNT),
        indices: Vec::new(),
    };
    let corner_uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    for seg in 0..BONE_COUNT {
        let y0 = seg as f32 * SEGMENT_HEIGHT;
        for (face, (normal, corners)) in box_faces(y0, y0 + SEGMENT_HEIGHT).iter().enumerate() {
            let base = mesh.positions.len() as u16;
            for (corner, [cu, cv]) in corners.iter().zip(corner_uvs) {
                mesh.positions.push(*corner);
                mesh.normals.push(*normal);
                // One tile per face with a gap around it
                mesh.uvs.push([
                    (face as f32 + 0.1 + cu * 0.8) / 6.0,
                    (seg as f32 + 0.1 + cv * 0.8) / BONE_COUNT as f32,
                ]);
                mesh.joints.push([seg as u8, 0, 0, 0]);
                mesh.weights.push([1.0, 0.0, 0.0, 0.0]);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    mesh
}

fn mat4_translate(x: f32, y: f32, z: f32) -> [[f32; 4]; 4] {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [x, y, z, 1.0],
    ]
}

/// Binary buffer with one view and accessor per attribute
#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl BufferBuilder {
    fn push<T: bytemuck::Pod>(
        &mut self,
        items: &[T],
        component: json::accessor::ComponentType,
        type_: json::accessor::Type,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
        target: Option<json::buffer::Target>,
    ) -> json::Index<json::Accessor> {
        let offset = self.data.len();
        self.data.extend_from_slice(bytemuck::cast_slice(items));
        let length = self.data.len() - offset;
        while !self.data.len().is_multiple_of(4) {
            self.data.push(0);
        }

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: length.into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: target.map(Valid),
        });

        let to_value = |values: Vec<f32>| {
            json::Value::Array(values.into_iter().map(json::Value::from).collect())
        };
        let (min, max) = match bounds {
            Some((min, max)) => (Some(to_value(min)), Some(to_value(max))),
            None => (None, None),
        };
        self.accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(self.views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: items.len().into(),
            component_type: Valid(json::accessor::GenericComponentType(component)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        json::Index::new(self.accessors.len() as u32 - 1)
    }
}

fn node(
    name: &str,
    translation: Option<[f32; 3]>,
    children: Option<Vec<json::Index<json::Node>>>,
    mesh_and_skin: bool,
) -> json::Node {
    json::Node {
        camera: None,
        children,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: mesh_and_skin.then(|| json::Index::new(0)),
        name: Some(name.to_string()),
        rotation: None,
        scale: None,
        translation,
        skin: mesh_and_skin.then(|| json::Index::new(0)),
        weights: None,
    }
}

/// Generate the complete skinned GLB
pub fn generate_skinned_glb() -> Vec<u8> {
    use json::accessor::{ComponentType, Type};
    use json::buffer::Target;

    let mesh = create_mesh_data();
    let mut buffer = BufferBuilder::default();

    let (min, max) = mesh.positions.iter().fold(
        (vec![f32::MAX; 3], vec![f32::MIN; 3]),
        |(mut min, mut max), p| {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
            (min, max)
        },
    );
    let positions = buffer.push(
        &mesh.positions,
        ComponentType::F32,
        Type::Vec3,
        Some((min, max)),
        Some(Target::ArrayBuffer),
    );
    let normals = buffer.push(&mesh.normals, ComponentType::F32, Type::Vec3, None, Some(Target::ArrayBuffer));
    let uvs = buffer.push(&mesh.uvs, ComponentType::F32, Type::Vec2, None, Some(Target::ArrayBuffer));
    let joints = buffer.push(&mesh.joints, ComponentType::U8, Type::Vec4, None, Some(Target::ArrayBuffer));
    let weights = buffer.push(&mesh.weights, ComponentType::F32, Type::Vec4, None, Some(Target::ArrayBuffer));
    let indices = buffer.push(
        &mesh.indices,
        ComponentType::U16,
        Type::Scalar,
        None,
        Some(Target::ElementArrayBuffer),
    );

    let inverse_bind: Vec<[[f32; 4]; 4]> = (0..BONE_COUNT)
        .map(|bone| mat4_translate(0.0, -(bone as f32) * SEGMENT_HEIGHT, 0.0))
        .collect();
    let inverse_bind = buffer.push(&inverse_bind, ComponentType::F32, Type::Mat4, None, None);

    let times: Vec<f32> = (0..KEYFRAME_COUNT)
        .map(|k| k as f32 / (KEYFRAME_COUNT - 1) as f32)
        .collect();
    let times = buffer.push(
        &times,
        ComponentType::F32,
        Type::Scalar,
        Some((vec![0.0], vec![1.0])),
        None,
    );

    let mut samplers = Vec::new();
    let mut channels = Vec::new();
    for bone in 0..BONE_COUNT {
        let rotations: Vec<[f32; 4]> = (0..KEYFRAME_COUNT)
            .map(|k| {
                let half = wave_angle(bone, k as f32 / (KEYFRAME_COUNT - 1) as f32) * 0.5;
                [0.0, 0.0, half.sin(), half.cos()] // [x, y, z, w]
            })
            .collect();
        let output = buffer.push(&rotations, ComponentType::F32, Type::Vec4, None, None);

        samplers.push(json::animation::Sampler {
            input: times,
            interpolation: Valid(json::animation::Interpolation::Linear),
            output,
            extensions: Default::default(),
            extras: Default::default(),
        });
        channels.push(json::animation::Channel {
            sampler: json::Index::new(samplers.len() as u32 - 1),
            target: json::animation::Target {
                node: json::Index::new(bone as u32),
                path: Valid(json::animation::Property::Rotation),
                extensions: Default::default(),
                extras: Default::default(),
            },
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    let mut attributes = std::collections::BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), positions);
    attributes.insert(Valid(json::mesh::Semantic::Normals), normals);
    attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uvs);
    attributes.insert(Valid(json::mesh::Semantic::Joints(0)), joints);
    attributes.insert(Valid(json::mesh::Semantic::Weights(0)), weights);

    let root = json::Root {
        accessors: buffer.accessors,
        animations: vec![json::Animation {
            channels,
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("Wave".to_string()),
            samplers,
        }],
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some("vat-bake-test".to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers: vec![json::Buffer {
            byte_length: buffer.data.len().into(),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            uri: None,
        }],
        buffer_views: buffer.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extras: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        images: Vec::new(),
        materials: Vec::new(),
        meshes: vec![json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("TestMesh".to_string()),
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: Default::default(),
                extras: Default::default(),
                indices: Some(indices),
                material: None,
                mode: Valid(json::mesh::Mode::Triangles),
                targets: None,
            }],
            weights: None,
        }],
        nodes: vec![
            node("Root", Some([0.0; 3]), Some(vec![json::Index::new(1)]), false),
            node("Spine", Some([0.0, SEGMENT_HEIGHT, 0.0]), Some(vec![json::Index::new(2)]), false),
            node("Head", Some([0.0, SEGMENT_HEIGHT, 0.0]), None, false),
            node("SkinnedMesh", None, None, true),
        ],
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes: vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("TestScene".to_string()),
            nodes: vec![json::Index::new(0), json::Index::new(3)],
        }],
        skins: vec![json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(inverse_bind),
            joints: (0..BONE_COUNT as u32).map(json::Index::new).collect(),
            name: Some("TestSkeleton".to_string()),
            skeleton: Some(json::Index::new(0)),
        }],
        textures: Vec::new(),
    };

    assemble_glb(&root, &buffer.data)
}

/// Assemble the final GLB binary
fn assemble_glb(root: &json::Root, buffer_data: &[u8]) -> Vec<u8> {
    let json_string = json::serialize::to_string(root).expect("Failed to serialize JSON");
    let json_bytes = json_string.as_bytes();

    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;
    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;
    let total_length = 12 + 8 + json_chunk_length + 8 + buffer_chunk_length;

    let mut glb = Vec::with_capacity(total_length);

    // Header
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    // BIN chunk
    glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat_n(0u8, buffer_padding));

    glb
}

/// Write the test GLB as `rig.glb` into `dir`
pub fn write_skinned_glb(dir: &Path) -> PathBuf {
    let path = dir.join("rig.glb");
    std::fs::write(&path, generate_skinned_glb()).expect("Failed to write GLB");
    path
}
