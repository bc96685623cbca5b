//! vat-bake library
//!
//! Bakes skinned mesh animation into vertex animation textures (VAT): grid
//! layout, vertex and bone mapping, per-frame sampling through a pose
//! evaluator, texel encoding, and UV island partitioning for pivot baking.
//!
//! Hosts provide the mesh description, a [`PoseEvaluator`] and output sinks.
//! The bundled glTF source and file sinks back the `vat-bake` CLI.

pub mod bake;
pub mod bone_map;
pub mod error;
pub mod evaluator;
pub mod gltf_source;
pub mod islands;
pub mod mesh;
pub mod profile;
pub mod sampler;
pub mod sink;
pub mod skeleton;
pub mod vertex_map;

// Re-export the bake entry point and its collaborators
pub use bake::{BakeMode, BakeReport, bake};
pub use error::{BakeError, ConfigError, DataIntegrityError, IslandError, PersistenceError};
pub use evaluator::{CaptureSession, ClipInfo, PoseEvaluator};
pub use mesh::{SkinSection, SkinnedLod, SkinnedMesh, SkinnedVertex, SoftSkinVertex};
pub use profile::{AnimationClipSpec, BakeProfile};
pub use sink::{
    FileMeshSink, FileTextureSink, MeshSink, StaticMeshOutput, TextureDesc, TextureRole,
    TextureSink,
};
pub use skeleton::{BoneInfo, ReferenceSkeleton};

// Re-export UV island tooling
pub use islands::{UvIslandGraph, closest_uv_pivot_assign, partition_islands};

// Re-export the glTF source
pub use gltf_source::{GltfEvaluator, GltfRig, LodGeometry, load_gltf_rig};
