//! Bake orchestration
//!
//! A bake works on a staged copy of the profile:
//!
//! 1. Validate the profile against the pose evaluator
//! 2. Capture reference-pose positions of every LOD
//! 3. Map vertices and bones onto their grids, checking capacity
//! 4. Assign UV channels and resolve per-LOD bone UVs
//! 5. Sample every clip (full bakes only)
//! 6. Encode and persist textures, then mesh channels
//! 7. Commit the staged profile
//!
//! Any error in steps 1-5 returns before a sink is called and leaves the
//! caller's profile untouched. Sink failures are logged and collected in the
//! report; they never discard computed data.

use glam::{Vec2, Vec3};
use vat_common::{
    Float16Color, GridSize, NORMAL_DELTA_BOUND, VectorEncoding, encode_quat_texture,
    encode_vector_texture,
};

use crate::bone_map::{BoneMapping, LodBoneUvs, map_bones, map_lod_bones};
use crate::error::{BakeError, DataIntegrityError, PersistenceError};
use crate::evaluator::{CaptureSession, PoseEvaluator};
use crate::mesh::SkinnedMesh;
use crate::profile::{BakeProfile, GeneratedBoneAnim, GeneratedOutputs, GeneratedVertexAnim};
use crate::sampler::{SampledAnimation, sample_animations};
use crate::sink::{
    MeshSink, StaticLodOutput, StaticMeshOutput, TextureDesc, TextureRole, TextureSink,
};
use crate::vertex_map::{VertexMapping, map_vertices};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BakeMode {
    /// Map, sample and write textures and mesh channels
    #[default]
    Full,
    /// Map and write mesh channels only
    MeshOnly,
}

/// Summary of a finished bake
#[derive(Debug, Default)]
pub struct BakeReport {
    pub unique_vertices: usize,
    pub vertex_grid: Option<GridSize>,
    pub bone_grid: Option<GridSize>,
    pub vertex_frames: usize,
    /// Bone texture rows written, reference row included
    pub bone_rows: usize,
    /// References returned by the texture sink
    pub textures: Vec<String>,
    pub static_mesh: Option<String>,
    pub persistence_errors: Vec<PersistenceError>,
}

/// Bake `mesh` as configured by `profile`
///
/// On success the profile's generated fields describe the new outputs.
pub fn bake<E, T, M>(
    profile: &mut BakeProfile,
    mesh: &SkinnedMesh,
    evaluator: &mut E,
    textures: &mut T,
    meshes: &mut M,
    mode: BakeMode,
) -> Result<BakeReport, BakeError>
where
    E: PoseEvaluator,
    T: TextureSink + ?Sized,
    M: MeshSink + ?Sized,
{
    profile.validate_against(evaluator)?;
    let mut staged = profile.clone();
    let mut report = BakeReport::default();

    let lod_positions = reference_positions(evaluator, mesh)?;

    let vertex_mapping = if staged.has_vertex_anims() {
        let mapping = map_vertices(&lod_positions, &staged)?;
        staged.generated.vertex.rows_per_frame = mapping.layout.rows_per_frame;
        if staged.auto_size {
            staged.vertex.override_size = mapping.layout.size;
        }
        report.unique_vertices = mapping.unique.len();
        report.vertex_grid = Some(mapping.layout.size);
        Some(mapping)
    } else {
        staged.generated.vertex = GeneratedVertexAnim::default();
        None
    };

    let bone_mapping = if staged.has_bone_anims() {
        let mapping = map_bones(mesh.global_skeleton.bone_count(), &staged)?;
        if staged.auto_size {
            staged.bone.override_size = mapping.layout.size;
        }
        report.bone_grid = Some(mapping.layout.size);
        Some(mapping)
    } else {
        staged.generated.bone = GeneratedBoneAnim::default();
        None
    };

    let lod_bones = match &bone_mapping {
        Some(mapping) => (0..mesh.lods.len())
            .map(|lod| map_lod_bones(mesh, lod, &mapping.bone_uvs))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let channels = staged.uv_channels(mesh.num_tex_coords);
    staged.generated.vertex.uv_channel = channels.vertex;
    staged.generated.bone.uv_channel = channels.bone;
    staged.generated.bone.uv_channel_full = channels.bone_full;

    let sampled = match mode {
        BakeMode::Full => {
            let sampled = sample_animations(
                evaluator,
                &mut staged,
                mesh,
                vertex_mapping.as_ref(),
                bone_mapping.as_ref(),
            )?;
            if vertex_mapping.is_some() {
                staged.generated.vertex.max_value_offset = sampled.max_value_offset;
            }
            if bone_mapping.is_some() {
                staged.generated.bone.max_value_position = sampled.max_value_position;
            }
            report.vertex_frames = sampled.offset_frames.len();
            report.bone_rows = sampled.bone_position_rows.len();
            Some(sampled)
        }
        BakeMode::MeshOnly => None,
    };

    // Everything below only persists; failures are collected, not returned
    if let Some(sampled) = &sampled {
        let encoded = encode_textures(
            &staged,
            vertex_mapping.as_ref(),
            bone_mapping.as_ref(),
            sampled,
        );
        for (role, size, texels) in encoded {
            let name = staged.texture_name(role.suffix());
            let slot = texture_slot(&mut staged.generated, role);
            let desc = TextureDesc {
                name: &name,
                role,
                size,
                existing: slot.as_deref(),
                texels: &texels,
            };
            match textures.write_texture(&desc) {
                Ok(reference) => {
                    report.textures.push(reference.clone());
                    *slot = Some(reference);
                }
                Err(err) => {
                    tracing::warn!("{}", err);
                    report.persistence_errors.push(err);
                }
            }
        }
    }

    let output = static_mesh_output(
        mesh,
        &staged,
        vertex_mapping.map(|m| m.lod_uvs),
        lod_bones,
    );
    match meshes.write_mesh(&output) {
        Ok(reference) => {
            report.static_mesh = Some(reference.clone());
            staged.generated.static_mesh = Some(reference);
        }
        Err(err) => {
            tracing::warn!("{}", err);
            report.persistence_errors.push(err);
        }
    }

    *profile = staged;

    tracing::info!(
        "Baked '{}': {} unique vertices, {} vertex frames, {} bone rows, {} textures",
        profile.name,
        report.unique_vertices,
        report.vertex_frames,
        report.bone_rows,
        report.textures.len()
    );

    Ok(report)
}

/// Reference-pose positions of every LOD, checked against the skin data
fn reference_positions<E: PoseEvaluator>(
    evaluator: &mut E,
    mesh: &SkinnedMesh,
) -> Result<Vec<Vec<Vec3>>, DataIntegrityError> {
    if mesh.lods.is_empty() {
        return Err(DataIntegrityError::MissingLod(0));
    }

    let session = CaptureSession::begin(evaluator);
    mesh.lods
        .iter()
        .enumerate()
        .map(|(lod, skinned)| {
            let vertices = session.skinned_vertices(lod);
            let expected = skinned.vertex_count();
            if vertices.len() != expected {
                return Err(DataIntegrityError::VertexCountMismatch {
                    lod,
                    expected,
                    actual: vertices.len(),
                });
            }
            Ok(vertices.iter().map(|v| v.position).collect())
        })
        .collect()
}

fn texture_slot(generated: &mut GeneratedOutputs, role: TextureRole) -> &mut Option<String> {
    match role {
        TextureRole::Offsets => &mut generated.vertex.offsets_texture,
        TextureRole::Normals => &mut generated.vertex.normals_texture,
        TextureRole::BonePosition => &mut generated.bone.bone_pos_texture,
        TextureRole::BoneRotation => &mut generated.bone.bone_rot_texture,
    }
}

/// Encode sampled buffers into full-size zero-filled payloads
fn encode_textures(
    profile: &BakeProfile,
    vertex: Option<&VertexMapping>,
    bone: Option<&BoneMapping>,
    sampled: &SampledAnimation,
) -> Vec<(TextureRole, GridSize, Vec<Float16Color>)> {
    let mut encoded = Vec::with_capacity(4);

    if let Some(mapping) = vertex {
        let size = mapping.layout.size;
        let offsets = SampledAnimation::flatten(&sampled.offset_frames);
        let normals = SampledAnimation::flatten(&sampled.normal_frames);
        encoded.push((
            TextureRole::Offsets,
            size,
            encode_vector_texture(
                &offsets,
                profile.generated.vertex.max_value_offset,
                VectorEncoding::Hdr,
                size.texel_count(),
            ),
        ));
        encoded.push((
            TextureRole::Normals,
            size,
            encode_vector_texture(
                &normals,
                NORMAL_DELTA_BOUND,
                VectorEncoding::Ldr,
                size.texel_count(),
            ),
        ));
    }

    if let Some(mapping) = bone {
        let size = mapping.layout.size;
        let positions = SampledAnimation::flatten(&sampled.bone_position_rows);
        let rotations = SampledAnimation::flatten(&sampled.bone_rotation_rows);
        encoded.push((
            TextureRole::BonePosition,
            size,
            encode_vector_texture(
                &positions,
                profile.generated.bone.max_value_position,
                VectorEncoding::Hdr,
                size.texel_count(),
            ),
        ));
        encoded.push((
            TextureRole::BoneRotation,
            size,
            encode_quat_texture(&rotations, size.texel_count()),
        ));
    }

    encoded
}

fn static_mesh_output(
    mesh: &SkinnedMesh,
    profile: &BakeProfile,
    vertex_uvs: Option<Vec<Vec<Vec2>>>,
    lod_bones: Vec<LodBoneUvs>,
) -> StaticMeshOutput {
    let mut vertex_uvs = vertex_uvs.map(Vec::into_iter);
    let mut lod_bones = lod_bones.into_iter();
    let lods = (0..mesh.lods.len())
        .map(|_| StaticLodOutput {
            vertex_uvs: vertex_uvs.as_mut().and_then(Iterator::next),
            bone_uvs: lod_bones.next(),
        })
        .collect();

    StaticMeshOutput {
        name: format!("{}_VAT", mesh.name),
        existing: profile.generated.static_mesh.clone(),
        vertex_channel: profile.generated.vertex.uv_channel,
        bone_channel: profile.generated.bone.uv_channel,
        bone_full_channel: profile.generated.bone.uv_channel_full,
        lods,
    }
}
