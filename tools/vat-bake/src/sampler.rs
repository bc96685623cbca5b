//! Animation sampling
//!
//! Drives the pose evaluator through every configured clip and collects one
//! frame buffer per sampled frame. Vertex clips produce position and normal
//! deltas against the reference pose. Bone clips produce ref-to-local
//! translations and rotations, below a single reference pose row.
//!
//! Frame `f` of a clip with duration `d` and `n` frames is sampled at
//! `f × d / n` seconds, so the last frame stops one step short of the end.

use glam::{Mat4, Quat, Vec3, Vec4};
use vat_common::encoding::{abs_max, sanitize_quat};

use crate::bone_map::BoneMapping;
use crate::error::{BakeError, ConfigError, DataIntegrityError};
use crate::evaluator::{CaptureSession, PoseEvaluator};
use crate::mesh::{SkinnedMesh, SkinnedVertex};
use crate::profile::{AnimationClipSpec, BakeProfile};
use crate::vertex_map::VertexMapping;

/// Everything sampled for one bake, still in float form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledAnimation {
    /// One buffer per vertex frame, `width × rows_per_frame` entries each
    pub offset_frames: Vec<Vec<Vec4>>,
    pub normal_frames: Vec<Vec<Vec4>>,
    /// Reference row followed by one row per bone frame, `width` entries each
    pub bone_position_rows: Vec<Vec<Vec4>>,
    /// Rotations as `(x, y, z, w)`, same layout as the positions
    pub bone_rotation_rows: Vec<Vec<Vec4>>,
    /// Largest absolute offset component
    pub max_value_offset: f32,
    /// Largest absolute bone position component, reference row included
    pub max_value_position: f32,
    /// Rotations that needed renormalising
    pub renormalized_rotations: usize,
}

impl SampledAnimation {
    /// Concatenate frame buffers into one texture payload
    pub fn flatten(frames: &[Vec<Vec4>]) -> Vec<Vec4> {
        frames.iter().flatten().copied().collect()
    }
}

/// Seconds per frame of a clip, and the sequence name it plays
fn clip_timing<E: PoseEvaluator>(
    evaluator: &E,
    clip: &AnimationClipSpec,
) -> Result<(String, f32), ConfigError> {
    let name = clip.sequence.clone().unwrap_or_default();
    let info = evaluator
        .clip_info(&name)
        .ok_or_else(|| ConfigError::UnknownSequence { name: name.clone() })?;
    if !(info.duration > 0.0 && info.duration.is_finite()) {
        return Err(ConfigError::ZeroLengthClip { name });
    }
    Ok((name, info.duration))
}

/// Sample every clip of `profile` through `evaluator`
///
/// `profile` is the staged copy of the bake: each clip's
/// `anim_start_generated` and `speed_generated` are written here, so the
/// generated rows-per-frame must already be set.
pub fn sample_animations<E: PoseEvaluator>(
    evaluator: &mut E,
    profile: &mut BakeProfile,
    mesh: &SkinnedMesh,
    vertex: Option<&VertexMapping>,
    bone: Option<&BoneMapping>,
) -> Result<SampledAnimation, BakeError> {
    let mut session = CaptureSession::begin(evaluator);
    let mut sampled = SampledAnimation::default();

    if let Some(mapping) = vertex {
        sample_vertex_clips(&mut session, profile, mapping, &mut sampled)?;
    }
    if let Some(mapping) = bone {
        sample_bone_clips(&mut session, profile, mesh, mapping, &mut sampled)?;
    }

    if sampled.renormalized_rotations > 0 {
        tracing::warn!(
            "{} bone rotations were not unit length and were renormalised",
            sampled.renormalized_rotations
        );
    }

    tracing::info!(
        "Sampled {} vertex frames and {} bone rows (max offset {:.4}, max bone position {:.4})",
        sampled.offset_frames.len(),
        sampled.bone_position_rows.len(),
        sampled.max_value_offset,
        sampled.max_value_position
    );

    Ok(sampled)
}

fn sample_vertex_clips<E: PoseEvaluator>(
    session: &mut CaptureSession<'_, E>,
    profile: &mut BakeProfile,
    mapping: &VertexMapping,
    sampled: &mut SampledAnimation,
) -> Result<(), BakeError> {
    session.reset_to_ref_pose();
    let reference = session.skinned_vertices(0);
    let expected = mapping.unique.vertex_to_unique.len();
    check_vertex_count(expected, reference.len())?;

    let frame_len = mapping.layout.texels_per_frame();

    for index in 0..profile.vertex.anims.len() {
        let (sequence, duration) = clip_timing(&**session, &profile.vertex.anims[index])?;
        let anim_start = profile.start_height_of_anim_vert(index);
        let clip = &mut profile.vertex.anims[index];
        clip.anim_start_generated = anim_start;
        clip.speed_generated = 1.0 / duration;

        tracing::debug!(
            "Sampling vertex clip '{}' ({} frames from row {})",
            sequence,
            clip.num_frames,
            anim_start
        );

        session.set_animation(Some(&sequence));
        let step = duration / clip.num_frames as f32;
        for frame in 0..clip.num_frames {
            session.pose_at(frame as f32 * step);
            let current = session.skinned_vertices(0);
            check_vertex_count(expected, current.len())?;

            let mut offsets = vec![Vec4::ZERO; frame_len];
            let mut normals = vec![Vec4::ZERO; frame_len];
            for (unique, &source) in mapping.unique.source_ids.iter().enumerate() {
                let (delta, normal_delta) = vertex_delta(&reference[source], &current[source]);
                sampled.max_value_offset = sampled.max_value_offset.max(abs_max(delta));
                offsets[unique] = delta.extend(1.0);
                normals[unique] = normal_delta.extend(1.0);
            }
            sampled.offset_frames.push(offsets);
            sampled.normal_frames.push(normals);
        }
    }

    Ok(())
}

fn vertex_delta(reference: &SkinnedVertex, current: &SkinnedVertex) -> (Vec3, Vec3) {
    (
        current.position - reference.position,
        current.normal - reference.normal,
    )
}

fn check_vertex_count(expected: usize, actual: usize) -> Result<(), DataIntegrityError> {
    if expected != actual {
        return Err(DataIntegrityError::VertexCountMismatch {
            lod: 0,
            expected,
            actual,
        });
    }
    Ok(())
}

fn sample_bone_clips<E: PoseEvaluator>(
    session: &mut CaptureSession<'_, E>,
    profile: &mut BakeProfile,
    mesh: &SkinnedMesh,
    mapping: &BoneMapping,
    sampled: &mut SampledAnimation,
) -> Result<(), BakeError> {
    let bone_count = mesh.skeleton.bone_count();
    let globals = (0..bone_count)
        .map(|bone| mesh.global_bone_of(bone))
        .collect::<Result<Vec<_>, _>>()?;
    let row_len = mapping.layout.size.width as usize;

    // Row 0: component-space reference pose
    let reference = mesh.skeleton.component_space_ref_pose()?;
    push_bone_row(&reference, &globals, row_len, sampled);

    for index in 0..profile.bone.anims.len() {
        let (sequence, duration) = clip_timing(&**session, &profile.bone.anims[index])?;
        let anim_start = profile.start_height_of_anim_bone(index);
        let clip = &mut profile.bone.anims[index];
        clip.anim_start_generated = anim_start;
        clip.speed_generated = 1.0 / duration;

        tracing::debug!(
            "Sampling bone clip '{}' ({} frames from row {})",
            sequence,
            clip.num_frames,
            anim_start
        );

        session.set_animation(Some(&sequence));
        let step = duration / clip.num_frames as f32;
        for frame in 0..clip.num_frames {
            session.pose_at(frame as f32 * step);
            let ref_to_local = session.ref_to_local();
            if ref_to_local.len() != bone_count {
                return Err(DataIntegrityError::BoneCountMismatch {
                    expected: bone_count,
                    actual: ref_to_local.len(),
                }
                .into());
            }
            push_bone_row(&ref_to_local, &globals, row_len, sampled);
        }
    }

    Ok(())
}

/// Write one row of bone translations and rotations at global bone indices
fn push_bone_row(
    transforms: &[Mat4],
    globals: &[usize],
    row_len: usize,
    sampled: &mut SampledAnimation,
) {
    let mut positions = vec![Vec4::ZERO; row_len];
    let mut rotations = vec![Vec4::ZERO; row_len];

    for (transform, &global) in transforms.iter().zip(globals) {
        let origin = transform.w_axis.truncate();
        let (_, rotation, _) = transform.to_scale_rotation_translation();
        let (rotation, renormalized) = sanitize_quat(rotation);
        if renormalized {
            sampled.renormalized_rotations += 1;
        }

        sampled.max_value_position = sampled.max_value_position.max(abs_max(origin));
        positions[global] = origin.extend(1.0);
        rotations[global] = quat_texel(rotation);
    }

    sampled.bone_position_rows.push(positions);
    sampled.bone_rotation_rows.push(rotations);
}

#[inline]
fn quat_texel(q: Quat) -> Vec4 {
    Vec4::new(q.x, q.y, q.z, q.w)
}
