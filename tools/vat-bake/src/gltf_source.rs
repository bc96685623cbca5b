//! glTF skinned mesh source
//!
//! Loads the first skin of a glTF/GLB file as a [`SkinnedMesh`] and provides
//! a CPU linear-blend-skinning [`PoseEvaluator`] over its animations.
//!
//! - Every mesh node bound to the skin becomes one LOD, in node order, and
//!   each primitive becomes one skin section with an identity bone map.
//! - The skin's joints form both the mesh and the global skeleton. A joint's
//!   parent is its nearest ancestor node that is also a joint.
//! - Node rest transforms are the reference pose; they are expected to match
//!   the inverse bind matrices.
//! - Cubic spline channels are sampled linearly between their keyframe values.

use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec2, Vec3};
use gltf::animation::Interpolation;
use gltf::animation::util::ReadOutputs;
use hashbrown::HashMap;

use crate::evaluator::{ClipInfo, PoseEvaluator};
use crate::mesh::{MAX_INFLUENCES, SkinSection, SkinnedLod, SkinnedMesh, SkinnedVertex, SoftSkinVertex};
use crate::skeleton::{BoneInfo, ReferenceSkeleton};

/// Joints addressable by 8-bit influence indices
const MAX_JOINTS: usize = 256;

/// Triangle list and first UV set of one LOD, for UV island tooling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodGeometry {
    pub indices: Vec<u32>,
    pub uvs: Vec<Vec2>,
}

/// Everything loaded from one glTF file
pub struct GltfRig {
    pub mesh: SkinnedMesh,
    pub evaluator: GltfEvaluator,
    pub geometry: Vec<LodGeometry>,
}

/// Bind-space vertex with normalised influences
#[derive(Debug, Clone, Copy)]
struct SkinBinding {
    position: Vec3,
    normal: Vec3,
    joints: [usize; MAX_INFLUENCES],
    weights: [f32; MAX_INFLUENCES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keying {
    Step,
    Linear,
}

#[derive(Debug, Clone)]
enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

#[derive(Debug, Clone)]
struct BoneChannel {
    bone: usize,
    keying: Keying,
    times: Vec<f32>,
    values: ChannelValues,
}

#[derive(Debug, Clone)]
struct GltfClip {
    name: String,
    duration: f32,
    channels: Vec<BoneChannel>,
}

/// Playback state saved and restored around a capture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GltfEvalState {
    pub animation: Option<usize>,
    pub time: f32,
    pub capturing: bool,
}

/// CPU skinning evaluator over the animations of a glTF file
pub struct GltfEvaluator {
    skeleton: ReferenceSkeleton,
    order: Vec<usize>,
    inverse_bind: Vec<Mat4>,
    lods: Vec<Vec<SkinBinding>>,
    clips: Vec<GltfClip>,
    state: GltfEvalState,
    /// Current skinning matrices, joint global × inverse bind
    skin_matrices: Vec<Mat4>,
}

impl GltfEvaluator {
    /// Animation names in file order
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.iter().map(|c| c.name.as_str())
    }

    pub fn state(&self) -> GltfEvalState {
        self.state
    }

    fn local_pose(&self) -> Vec<Mat4> {
        let mut trs: Vec<(Vec3, Quat, Vec3)> = self
            .skeleton
            .bones
            .iter()
            .map(|b| (b.translation, b.rotation, b.scale))
            .collect();

        if let Some(clip) = self.state.animation.and_then(|i| self.clips.get(i)) {
            let t = self.state.time;
            for channel in &clip.channels {
                let (translation, rotation, scale) = &mut trs[channel.bone];
                match &channel.values {
                    ChannelValues::Translation(values) => {
                        if let Some(v) = sample_vec3(&channel.times, values, t, channel.keying) {
                            *translation = v;
                        }
                    }
                    ChannelValues::Rotation(values) => {
                        if let Some(q) = sample_quat(&channel.times, values, t, channel.keying) {
                            *rotation = q;
                        }
                    }
                    ChannelValues::Scale(values) => {
                        if let Some(v) = sample_vec3(&channel.times, values, t, channel.keying) {
                            *scale = v;
                        }
                    }
                }
            }
        }

        trs.into_iter()
            .map(|(t, r, s)| Mat4::from_scale_rotation_translation(s, r, t))
            .collect()
    }
}

impl PoseEvaluator for GltfEvaluator {
    type State = GltfEvalState;

    fn save_state(&mut self) -> GltfEvalState {
        self.state
    }

    fn restore_state(&mut self, state: GltfEvalState) {
        self.state = state;
        self.refresh_pose();
    }

    fn begin_capture(&mut self) {
        self.state.capturing = true;
    }

    fn clip_info(&self, sequence: &str) -> Option<ClipInfo> {
        self.clips
            .iter()
            .find(|c| c.name == sequence)
            .map(|c| ClipInfo {
                duration: c.duration,
                skeleton: self.skeleton.name.clone(),
            })
    }

    fn set_animation(&mut self, sequence: Option<&str>) {
        self.state.animation = sequence.and_then(|name| {
            let index = self.clips.iter().position(|c| c.name == name);
            if index.is_none() {
                tracing::warn!("Unknown animation '{}', holding reference pose", name);
            }
            index
        });
        self.state.time = 0.0;
    }

    fn set_frame_time(&mut self, seconds: f32) {
        self.state.time = seconds;
    }

    fn refresh_pose(&mut self) {
        let locals = self.local_pose();
        let globals = self.skeleton.accumulate(&self.order, &locals);
        self.skin_matrices = globals
            .iter()
            .zip(&self.inverse_bind)
            .map(|(global, inverse_bind)| *global * *inverse_bind)
            .collect();
    }

    fn skinned_vertices(&self, lod: usize) -> Vec<SkinnedVertex> {
        let Some(bindings) = self.lods.get(lod) else {
            return Vec::new();
        };
        bindings
            .iter()
            .map(|binding| {
                let mut position = Vec3::ZERO;
                let mut normal = Vec3::ZERO;
                for (&joint, &weight) in binding.joints.iter().zip(&binding.weights) {
                    if weight == 0.0 {
                        continue;
                    }
                    let matrix = self.skin_matrices[joint];
                    position += matrix.transform_point3(binding.position) * weight;
                    normal += matrix.transform_vector3(binding.normal) * weight;
                }
                SkinnedVertex::new(position, normal.normalize_or_zero())
            })
            .collect()
    }

    fn ref_to_local(&self) -> Vec<Mat4> {
        self.skin_matrices.clone()
    }
}

// ============================================================================
// Keyframe sampling
// ============================================================================

/// Keyframe index before `t` and the blend factor towards the next one
///
/// `None` for the factor means `t` is past the last keyframe.
fn keyframe_span(times: &[f32], t: f32) -> (usize, Option<f32>) {
    let mut i = 0;
    while i + 1 < times.len() && times[i + 1] < t {
        i += 1;
    }
    if i + 1 >= times.len() {
        return (times.len().saturating_sub(1), None);
    }
    let (t0, t1) = (times[i], times[i + 1]);
    let factor = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
    (i, Some(factor.clamp(0.0, 1.0)))
}

fn sample_keyed<T: Copy>(
    times: &[f32],
    values: &[T],
    t: f32,
    keying: Keying,
    blend: impl Fn(T, T, f32) -> T,
) -> Option<T> {
    if times.is_empty() || values.len() < times.len() {
        return None;
    }
    match keyframe_span(times, t) {
        (i, None) => Some(values[i]),
        (i, Some(factor)) => Some(match keying {
            Keying::Step if factor >= 1.0 => values[i + 1],
            Keying::Step => values[i],
            Keying::Linear => blend(values[i], values[i + 1], factor),
        }),
    }
}

fn sample_vec3(times: &[f32], values: &[Vec3], t: f32, keying: Keying) -> Option<Vec3> {
    sample_keyed(times, values, t, keying, Vec3::lerp)
}

fn sample_quat(times: &[f32], values: &[Quat], t: f32, keying: Keying) -> Option<Quat> {
    sample_keyed(times, values, t, keying, Quat::slerp)
}

/// Keyframe values of a channel, dropping cubic spline tangents
fn keyframe_values<T: Copy>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    let values: Vec<T> = values.collect();
    if cubic {
        values.chunks_exact(3).map(|triplet| triplet[1]).collect()
    } else {
        values
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load the first skin of a glTF/GLB file
pub fn load_gltf_rig(path: &Path) -> Result<GltfRig> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;

    let skin = document
        .skins()
        .next()
        .context("No skins found in glTF file")?;
    let joints: Vec<_> = skin.joints().collect();
    if joints.is_empty() {
        bail!("Skin has no joints");
    }
    if joints.len() > MAX_JOINTS {
        bail!(
            "Skin has {} joints, maximum is {} for 8-bit influences",
            joints.len(),
            MAX_JOINTS
        );
    }

    // Node index -> joint index
    let joint_map: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(i, j)| (j.index(), i))
        .collect();

    let mut node_parent: HashMap<usize, usize> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            node_parent.insert(child.index(), node.index());
        }
    }

    let bones = joints
        .iter()
        .enumerate()
        .map(|(i, joint)| {
            let mut parent = None;
            let mut current = joint.index();
            while let Some(&up) = node_parent.get(&current) {
                if let Some(&joint_index) = joint_map.get(&up) {
                    parent = Some(joint_index);
                    break;
                }
                current = up;
            }

            let (t, r, s) = joint.transform().decomposed();
            BoneInfo {
                name: joint
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("joint_{}", i)),
                parent,
                translation: Vec3::from(t),
                rotation: Quat::from_array(r),
                scale: Vec3::from(s),
            }
        })
        .collect();

    let skeleton_name = skin.name().unwrap_or("skin_0").to_string();
    let skeleton = ReferenceSkeleton::new(skeleton_name.clone(), bones);
    let order = skeleton.evaluation_order()?;

    let inverse_bind: Vec<Mat4> = match skin
        .reader(|buffer| Some(&buffers[buffer.index()]))
        .read_inverse_bind_matrices()
    {
        Some(iter) => iter.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
        None => vec![Mat4::IDENTITY; joints.len()],
    };
    if inverse_bind.len() != joints.len() {
        bail!(
            "Skin has {} joints but {} inverse bind matrices",
            joints.len(),
            inverse_bind.len()
        );
    }

    // One LOD per mesh node bound to this skin
    let mut lods = Vec::new();
    let mut bindings = Vec::new();
    let mut geometry = Vec::new();
    let mut num_tex_coords = None;
    let bone_map: Vec<u16> = (0..joints.len() as u16).collect();

    for node in document.nodes() {
        if node.skin().map(|s| s.index()) != Some(skin.index()) {
            continue;
        }
        let Some(mesh) = node.mesh() else {
            continue;
        };

        let mut sections = Vec::new();
        let mut lod_bindings = Vec::new();
        let mut lod_geometry = LodGeometry::default();

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("No positions in mesh")?
                .collect();
            let count = positions.len();

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_else(|| vec![[0.0; 3]; count]);
            let joint_sets: Vec<[u16; 4]> = reader
                .read_joints(0)
                .map(|iter| iter.into_u16().collect())
                .context("Skinned mesh has no JOINTS_0")?;
            let weight_sets: Vec<[f32; 4]> = reader
                .read_weights(0)
                .map(|iter| iter.into_f32().collect())
                .context("Skinned mesh has no WEIGHTS_0")?;
            let uvs: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().map(Vec2::from).collect())
                .unwrap_or_else(|| vec![Vec2::ZERO; count]);
            check_attribute_counts(
                mesh.name().unwrap_or("unnamed"),
                count,
                &[
                    ("NORMAL", normals.len()),
                    ("JOINTS_0", joint_sets.len()),
                    ("WEIGHTS_0", weight_sets.len()),
                    ("TEXCOORD_0", uvs.len()),
                ],
            )?;

            num_tex_coords.get_or_insert_with(|| {
                primitive
                    .attributes()
                    .filter(|(semantic, _)| matches!(semantic, gltf::Semantic::TexCoords(_)))
                    .count() as u32
            });

            let base = lod_geometry.uvs.len() as u32;
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_else(|| (0..count as u32).collect());
            lod_geometry.uvs.extend(uvs);
            lod_geometry.indices.extend(indices.iter().map(|i| i + base));

            let mut vertices = Vec::with_capacity(count);
            for vertex in 0..count {
                let joint_set = joint_sets[vertex];
                if let Some(&bad) = joint_set.iter().find(|&&j| j as usize >= joints.len()) {
                    bail!(
                        "Joint index {} at vertex {} exceeds skin joint count {}",
                        bad,
                        vertex,
                        joints.len()
                    );
                }

                let weights = normalized_weights(weight_sets[vertex]);
                vertices.push(SoftSkinVertex {
                    influence_bones: joint_set.map(|j| j as u8),
                    influence_weights: weights.map(|w| (w * 255.0).round() as u8),
                });
                lod_bindings.push(SkinBinding {
                    position: Vec3::from(positions[vertex]),
                    normal: Vec3::from(normals[vertex]),
                    joints: joint_set.map(|j| j as usize),
                    weights,
                });
            }

            sections.push(SkinSection {
                bone_map: bone_map.clone(),
                vertices,
            });
        }

        lods.push(SkinnedLod { sections });
        bindings.push(lod_bindings);
        geometry.push(lod_geometry);
    }

    if lods.is_empty() {
        bail!("No mesh nodes use skin '{}'", skeleton_name);
    }

    let clips = load_clips(&document, &buffers, &joint_map)?;

    let mesh_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string();

    tracing::info!(
        "Loaded {:?}: {} LODs, {} joints, {} animations",
        path,
        lods.len(),
        joints.len(),
        clips.len()
    );

    let mut evaluator = GltfEvaluator {
        skeleton: skeleton.clone(),
        order,
        inverse_bind,
        lods: bindings,
        clips,
        state: GltfEvalState::default(),
        skin_matrices: Vec::new(),
    };
    evaluator.refresh_pose();

    Ok(GltfRig {
        mesh: SkinnedMesh {
            name: mesh_name,
            lods,
            num_tex_coords: num_tex_coords.unwrap_or(0),
            skeleton: skeleton.clone(),
            global_skeleton: skeleton,
        },
        evaluator,
        geometry,
    })
}

/// Every per-vertex attribute must have one entry per position
fn check_attribute_counts(mesh: &str, positions: usize, attributes: &[(&str, usize)]) -> Result<()> {
    for &(semantic, count) in attributes {
        if count != positions {
            bail!(
                "Mesh '{}' has {} {} values for {} positions",
                mesh,
                count,
                semantic,
                positions
            );
        }
    }
    Ok(())
}

/// Weights scaled to sum to one, all weight on the first influence if they sum to zero
fn normalized_weights(weights: [f32; 4]) -> [f32; 4] {
    let sum: f32 = weights.iter().sum();
    if sum > 0.0 {
        weights.map(|w| w / sum)
    } else {
        [1.0, 0.0, 0.0, 0.0]
    }
}

fn load_clips(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    joint_map: &HashMap<usize, usize>,
) -> Result<Vec<GltfClip>> {
    let mut clips = Vec::new();

    for (index, animation) in document.animations().enumerate() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{}", index));
        let mut duration = 0.0f32;
        let mut channels = Vec::new();

        for channel in animation.channels() {
            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let times: Vec<f32> = reader
                .read_inputs()
                .with_context(|| format!("Animation '{}' channel has no inputs", name))?
                .collect();
            if let Some(&t) = times.last() {
                duration = duration.max(t);
            }

            // Skip if not a joint in our skin
            let Some(&bone) = joint_map.get(&channel.target().node().index()) else {
                continue;
            };

            let (keying, cubic) = match channel.sampler().interpolation() {
                Interpolation::Step => (Keying::Step, false),
                Interpolation::Linear => (Keying::Linear, false),
                Interpolation::CubicSpline => (Keying::Linear, true),
            };

            let values = match reader
                .read_outputs()
                .with_context(|| format!("Animation '{}' channel has no outputs", name))?
            {
                ReadOutputs::Translations(iter) => {
                    ChannelValues::Translation(keyframe_values(iter.map(Vec3::from), cubic))
                }
                ReadOutputs::Rotations(rotations) => ChannelValues::Rotation(keyframe_values(
                    rotations.into_f32().map(Quat::from_array),
                    cubic,
                )),
                ReadOutputs::Scales(iter) => {
                    ChannelValues::Scale(keyframe_values(iter.map(Vec3::from), cubic))
                }
                ReadOutputs::MorphTargetWeights(_) => continue,
            };

            channels.push(BoneChannel {
                bone,
                keying,
                times,
                values,
            });
        }

        tracing::debug!(
            "Animation '{}': {} joint channels, {:.2}s",
            name,
            channels.len(),
            duration
        );
        clips.push(GltfClip {
            name,
            duration,
            channels,
        });
    }

    Ok(clips)
}
