//! Bone grid mapping and per-vertex bone UVs
//!
//! Every bone of the global skeleton owns one texel per row, in global bone
//! order, whether or not a LOD skins to it. Vertices then reference their
//! influence bones through the U coordinate of those texels.

use glam::Vec2;
use vat_common::{BoneGridLayout, GridKind, grid_uvs};

use crate::error::{BakeError, ConfigError, DataIntegrityError};
use crate::mesh::{MAX_INFLUENCES, SkinnedMesh};
use crate::profile::BakeProfile;

#[derive(Debug, Clone, PartialEq)]
pub struct BoneMapping {
    pub layout: BoneGridLayout,
    /// Texel-centre UV of each global bone
    pub bone_uvs: Vec<Vec2>,
}

/// Lay out `bone_count` global bones on the bone texture grid
pub fn map_bones(bone_count: usize, profile: &BakeProfile) -> Result<BoneMapping, BakeError> {
    let override_size = profile.bone.override_size;
    if !profile.auto_size && override_size.width == 0 {
        return Err(ConfigError::InvalidOverrideSize {
            list: GridKind::Bone,
            size: override_size,
        }
        .into());
    }

    let bone_count = bone_count as u32;
    let total_frames = profile.total_frames_bone();
    let layout = BoneGridLayout::plan(
        bone_count,
        total_frames,
        profile.auto_size,
        profile.max_width,
        override_size,
    );
    layout.check_capacity(bone_count, total_frames)?;

    tracing::info!("Mapped {} bones ({} grid)", bone_count, layout.size);

    Ok(BoneMapping {
        layout,
        bone_uvs: grid_uvs(bone_count, layout.size),
    })
}

/// Bone UV channels and weight colours of one LOD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodBoneUvs {
    /// U of influences 0 and 1
    pub uv1: Vec<Vec2>,
    /// U of influences 2 and 3
    pub uv2: Vec<Vec2>,
    /// Influence weights as RGBA8
    pub colors: Vec<[u8; 4]>,
}

/// Resolve every vertex influence of `lod` to its global bone texel
pub fn map_lod_bones(
    mesh: &SkinnedMesh,
    lod: usize,
    bone_uvs: &[Vec2],
) -> Result<LodBoneUvs, DataIntegrityError> {
    let skinned_lod = mesh.lod(lod)?;
    let count = skinned_lod.vertex_count();
    let mut out = LodBoneUvs {
        uv1: Vec::with_capacity(count),
        uv2: Vec::with_capacity(count),
        colors: Vec::with_capacity(count),
    };

    for (section, vertex) in skinned_lod.soft_vertices() {
        let mut u = [0.0f32; MAX_INFLUENCES];
        for (slot, &local_bone) in vertex.influence_bones.iter().enumerate() {
            let global = mesh.resolve_global_bone(lod, section, local_bone)?;
            u[slot] = bone_uvs
                .get(global)
                .ok_or(DataIntegrityError::InvalidBoneIndex {
                    index: global,
                    count: bone_uvs.len(),
                })?
                .x;
        }
        out.uv1.push(Vec2::new(u[0], u[1]));
        out.uv2.push(Vec2::new(u[2], u[3]));
        out.colors.push(skin_weight_color(vertex.influence_weights));
    }

    Ok(out)
}

/// Linear RGBA8 of four 8-bit weights, shortfall from 1.0 added to the first
#[inline]
pub fn skin_weight_color(weights: [u8; MAX_INFLUENCES]) -> [u8; 4] {
    let mut w = weights.map(|w| w as f32 / 255.0);
    w[0] += 1.0 - w.iter().sum::<f32>();
    w.map(|c| (c.clamp(0.0, 1.0) * 255.999) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{SkinSection, SkinnedLod, SoftSkinVertex};
    use crate::profile::AnimationClipSpec;
    use crate::skeleton::{BoneInfo, ReferenceSkeleton};
    use vat_common::{CapacityError, GridSize};

    fn bone_profile(frames: u32) -> BakeProfile {
        let mut profile = BakeProfile::default();
        profile.bone.anims.push(AnimationClipSpec::new("run", frames));
        profile
    }

    fn skeleton(names: &[&str]) -> ReferenceSkeleton {
        let bones = names
            .iter()
            .enumerate()
            .map(|(i, name)| BoneInfo::new(*name, i.checked_sub(1)))
            .collect();
        ReferenceSkeleton::new("rig", bones)
    }

    #[test]
    fn test_bone_layout_minimum_width() {
        let mapping = map_bones(3, &bone_profile(8)).unwrap();
        assert_eq!(mapping.layout.size, GridSize::new(8, 16));
        assert_eq!(mapping.bone_uvs.len(), 3);
        assert_eq!(mapping.bone_uvs[2], Vec2::new(2.5 / 8.0, 0.5 / 16.0));
    }

    #[test]
    fn test_bone_layout_too_many_bones_for_manual_width() {
        let mut profile = bone_profile(4);
        profile.auto_size = false;
        profile.bone.override_size = GridSize::new(8, 8);
        assert!(matches!(
            map_bones(9, &profile),
            Err(BakeError::Capacity(CapacityError::RowOverflow {
                entries: 9,
                capacity: 8,
                ..
            }))
        ));
    }

    #[test]
    fn test_bone_layout_huge_frame_counts() {
        let mut profile = bone_profile(u32::MAX);
        profile.bone.anims.push(AnimationClipSpec::new("walk", 10));
        assert!(matches!(
            map_bones(3, &profile),
            Err(BakeError::Capacity(CapacityError::HeightExceeded {
                required: u32::MAX,
                ..
            }))
        ));
    }

    #[test]
    fn test_skin_weight_color() {
        assert_eq!(skin_weight_color([255, 0, 0, 0]), [255, 0, 0, 0]);
        assert_eq!(skin_weight_color([128, 127, 0, 0]), [128, 127, 0, 0]);
        // 55 missing from the total goes to the first weight
        assert_eq!(skin_weight_color([100, 100, 0, 0]), [155, 100, 0, 0]);
    }

    #[test]
    fn test_lod_bone_uvs_resolve_through_names() {
        let mesh = SkinnedMesh {
            name: "hero".into(),
            lods: vec![SkinnedLod {
                sections: vec![SkinSection {
                    // Section bone 0 -> mesh bone 1 ("arm"), section bone 1 -> mesh bone 0
                    bone_map: vec![1, 0],
                    vertices: vec![SoftSkinVertex {
                        influence_bones: [0, 1, 0, 1],
                        influence_weights: [200, 55, 0, 0],
                    }],
                }],
            }],
            num_tex_coords: 1,
            skeleton: skeleton(&["root", "arm"]),
            global_skeleton: skeleton(&["pelvis", "root", "arm"]),
        };
        let bone_uvs = map_bones(3, &bone_profile(2)).unwrap().bone_uvs;

        let out = map_lod_bones(&mesh, 0, &bone_uvs).unwrap();
        // "arm" is global bone 2, "root" global bone 1
        assert_eq!(out.uv1[0], Vec2::new(bone_uvs[2].x, bone_uvs[1].x));
        assert_eq!(out.uv2[0], Vec2::new(bone_uvs[2].x, bone_uvs[1].x));
        assert_eq!(out.colors[0], [200, 55, 0, 0]);
    }

    #[test]
    fn test_lod_bone_missing_from_global_skeleton() {
        let mesh = SkinnedMesh {
            name: "hero".into(),
            lods: vec![SkinnedLod {
                sections: vec![SkinSection {
                    bone_map: vec![0],
                    vertices: vec![SoftSkinVertex::rigid(0)],
                }],
            }],
            num_tex_coords: 0,
            skeleton: skeleton(&["tail"]),
            global_skeleton: skeleton(&["root"]),
        };
        assert_eq!(
            map_lod_bones(&mesh, 0, &[Vec2::ZERO]),
            Err(DataIntegrityError::BoneNotInSkeleton("tail".into()))
        );
    }
}
