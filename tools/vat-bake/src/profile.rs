//! Bake profile (TOML)
//!
//! A profile is the reusable configuration for baking one skinned mesh plus
//! the generated record of the last successful bake. The `generated` table is
//! rewritten by every bake and only read back by tooling and shaders.
//!
//! ```toml
//! name = "Hero"
//! auto_size = true
//! max_width = 2048
//!
//! [vertex]
//! merge_duplicate_verts = true
//!
//! [[vertex.anims]]
//! sequence = "Idle"
//! num_frames = 16
//!
//! [bone]
//! full_bone_skinning = false
//!
//! [[bone.anims]]
//! sequence = "Run"
//! num_frames = 24
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vat_common::{GridKind, GridSize, MIN_BONE_TEXTURE_WIDTH};

use crate::error::ConfigError;
use crate::evaluator::{ClipInfo, PoseEvaluator};

pub const DEFAULT_PROFILE_NAME: &str = "VertexAnimProfile";
pub const DEFAULT_MAX_WIDTH: u32 = 2048;
pub const DEFAULT_NUM_FRAMES: u32 = 8;

/// Smallest accepted larger axis of a manual texture size
pub const MIN_OVERRIDE_DIMENSION: u32 = 8;

fn default_true() -> bool {
    true
}
fn default_name() -> String {
    DEFAULT_PROFILE_NAME.to_string()
}
fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}
fn default_num_frames() -> u32 {
    DEFAULT_NUM_FRAMES
}
fn default_speed() -> f32 {
    1.0
}

/// One entry of a profile's animation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClipSpec {
    /// Sequence name as known to the pose evaluator
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default = "default_num_frames")]
    pub num_frames: u32,
    /// First texture row of this clip (generated)
    #[serde(default)]
    pub anim_start_generated: u32,
    /// `1 / duration` of the sequence (generated)
    #[serde(default = "default_speed")]
    pub speed_generated: f32,
}

impl AnimationClipSpec {
    pub fn new(sequence: impl Into<String>, num_frames: u32) -> Self {
        Self {
            sequence: Some(sequence.into()),
            num_frames,
            ..Default::default()
        }
    }
}

impl Default for AnimationClipSpec {
    fn default() -> Self {
        Self {
            sequence: None,
            num_frames: DEFAULT_NUM_FRAMES,
            anim_start_generated: 0,
            speed_generated: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAnimSettings {
    /// Collapse vertices with identical positions into one texel
    #[serde(default = "default_true")]
    pub merge_duplicate_verts: bool,
    /// Texture size; written back by auto-sized bakes
    #[serde(default)]
    pub override_size: GridSize,
    #[serde(default)]
    pub anims: Vec<AnimationClipSpec>,
}

impl Default for VertexAnimSettings {
    fn default() -> Self {
        Self {
            merge_duplicate_verts: true,
            override_size: GridSize::default(),
            anims: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneAnimSettings {
    /// Also write influences 2 and 3 plus weight colours
    #[serde(default)]
    pub full_bone_skinning: bool,
    #[serde(default)]
    pub override_size: GridSize,
    #[serde(default)]
    pub anims: Vec<AnimationClipSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVertexAnim {
    #[serde(default)]
    pub uv_channel: Option<u32>,
    #[serde(default)]
    pub rows_per_frame: u32,
    /// Largest absolute offset component over all frames
    #[serde(default)]
    pub max_value_offset: f32,
    #[serde(default)]
    pub offsets_texture: Option<String>,
    #[serde(default)]
    pub normals_texture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBoneAnim {
    #[serde(default)]
    pub uv_channel: Option<u32>,
    /// Channel holding influences 2 and 3 with full bone skinning
    #[serde(default)]
    pub uv_channel_full: Option<u32>,
    /// Largest absolute bone position component, reference row included
    #[serde(default)]
    pub max_value_position: f32,
    #[serde(default)]
    pub bone_pos_texture: Option<String>,
    #[serde(default)]
    pub bone_rot_texture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutputs {
    #[serde(default)]
    pub static_mesh: Option<String>,
    #[serde(default)]
    pub vertex: GeneratedVertexAnim,
    #[serde(default)]
    pub bone: GeneratedBoneAnim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeProfile {
    /// Prefix for generated texture names
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub auto_size: bool,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default)]
    pub vertex: VertexAnimSettings,
    #[serde(default)]
    pub bone: BoneAnimSettings,
    #[serde(default)]
    pub generated: GeneratedOutputs,
}

impl Default for BakeProfile {
    fn default() -> Self {
        Self {
            name: default_name(),
            auto_size: true,
            max_width: DEFAULT_MAX_WIDTH,
            vertex: VertexAnimSettings::default(),
            bone: BoneAnimSettings::default(),
            generated: GeneratedOutputs::default(),
        }
    }
}

/// UV channels assigned to the baked mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UvChannels {
    pub vertex: Option<u32>,
    pub bone: Option<u32>,
    pub bone_full: Option<u32>,
}

impl UvChannels {
    /// Place the animation channels after the mesh's `existing` channels
    pub fn assign(existing: u32, has_vertex: bool, has_bone: bool, full_bone_skinning: bool) -> Self {
        let vertex = has_vertex.then_some(existing);
        let bone = has_bone.then(|| if has_vertex { existing + 1 } else { existing });
        let bone_full = bone.filter(|_| full_bone_skinning).map(|channel| channel + 1);
        Self {
            vertex,
            bone,
            bone_full,
        }
    }
}

/// Frames summed over a clip list, saturating at `u32::MAX`
///
/// A saturated total can never fit a texture, so the capacity check rejects it.
fn sum_frames(anims: &[AnimationClipSpec]) -> u32 {
    anims
        .iter()
        .fold(0u32, |total, a| total.saturating_add(a.num_frames))
}

impl BakeProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse profile: {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize profile")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write profile: {:?}", path))
    }

    pub fn has_vertex_anims(&self) -> bool {
        !self.vertex.anims.is_empty()
    }

    pub fn has_bone_anims(&self) -> bool {
        !self.bone.anims.is_empty()
    }

    pub fn total_frames_vert(&self) -> u32 {
        sum_frames(&self.vertex.anims)
    }

    pub fn total_frames_bone(&self) -> u32 {
        sum_frames(&self.bone.anims)
    }

    /// Rows used by all vertex clips at the current rows-per-frame
    pub fn total_required_height_vert(&self) -> u32 {
        self.generated
            .vertex
            .rows_per_frame
            .saturating_mul(self.total_frames_vert())
    }

    /// Rows used by all bone clips, reference row excluded
    pub fn total_required_height_bone(&self) -> u32 {
        self.total_frames_bone()
    }

    pub fn start_height_of_anim_vert(&self, index: usize) -> u32 {
        let end = index.min(self.vertex.anims.len());
        self.generated
            .vertex
            .rows_per_frame
            .saturating_mul(sum_frames(&self.vertex.anims[..end]))
    }

    /// Bone clips start below the reference pose row
    pub fn start_height_of_anim_bone(&self, index: usize) -> u32 {
        let end = index.min(self.bone.anims.len());
        sum_frames(&self.bone.anims[..end]).saturating_add(1)
    }

    /// Texture name for a generated asset, `<profile>_<suffix>`
    pub fn texture_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.name, suffix)
    }

    pub fn uv_channels(&self, existing: u32) -> UvChannels {
        UvChannels::assign(
            existing,
            self.has_vertex_anims(),
            self.has_bone_anims(),
            self.bone.full_bone_skinning,
        )
    }

    /// Every clip with its list and position, vertex list first
    pub fn clips(&self) -> impl Iterator<Item = (GridKind, usize, &AnimationClipSpec)> {
        let vertex = self
            .vertex
            .anims
            .iter()
            .enumerate()
            .map(|(i, clip)| (GridKind::Vertex, i, clip));
        let bone = self
            .bone
            .anims
            .iter()
            .enumerate()
            .map(|(i, clip)| (GridKind::Bone, i, clip));
        vertex.chain(bone)
    }

    /// Structural checks that need no pose evaluator
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run_validation(None)
    }

    /// Full validation, resolving every sequence through `evaluator`
    pub fn validate_against<E: PoseEvaluator>(&self, evaluator: &E) -> Result<(), ConfigError> {
        let lookup = |name: &str| evaluator.clip_info(name);
        self.run_validation(Some(&lookup))
    }

    fn run_validation(
        &self,
        lookup: Option<&dyn Fn(&str) -> Option<ClipInfo>>,
    ) -> Result<(), ConfigError> {
        if self.auto_size {
            if self.max_width < MIN_BONE_TEXTURE_WIDTH || !self.max_width.is_power_of_two() {
                return Err(ConfigError::InvalidMaxWidth(self.max_width));
            }
        } else {
            let lists = [
                (GridKind::Vertex, self.vertex.override_size, self.has_vertex_anims()),
                (GridKind::Bone, self.bone.override_size, self.has_bone_anims()),
            ];
            for (list, size, used) in lists {
                let too_small = size.width == 0
                    || size.height == 0
                    || size.max_dim() < MIN_OVERRIDE_DIMENSION;
                if used && too_small {
                    return Err(ConfigError::InvalidOverrideSize { list, size });
                }
            }
        }

        if !self.has_vertex_anims() && !self.has_bone_anims() {
            return Err(ConfigError::NoAnimations);
        }

        let expected_skeleton = lookup.and_then(|lookup| {
            self.clips()
                .filter_map(|(_, _, clip)| clip.sequence.as_deref())
                .find_map(lookup)
                .map(|info| info.skeleton)
        });

        for (list, index, clip) in self.clips() {
            let Some(sequence) = clip.sequence.as_deref() else {
                return Err(ConfigError::MissingSequence { list, index });
            };

            let info = match lookup {
                Some(lookup) => Some(lookup(sequence).ok_or_else(|| {
                    ConfigError::UnknownSequence {
                        name: sequence.to_string(),
                    }
                })?),
                None => None,
            };

            if let (Some(info), Some(expected)) = (&info, &expected_skeleton) {
                if &info.skeleton != expected {
                    return Err(ConfigError::SkeletonMismatch {
                        expected: expected.clone(),
                        found: info.skeleton.clone(),
                    });
                }
            }

            if clip.num_frames < 1 {
                return Err(ConfigError::InvalidFrameCount { list, index });
            }

            if let Some(info) = info {
                if !(info.duration > 0.0 && info.duration.is_finite()) {
                    return Err(ConfigError::ZeroLengthClip {
                        name: sequence.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(vertex: &[(&str, u32)], bone: &[(&str, u32)]) -> BakeProfile {
        let mut profile = BakeProfile::default();
        profile.vertex.anims = vertex
            .iter()
            .map(|(name, frames)| AnimationClipSpec::new(*name, *frames))
            .collect();
        profile.bone.anims = bone
            .iter()
            .map(|(name, frames)| AnimationClipSpec::new(*name, *frames))
            .collect();
        profile
    }

    fn lookup(name: &str) -> Option<ClipInfo> {
        match name {
            "walk" | "run" => Some(ClipInfo {
                duration: 1.0,
                skeleton: "human".into(),
            }),
            "flap" => Some(ClipInfo {
                duration: 0.5,
                skeleton: "bird".into(),
            }),
            "pose" => Some(ClipInfo {
                duration: 0.0,
                skeleton: "human".into(),
            }),
            _ => None,
        }
    }

    fn validate_with_lookup(profile: &BakeProfile) -> Result<(), ConfigError> {
        profile.run_validation(Some(&lookup))
    }

    // =============================================================
    // Defaults and TOML
    // =============================================================

    #[test]
    fn test_profile_default() {
        let profile = BakeProfile::default();
        assert_eq!(profile.name, "VertexAnimProfile");
        assert!(profile.auto_size);
        assert_eq!(profile.max_width, 2048);
        assert!(profile.vertex.merge_duplicate_verts);
        assert!(!profile.bone.full_bone_skinning);
        assert_eq!(profile.generated.vertex.uv_channel, None);
        assert_eq!(profile.generated.bone.uv_channel, None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let profile: BakeProfile = toml::from_str(
            r#"
            name = "Hero"

            [[vertex.anims]]
            sequence = "walk"
            "#,
        )
        .unwrap();
        assert_eq!(profile.name, "Hero");
        assert!(profile.auto_size);
        assert_eq!(profile.max_width, 2048);
        assert!(profile.vertex.merge_duplicate_verts);
        assert_eq!(profile.vertex.anims.len(), 1);
        assert_eq!(profile.vertex.anims[0].num_frames, 8);
        assert!((profile.vertex.anims[0].speed_generated - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut profile = profile_with(&[("walk", 4)], &[("run", 6)]);
        profile.generated.vertex.rows_per_frame = 2;
        profile.generated.vertex.offsets_texture = Some("Hero_Offsets".into());
        profile.generated.bone.uv_channel = Some(2);

        let text = toml::to_string_pretty(&profile).unwrap();
        let parsed: BakeProfile = toml::from_str(&text).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_load_save_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.toml");
        let profile = profile_with(&[("walk", 4)], &[]);
        profile.save(&path).unwrap();
        assert_eq!(BakeProfile::load(&path).unwrap(), profile);
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = BakeProfile::load(Path::new("/nonexistent/profile.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read profile"));
    }

    // =============================================================
    // Bookkeeping
    // =============================================================

    #[test]
    fn test_required_heights() {
        let mut profile = profile_with(&[("walk", 4), ("run", 6)], &[("run", 3), ("walk", 5)]);
        profile.generated.vertex.rows_per_frame = 2;

        assert_eq!(profile.total_frames_vert(), 10);
        assert_eq!(profile.total_required_height_vert(), 20);
        assert_eq!(profile.total_required_height_bone(), 8);

        assert_eq!(profile.start_height_of_anim_vert(0), 0);
        assert_eq!(profile.start_height_of_anim_vert(1), 8);
        assert_eq!(profile.start_height_of_anim_bone(0), 1);
        assert_eq!(profile.start_height_of_anim_bone(1), 4);
    }

    #[test]
    fn test_uv_channel_assignment() {
        assert_eq!(
            UvChannels::assign(2, true, true, true),
            UvChannels {
                vertex: Some(2),
                bone: Some(3),
                bone_full: Some(4)
            }
        );
        assert_eq!(
            UvChannels::assign(1, false, true, false),
            UvChannels {
                vertex: None,
                bone: Some(1),
                bone_full: None
            }
        );
        assert_eq!(
            UvChannels::assign(1, true, false, true),
            UvChannels {
                vertex: Some(1),
                bone: None,
                bone_full: None
            }
        );
    }

    #[test]
    fn test_frame_totals_saturate() {
        let mut profile = profile_with(&[("a", 3_000_000_000), ("b", 3_000_000_000)], &[("c", u32::MAX)]);
        profile.generated.vertex.rows_per_frame = 4;

        assert_eq!(profile.total_frames_vert(), u32::MAX);
        assert_eq!(profile.total_required_height_vert(), u32::MAX);
        assert_eq!(profile.start_height_of_anim_vert(2), u32::MAX);
        assert_eq!(profile.total_frames_bone(), u32::MAX);
        assert_eq!(profile.start_height_of_anim_bone(1), u32::MAX);
    }

    // =============================================================
    // Validation
    // =============================================================

    #[test]
    fn test_validate_no_animations() {
        assert_eq!(BakeProfile::default().validate(), Err(ConfigError::NoAnimations));
    }

    #[test]
    fn test_validate_missing_sequence() {
        let mut profile = profile_with(&[("walk", 4)], &[]);
        profile.bone.anims.push(AnimationClipSpec::default());
        assert_eq!(
            profile.validate(),
            Err(ConfigError::MissingSequence {
                list: GridKind::Bone,
                index: 0
            })
        );
    }

    #[test]
    fn test_validate_frame_count() {
        let profile = profile_with(&[("walk", 0)], &[]);
        assert_eq!(
            profile.validate(),
            Err(ConfigError::InvalidFrameCount {
                list: GridKind::Vertex,
                index: 0
            })
        );
    }

    #[test]
    fn test_validate_manual_size_checked_first() {
        let mut profile = BakeProfile {
            auto_size: false,
            ..Default::default()
        };
        profile.vertex.anims.push(AnimationClipSpec::new("walk", 4));
        profile.vertex.override_size = GridSize::new(4, 4);
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidOverrideSize {
                list: GridKind::Vertex,
                ..
            })
        ));

        // Unused lists are not checked
        profile.vertex.override_size = GridSize::new(16, 4);
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn test_validate_max_width() {
        let mut profile = profile_with(&[("walk", 4)], &[]);
        profile.max_width = 4;
        assert_eq!(profile.validate(), Err(ConfigError::InvalidMaxWidth(4)));

        profile.max_width = 100;
        assert_eq!(profile.validate(), Err(ConfigError::InvalidMaxWidth(100)));

        // Only auto-sized profiles use max_width
        profile.auto_size = false;
        profile.vertex.override_size = GridSize::new(16, 16);
        assert_eq!(profile.validate(), Ok(()));
    }

    #[test]
    fn test_validate_unknown_sequence() {
        let profile = profile_with(&[("walk", 4), ("dance", 4)], &[]);
        assert_eq!(profile.validate(), Ok(()));
        assert_eq!(
            validate_with_lookup(&profile),
            Err(ConfigError::UnknownSequence {
                name: "dance".into()
            })
        );
    }

    #[test]
    fn test_validate_skeleton_mismatch() {
        let profile = profile_with(&[("walk", 4)], &[("flap", 4)]);
        assert_eq!(
            validate_with_lookup(&profile),
            Err(ConfigError::SkeletonMismatch {
                expected: "human".into(),
                found: "bird".into()
            })
        );
    }

    #[test]
    fn test_validate_expected_skeleton_from_bone_list() {
        let profile = profile_with(&[], &[("flap", 4), ("walk", 2)]);
        assert_eq!(
            validate_with_lookup(&profile),
            Err(ConfigError::SkeletonMismatch {
                expected: "bird".into(),
                found: "human".into()
            })
        );
    }

    #[test]
    fn test_validate_zero_length_clip() {
        let profile = profile_with(&[("pose", 4)], &[]);
        assert_eq!(
            validate_with_lookup(&profile),
            Err(ConfigError::ZeroLengthClip {
                name: "pose".into()
            })
        );
    }

    #[test]
    fn test_validate_accepts_good_profile() {
        let profile = profile_with(&[("walk", 4)], &[("run", 8)]);
        assert_eq!(validate_with_lookup(&profile), Ok(()));
    }
}
