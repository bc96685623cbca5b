//! Skinned mesh description consumed by the baker
//!
//! Only what the bake needs is modelled: per-LOD skin sections with their
//! bone maps and 8-bit influences, the number of UV channels already present
//! and the two reference skeletons. Vertex positions come from the pose
//! evaluator, not from here.

use glam::Vec3;

use crate::error::DataIntegrityError;
use crate::skeleton::ReferenceSkeleton;

/// Influences per vertex
pub const MAX_INFLUENCES: usize = 4;

/// A CPU-skinned vertex as returned by the pose evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl SkinnedVertex {
    pub const fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Skin influences of one vertex
///
/// Bone indices are section-local and resolve through [`SkinSection::bone_map`].
/// Weights are 8-bit and nominally sum to 255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftSkinVertex {
    pub influence_bones: [u8; MAX_INFLUENCES],
    pub influence_weights: [u8; MAX_INFLUENCES],
}

impl SoftSkinVertex {
    /// Single influence with full weight
    pub const fn rigid(bone: u8) -> Self {
        Self {
            influence_bones: [bone, 0, 0, 0],
            influence_weights: [255, 0, 0, 0],
        }
    }
}

/// Contiguous run of vertices sharing one bone map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinSection {
    /// Section-local bone index -> mesh skeleton bone index
    pub bone_map: Vec<u16>,
    pub vertices: Vec<SoftSkinVertex>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedLod {
    pub sections: Vec<SkinSection>,
}

impl SkinnedLod {
    pub fn vertex_count(&self) -> usize {
        self.sections.iter().map(|s| s.vertices.len()).sum()
    }

    /// Every vertex in LOD vertex order with the index of its section
    pub fn soft_vertices(&self) -> impl Iterator<Item = (usize, &SoftSkinVertex)> {
        self.sections
            .iter()
            .enumerate()
            .flat_map(|(index, section)| section.vertices.iter().map(move |v| (index, v)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedMesh {
    pub name: String,
    /// LOD 0 is the reference LOD
    pub lods: Vec<SkinnedLod>,
    /// UV channels already present on the mesh
    pub num_tex_coords: u32,
    /// Skeleton the bone maps index into
    pub skeleton: ReferenceSkeleton,
    /// Canonical rig skeleton shared across meshes
    pub global_skeleton: ReferenceSkeleton,
}

impl SkinnedMesh {
    pub fn lod(&self, index: usize) -> Result<&SkinnedLod, DataIntegrityError> {
        self.lods
            .get(index)
            .ok_or(DataIntegrityError::MissingLod(index))
    }

    /// Resolve a section-local influence to a global skeleton bone index
    ///
    /// Goes through the section bone map, then the mesh skeleton's bone name.
    pub fn resolve_global_bone(
        &self,
        lod: usize,
        section: usize,
        local_bone: u8,
    ) -> Result<usize, DataIntegrityError> {
        let sections = &self.lod(lod)?.sections;
        let bone_map = &sections
            .get(section)
            .ok_or(DataIntegrityError::InvalidBoneMapIndex {
                lod,
                section,
                index: local_bone,
                len: 0,
            })?
            .bone_map;

        let mesh_bone = *bone_map.get(local_bone as usize).ok_or(
            DataIntegrityError::InvalidBoneMapIndex {
                lod,
                section,
                index: local_bone,
                len: bone_map.len(),
            },
        )? as usize;

        self.global_bone_of(mesh_bone)
    }

    /// Global skeleton index of a mesh skeleton bone
    pub fn global_bone_of(&self, mesh_bone: usize) -> Result<usize, DataIntegrityError> {
        let name = self
            .skeleton
            .bone_name(mesh_bone)
            .ok_or(DataIntegrityError::InvalidBoneIndex {
                index: mesh_bone,
                count: self.skeleton.bone_count(),
            })?;
        self.global_skeleton
            .find_bone_index(name)
            .ok_or_else(|| DataIntegrityError::BoneNotInSkeleton(name.to_string()))
    }
}
