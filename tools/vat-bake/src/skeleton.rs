//! Reference skeletons
//!
//! A skinned mesh carries two skeletons: its own reference skeleton, which
//! LOD bone maps index into, and the global skeleton shared by every mesh
//! and animation of the same rig. Bone textures are always laid out in global
//! skeleton order so their UVs stay stable across meshes and LODs.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;

use crate::error::DataIntegrityError;

/// One bone of a reference skeleton with its local bind pose
#[derive(Debug, Clone, PartialEq)]
pub struct BoneInfo {
    pub name: String,
    /// Index of the parent bone, `None` for roots
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BoneInfo {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Bind pose relative to the parent bone
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSkeleton {
    pub name: String,
    pub bones: Vec<BoneInfo>,
    name_to_index: HashMap<String, usize>,
}

impl ReferenceSkeleton {
    pub fn new(name: impl Into<String>, bones: Vec<BoneInfo>) -> Self {
        let mut name_to_index = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            // First bone wins on duplicate names
            name_to_index.entry(bone.name.clone()).or_insert(index);
        }
        Self {
            name: name.into(),
            bones,
            name_to_index,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bones.get(index).map(|b| b.name.as_str())
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Bone indices ordered so every parent precedes its children
    ///
    /// Parents may appear after their children in storage order. Self
    /// references, cycles and out-of-range parents are rejected.
    pub fn evaluation_order(&self) -> Result<Vec<usize>, DataIntegrityError> {
        let count = self.bones.len();
        let mut visited = vec![false; count];
        let mut order = Vec::with_capacity(count);
        let mut chain = Vec::new();

        for start in 0..count {
            if visited[start] {
                continue;
            }

            // Walk up to the first visited ancestor (or a root)
            chain.clear();
            let mut current = start;
            loop {
                chain.push(current);
                if chain.len() > count {
                    return Err(DataIntegrityError::InvalidBoneParent {
                        bone: start,
                        parent: current,
                    });
                }
                match self.bones[current].parent {
                    None => break,
                    Some(parent) if parent >= count || parent == current => {
                        return Err(DataIntegrityError::InvalidBoneParent {
                            bone: current,
                            parent,
                        });
                    }
                    Some(parent) if visited[parent] => break,
                    Some(parent) => current = parent,
                }
            }

            for &bone in chain.iter().rev() {
                visited[bone] = true;
                order.push(bone);
            }
        }

        Ok(order)
    }

    /// Accumulate parent-relative matrices into component space
    ///
    /// `order` must come from [`Self::evaluation_order`].
    pub fn accumulate(&self, order: &[usize], locals: &[Mat4]) -> Vec<Mat4> {
        let mut component = vec![Mat4::IDENTITY; self.bones.len()];
        for &bone in order {
            let parent = self.bones[bone]
                .parent
                .map_or(Mat4::IDENTITY, |p| component[p]);
            component[bone] = parent * locals[bone];
        }
        component
    }

    /// Component-space bind pose of every bone
    pub fn component_space_ref_pose(&self) -> Result<Vec<Mat4>, DataIntegrityError> {
        let order = self.evaluation_order()?;
        let locals: Vec<Mat4> = self.bones.iter().map(BoneInfo::local_matrix).collect();
        Ok(self.accumulate(&order, &locals))
    }
}
