//! Vertex deduplication and grid mapping
//!
//! LOD 0 is the reference LOD. Its positions are deduplicated (optionally)
//! into a [`UniqueVertexSet`], each unique entry gets one texel per frame, and
//! every other LOD borrows the UV of its nearest reference entry.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use vat_common::{GridKind, VertexGridLayout, grid_uvs};

use crate::error::{BakeError, ConfigError, DataIntegrityError};
use crate::profile::BakeProfile;

/// Deduplicated positions of the reference LOD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniqueVertexSet {
    /// Unique positions in first-seen order
    pub positions: Vec<Vec3>,
    /// First source vertex of each unique entry
    pub source_ids: Vec<usize>,
    /// Unique entry of every source vertex
    pub vertex_to_unique: Vec<usize>,
}

/// Hash key for bit-exact position equality
///
/// `-0.0` and `0.0` compare equal as floats, so they share a key.
fn position_key(position: Vec3) -> [u32; 3] {
    let p = position + Vec3::ZERO;
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

impl UniqueVertexSet {
    /// Build from positions in vertex order
    ///
    /// With `merge_duplicates` an exactly equal position reuses the first
    /// entry. NaN positions never compare equal and stay unique.
    pub fn build(positions: &[Vec3], merge_duplicates: bool) -> Self {
        let mut set = Self {
            positions: Vec::with_capacity(positions.len()),
            source_ids: Vec::with_capacity(positions.len()),
            vertex_to_unique: Vec::with_capacity(positions.len()),
        };
        let mut seen: HashMap<[u32; 3], usize> = HashMap::new();

        for (vertex, &position) in positions.iter().enumerate() {
            if merge_duplicates && !position.is_nan() {
                if let Some(&unique) = seen.get(&position_key(position)) {
                    set.vertex_to_unique.push(unique);
                    continue;
                }
                seen.insert(position_key(position), set.positions.len());
            }
            set.vertex_to_unique.push(set.positions.len());
            set.positions.push(position);
            set.source_ids.push(vertex);
        }

        set
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Unique entry closest to `position`, first minimum wins
    ///
    /// Brute force over the unique set; this dominates mapping time for
    /// large meshes with many LODs.
    pub fn nearest_unique(&self, position: Vec3) -> Option<usize> {
        let mut best = None;
        let mut best_distance = f32::MAX;
        for (index, unique) in self.positions.iter().enumerate() {
            let distance = unique.distance(position);
            if distance < best_distance {
                best_distance = distance;
                best = Some(index);
            }
        }
        best
    }
}

/// Result of vertex mapping for every LOD
#[derive(Debug, Clone, PartialEq)]
pub struct VertexMapping {
    pub unique: UniqueVertexSet,
    pub layout: VertexGridLayout,
    /// Texel-centre UV of each unique entry
    pub unique_uvs: Vec<Vec2>,
    /// Per LOD, per vertex animation UV
    pub lod_uvs: Vec<Vec<Vec2>>,
}

/// Map reference-pose positions of every LOD onto the vertex texture grid
///
/// `lod_positions[0]` is the reference LOD. Layout and capacity are checked
/// here so a failing profile never reaches sampling.
pub fn map_vertices(
    lod_positions: &[Vec<Vec3>],
    profile: &BakeProfile,
) -> Result<VertexMapping, BakeError> {
    let reference = lod_positions
        .first()
        .ok_or(DataIntegrityError::MissingLod(0))?;
    if reference.is_empty() {
        return Err(DataIntegrityError::EmptyMesh.into());
    }

    let override_size = profile.vertex.override_size;
    if !profile.auto_size && override_size.width == 0 {
        return Err(ConfigError::InvalidOverrideSize {
            list: GridKind::Vertex,
            size: override_size,
        }
        .into());
    }

    let unique = UniqueVertexSet::build(reference, profile.vertex.merge_duplicate_verts);
    let unique_count = unique.len() as u32;
    let total_frames = profile.total_frames_vert();

    let layout = VertexGridLayout::plan(
        unique_count,
        total_frames,
        profile.auto_size,
        profile.max_width,
        override_size,
    );
    layout.check_capacity(unique_count, total_frames)?;

    let unique_uvs = grid_uvs(unique_count, layout.size);

    let mut lod_uvs = Vec::with_capacity(lod_positions.len());
    lod_uvs.push(
        unique
            .vertex_to_unique
            .iter()
            .map(|&u| unique_uvs[u])
            .collect::<Vec<_>>(),
    );

    for (lod, positions) in lod_positions.iter().enumerate().skip(1) {
        let uvs = positions
            .iter()
            .enumerate()
            .map(|(vertex, &position)| {
                unique
                    .nearest_unique(position)
                    .map(|u| unique_uvs[u])
                    .ok_or(DataIntegrityError::NonFinitePosition { lod, vertex })
            })
            .collect::<Result<Vec<_>, _>>()?;
        lod_uvs.push(uvs);
    }

    tracing::info!(
        "Mapped {} vertices to {} unique texels ({} grid, {} rows per frame)",
        reference.len(),
        unique_count,
        layout.size,
        layout.rows_per_frame
    );

    Ok(VertexMapping {
        unique,
        layout,
        unique_uvs,
        lod_uvs,
    })
}
